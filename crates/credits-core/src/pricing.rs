//! Pricing for paid features and subscription plans.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Starter plan monthly credit allowance.
pub const STARTER_PLAN_CREDITS: i64 = 500;

/// Growth plan monthly credit allowance.
pub const GROWTH_PLAN_CREDITS: i64 = 2000;

/// Agency plan monthly credit allowance.
pub const AGENCY_PLAN_CREDITS: i64 = 6000;

/// A paid operation gated by credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Keyword research lookup.
    KeywordResearch,
    /// Local rank check for one keyword.
    RankCheck,
    /// Sentiment analysis of a review batch.
    SentimentAnalysis,
    /// Bulk review import, priced per block of reviews.
    ReviewImport,
    /// AI-assisted content generation (review replies, posts).
    ContentGeneration,
}

impl Feature {
    /// Get the feature name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::KeywordResearch => "keyword_research",
            Self::RankCheck => "rank_check",
            Self::SentimentAnalysis => "sentiment_analysis",
            Self::ReviewImport => "review_import",
            Self::ContentGeneration => "content_generation",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pricing for one feature.
///
/// A charge of `credits` covers `units` uses; partial blocks round up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturePricing {
    /// Credits per block.
    pub credits: i64,
    /// Uses per block.
    pub units: u64,
}

impl FeaturePricing {
    /// One block per use.
    #[must_use]
    pub const fn per_use(credits: i64) -> Self {
        Self { credits, units: 1 }
    }
}

/// Credit costs for all paid features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Pricing by feature.
    pub features: HashMap<Feature, FeaturePricing>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let features = HashMap::from([
            (Feature::KeywordResearch, FeaturePricing::per_use(5)),
            (Feature::RankCheck, FeaturePricing::per_use(1)),
            (Feature::SentimentAnalysis, FeaturePricing::per_use(2)),
            (
                Feature::ReviewImport,
                FeaturePricing {
                    credits: 1,
                    units: 10,
                },
            ),
            (Feature::ContentGeneration, FeaturePricing::per_use(3)),
        ]);

        Self { features }
    }
}

impl PricingConfig {
    /// Calculate the credit cost of `quantity` uses of `feature`.
    ///
    /// Zero quantity is free. Any non-zero quantity costs at least 1 credit.
    /// Features missing from the table cost 1 credit per use.
    #[must_use]
    pub fn cost_for(&self, feature: Feature, quantity: u64) -> i64 {
        if quantity == 0 {
            return 0;
        }

        let pricing = self
            .features
            .get(&feature)
            .copied()
            .unwrap_or(FeaturePricing::per_use(1));

        let blocks = quantity.div_ceil(pricing.units.max(1));
        let blocks = i64::try_from(blocks).unwrap_or(i64::MAX);
        pricing.credits.saturating_mul(blocks).max(1)
    }
}

/// Subscription plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// No subscription, purchased credits only.
    Free,
    /// Single location.
    Starter,
    /// Several locations.
    Growth,
    /// Agencies managing many clients.
    Agency,
}

impl Plan {
    /// Get the monthly subscription credit allowance for this plan.
    #[must_use]
    pub const fn monthly_credits(&self) -> i64 {
        match self {
            Self::Free => 0,
            Self::Starter => STARTER_PLAN_CREDITS,
            Self::Growth => GROWTH_PLAN_CREDITS,
            Self::Agency => AGENCY_PLAN_CREDITS,
        }
    }

    /// Get the plan name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Growth => "growth",
            Self::Agency => "agency",
        }
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "starter" => Ok(Self::Starter),
            "growth" => Ok(Self::Growth),
            "agency" => Ok(Self::Agency),
            other => Err(format!("unknown plan: {other}")),
        }
    }
}
