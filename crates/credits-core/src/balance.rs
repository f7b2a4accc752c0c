//! Balance projection for an account.
//!
//! The balance is a denormalized summary of the transaction log. It is only
//! ever changed together with the transaction rows that explain the change,
//! so the per-bucket counters always equal the per-bucket sum of the log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::{AccountId, CreditType, Transaction};

/// Order in which a debit drains credit buckets.
///
/// Promotional credits go first, then the subscription allowance (which
/// renews), and purchased credits last.
pub const DEBIT_PRIORITY: [CreditType; 3] = [
    CreditType::Bonus,
    CreditType::Subscription,
    CreditType::Purchased,
];

/// Per-account credit balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// The owning account.
    pub account_id: AccountId,

    /// Credits from the subscription allowance.
    pub subscription_credits: i64,

    /// Credits bought by the customer.
    pub purchased_credits: i64,

    /// Promotional credits.
    pub bonus_credits: i64,

    /// Lifetime credits added.
    pub lifetime_credited: i64,

    /// Lifetime credits removed.
    pub lifetime_debited: i64,

    /// When the balance row was created.
    pub created_at: DateTime<Utc>,

    /// When the balance row was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Create an empty balance.
    #[must_use]
    pub fn new(account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            subscription_credits: 0,
            purchased_credits: 0,
            bonus_credits: 0,
            lifetime_credited: 0,
            lifetime_debited: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of all buckets, saturating at `i64::MAX`.
    #[must_use]
    pub const fn total_credits(&self) -> i64 {
        self.subscription_credits
            .saturating_add(self.purchased_credits)
            .saturating_add(self.bonus_credits)
    }

    /// Credits in one bucket.
    #[must_use]
    pub const fn credits(&self, credit_type: CreditType) -> i64 {
        match credit_type {
            CreditType::Subscription => self.subscription_credits,
            CreditType::Purchased => self.purchased_credits,
            CreditType::Bonus => self.bonus_credits,
        }
    }

    fn credits_mut(&mut self, credit_type: CreditType) -> &mut i64 {
        match credit_type {
            CreditType::Subscription => &mut self.subscription_credits,
            CreditType::Purchased => &mut self.purchased_credits,
            CreditType::Bonus => &mut self.bonus_credits,
        }
    }

    /// Check if the balance covers a debit.
    #[must_use]
    pub const fn has_sufficient_credits(&self, amount: i64) -> bool {
        self.total_credits() >= amount
    }

    /// Split a debit across buckets following [`DEBIT_PRIORITY`].
    ///
    /// Returns `(bucket, amount)` pairs in drain order, skipping empty buckets.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive.
    /// - `InsufficientCredits` if the total balance is below `amount`.
    pub fn plan_debit(&self, amount: i64) -> Result<Vec<(CreditType, i64)>> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "debit amount must be positive, got {amount}"
            )));
        }
        if !self.has_sufficient_credits(amount) {
            return Err(LedgerError::InsufficientCredits {
                available: self.total_credits(),
                required: amount,
            });
        }

        let mut remaining = amount;
        let mut draws = Vec::with_capacity(DEBIT_PRIORITY.len());
        for credit_type in DEBIT_PRIORITY {
            if remaining == 0 {
                break;
            }
            let take = self.credits(credit_type).min(remaining);
            if take > 0 {
                draws.push((credit_type, take));
                remaining -= take;
            }
        }
        Ok(draws)
    }

    /// Apply a transaction row to the projection.
    ///
    /// # Errors
    ///
    /// - `InsufficientCredits` if the row would drive its bucket below zero.
    /// - `InvalidAmount` if the bucket, the total or a lifetime counter would
    ///   overflow.
    ///
    /// The balance is left untouched on error.
    pub fn apply(&mut self, transaction: &Transaction) -> Result<()> {
        let overflow = || LedgerError::InvalidAmount("balance overflow".into());
        let amount = transaction.amount;

        let bucket = self.credits(transaction.credit_type);
        let next = bucket.checked_add(amount).ok_or_else(overflow)?;
        if next < 0 {
            return Err(LedgerError::InsufficientCredits {
                available: bucket,
                required: amount.saturating_neg(),
            });
        }

        let total_fits = self
            .subscription_credits
            .checked_add(self.purchased_credits)
            .and_then(|total| total.checked_add(self.bonus_credits))
            .and_then(|total| total.checked_add(amount))
            .is_some();
        if !total_fits {
            return Err(overflow());
        }

        let (lifetime_credited, lifetime_debited) = if amount > 0 {
            (
                self.lifetime_credited.checked_add(amount).ok_or_else(overflow)?,
                self.lifetime_debited,
            )
        } else {
            let removed = amount.checked_neg().ok_or_else(overflow)?;
            (
                self.lifetime_credited,
                self.lifetime_debited.checked_add(removed).ok_or_else(overflow)?,
            )
        };

        *self.credits_mut(transaction.credit_type) = next;
        self.lifetime_credited = lifetime_credited;
        self.lifetime_debited = lifetime_debited;
        self.updated_at = transaction.created_at.max(self.updated_at);
        Ok(())
    }
}

/// Result of recomputing a balance from the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// The audited account.
    pub account_id: AccountId,
    /// Number of transactions in the log.
    pub transaction_count: usize,
    /// The stored projection.
    pub projected: BucketTotals,
    /// Sums recomputed from the log.
    pub from_log: BucketTotals,
}

impl AuditReport {
    /// Build a report by summing `transactions` and comparing with `balance`.
    #[must_use]
    pub fn compute(balance: &Balance, transactions: &[Transaction]) -> Self {
        let mut from_log = BucketTotals::default();
        for tx in transactions {
            let bucket = match tx.credit_type {
                CreditType::Subscription => &mut from_log.subscription,
                CreditType::Purchased => &mut from_log.purchased,
                CreditType::Bonus => &mut from_log.bonus,
            };
            *bucket = bucket.saturating_add(tx.amount);
        }

        Self {
            account_id: balance.account_id,
            transaction_count: transactions.len(),
            projected: BucketTotals {
                subscription: balance.subscription_credits,
                purchased: balance.purchased_credits,
                bonus: balance.bonus_credits,
            },
            from_log,
        }
    }

    /// Whether the projection agrees with the log in every bucket.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.projected == self.from_log
    }
}

/// Credits per bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTotals {
    /// Subscription bucket.
    pub subscription: i64,
    /// Purchased bucket.
    pub purchased: i64,
    /// Bonus bucket.
    pub bonus: i64,
}

impl BucketTotals {
    /// Sum of all buckets.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.subscription
            .saturating_add(self.purchased)
            .saturating_add(self.bonus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CreditOptions, DebitOptions};

    fn balance(subscription: i64, purchased: i64, bonus: i64) -> Balance {
        let mut balance = Balance::new(AccountId::generate());
        balance.subscription_credits = subscription;
        balance.purchased_credits = purchased;
        balance.bonus_credits = bonus;
        balance
    }

    #[test]
    fn new_balance_is_empty() {
        let balance = Balance::new(AccountId::generate());
        assert_eq!(balance.total_credits(), 0);
        assert_eq!(balance.lifetime_credited, 0);
        assert_eq!(balance.lifetime_debited, 0);
    }

    #[test]
    fn total_is_sum_of_buckets() {
        let balance = balance(100, 250, 30);
        assert_eq!(balance.total_credits(), 380);
        assert!(balance.has_sufficient_credits(380));
        assert!(!balance.has_sufficient_credits(381));
    }

    #[test]
    fn debit_drains_bonus_then_subscription_then_purchased() {
        let balance = balance(100, 250, 30);

        let draws = balance.plan_debit(200).unwrap();
        assert_eq!(
            draws,
            vec![
                (CreditType::Bonus, 30),
                (CreditType::Subscription, 100),
                (CreditType::Purchased, 70),
            ]
        );
    }

    #[test]
    fn debit_skips_empty_buckets() {
        let balance = balance(0, 500, 0);
        let draws = balance.plan_debit(120).unwrap();
        assert_eq!(draws, vec![(CreditType::Purchased, 120)]);
    }

    #[test]
    fn debit_over_balance_is_rejected() {
        let balance = balance(10, 10, 10);
        let err = balance.plan_debit(31).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits {
                available: 30,
                required: 31
            }
        ));
    }

    #[test]
    fn non_positive_debit_is_rejected() {
        let balance = balance(10, 0, 0);
        assert!(matches!(
            balance.plan_debit(0),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            balance.plan_debit(-5),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn apply_updates_bucket_and_lifetime_counters() {
        let mut balance = balance(0, 0, 0);
        let credit = Transaction::credit(balance.account_id, 500, &CreditOptions::purchase("s"));
        balance.apply(&credit).unwrap();

        let debit = Transaction::debit(
            balance.account_id,
            CreditType::Purchased,
            120,
            &DebitOptions::default(),
        );
        balance.apply(&debit).unwrap();

        assert_eq!(balance.purchased_credits, 380);
        assert_eq!(balance.lifetime_credited, 500);
        assert_eq!(balance.lifetime_debited, 120);
    }

    #[test]
    fn apply_refuses_to_go_negative() {
        let mut balance = balance(0, 0, 5);
        let debit = Transaction::debit(
            balance.account_id,
            CreditType::Bonus,
            6,
            &DebitOptions::default(),
        );
        assert!(balance.apply(&debit).is_err());
        assert_eq!(balance.bonus_credits, 5);
        assert_eq!(balance.lifetime_debited, 0);
    }

    #[test]
    fn apply_rejects_total_overflow_across_buckets() {
        let mut balance = balance(0, 0, i64::MAX);
        let credit = Transaction::credit(balance.account_id, 1, &CreditOptions::purchase("s"));

        let err = balance.apply(&credit).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
        assert_eq!(balance.purchased_credits, 0);
        assert_eq!(balance.lifetime_credited, 0);
        assert_eq!(balance.total_credits(), i64::MAX);
    }

    #[test]
    fn apply_rejects_lifetime_overflow() {
        let mut balance = balance(0, 0, 0);
        balance.lifetime_credited = i64::MAX;
        let credit = Transaction::credit(balance.account_id, 1, &CreditOptions::bonus("promo"));

        assert!(matches!(
            balance.apply(&credit),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert_eq!(balance.bonus_credits, 0);
    }

    #[test]
    fn total_saturates_instead_of_wrapping() {
        let balance = balance(0, 1, i64::MAX);
        assert_eq!(balance.total_credits(), i64::MAX);
        assert!(balance.has_sufficient_credits(i64::MAX));
    }

    #[test]
    fn audit_detects_drift() {
        let mut balance = balance(0, 0, 0);
        let credit = Transaction::credit(balance.account_id, 50, &CreditOptions::bonus("promo"));
        balance.apply(&credit).unwrap();

        let report = AuditReport::compute(&balance, std::slice::from_ref(&credit));
        assert!(report.is_consistent());
        assert_eq!(report.from_log.total(), 50);

        balance.bonus_credits = 49;
        let report = AuditReport::compute(&balance, &[credit]);
        assert!(!report.is_consistent());
    }
}
