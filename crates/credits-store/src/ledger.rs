//! Ledger operations.
//!
//! [`Ledger`] is the only entry point callers use to move credits. It validates
//! input, builds the transaction rows and delegates the atomic write to the
//! injected [`Store`].

use std::sync::Arc;

use serde::Serialize;

use credits_core::{
    AccountId, AuditReport, Balance, CreditOptions, DebitOptions, LedgerError, Result,
    Transaction, TransactionId,
};

use crate::Store;

/// Outcome of a successful credit.
#[derive(Debug, Clone, Serialize)]
pub struct CreditReceipt {
    /// The transaction written.
    pub transaction: Transaction,
    /// Balance after the credit.
    pub balance: Balance,
}

/// Outcome of a successful debit.
#[derive(Debug, Clone, Serialize)]
pub struct DebitReceipt {
    /// One transaction per credit bucket drawn, in drain order.
    pub transactions: Vec<Transaction>,
    /// Balance after the debit.
    pub balance: Balance,
}

impl DebitReceipt {
    /// Total credits removed.
    #[must_use]
    pub fn debited(&self) -> i64 {
        -self.transactions.iter().map(|tx| tx.amount).sum::<i64>()
    }

    /// IDs of the transactions written.
    #[must_use]
    pub fn transaction_ids(&self) -> Vec<TransactionId> {
        self.transactions.iter().map(|tx| tx.id).collect()
    }
}

/// Credit ledger service.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    /// Create a ledger over a storage backend.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create the account's balance if it does not exist yet.
    ///
    /// Safe to call repeatedly and concurrently.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the database operation fails.
    pub fn ensure_balance_exists(&self, account_id: &AccountId) -> Result<Balance> {
        Ok(self.store.ensure_balance(account_id)?)
    }

    /// Get the account's balance, creating an empty one if absent.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the database operation fails.
    pub fn get_balance(&self, account_id: &AccountId) -> Result<Balance> {
        match self.store.get_balance(account_id)? {
            Some(balance) => Ok(balance),
            None => self.ensure_balance_exists(account_id),
        }
    }

    /// Check whether the account can pay `amount` credits right now.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the database operation fails.
    pub fn can_afford(&self, account_id: &AccountId, amount: i64) -> Result<bool> {
        Ok(self.get_balance(account_id)?.has_sufficient_credits(amount))
    }

    /// Add credits to an account.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidAmount` if `amount` is not positive or the
    ///   transaction type cannot add credits.
    /// - `LedgerError::Idempotency` if the idempotency key was already applied.
    ///   Nothing is written; callers should treat this as success.
    pub fn credit(
        &self,
        account_id: &AccountId,
        amount: i64,
        options: CreditOptions,
    ) -> Result<CreditReceipt> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        if !options.transaction_type.is_credit() {
            return Err(LedgerError::InvalidAmount(format!(
                "{} transactions cannot add credits",
                options.transaction_type
            )));
        }

        let transaction = Transaction::credit(*account_id, amount, &options);
        let balance = self.store.commit_credit(&transaction).map_err(|e| {
            let err = LedgerError::from(e);
            if err.is_already_applied() {
                tracing::info!(
                    account_id = %account_id,
                    idempotency_key = ?options.idempotency_key,
                    "Credit already applied"
                );
            }
            err
        })?;

        tracing::info!(
            account_id = %account_id,
            amount = amount,
            credit_type = %transaction.credit_type,
            transaction_type = %transaction.transaction_type,
            transaction_id = %transaction.id,
            total_credits = balance.total_credits(),
            "Credits added"
        );

        Ok(CreditReceipt {
            transaction,
            balance,
        })
    }

    /// Remove credits from an account.
    ///
    /// Buckets are drained in [`credits_core::DEBIT_PRIORITY`] order.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidAmount` if `amount` is not positive or the
    ///   transaction type cannot remove credits.
    /// - `LedgerError::InsufficientCredits` if the balance is too low. Nothing
    ///   is written.
    /// - `LedgerError::Idempotency` if the idempotency key was already applied.
    pub fn debit(
        &self,
        account_id: &AccountId,
        amount: i64,
        options: DebitOptions,
    ) -> Result<DebitReceipt> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "debit amount must be positive, got {amount}"
            )));
        }
        if !options.transaction_type.is_debit() {
            return Err(LedgerError::InvalidAmount(format!(
                "{} transactions cannot remove credits",
                options.transaction_type
            )));
        }

        let (balance, transactions) = self
            .store
            .commit_debit(account_id, amount, &options)
            .map_err(|e| {
                let err = LedgerError::from(e);
                if let LedgerError::InsufficientCredits {
                    available,
                    required,
                } = &err
                {
                    tracing::debug!(
                        account_id = %account_id,
                        available = available,
                        required = required,
                        "Debit rejected"
                    );
                }
                err
            })?;

        tracing::info!(
            account_id = %account_id,
            amount = amount,
            rows = transactions.len(),
            total_credits = balance.total_credits(),
            "Credits debited"
        );

        Ok(DebitReceipt {
            transactions,
            balance,
        })
    }

    /// List an account's transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountNotFound` if the account has no ledger
    /// state.
    pub fn transactions(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        self.require_balance(account_id)?;
        Ok(self.store.list_transactions(account_id, limit, offset)?)
    }

    /// Get a single transaction.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the database operation fails.
    pub fn transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        Ok(self.store.get_transaction(transaction_id)?)
    }

    /// Recompute the account's buckets from its transaction log.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountNotFound` if the account has no ledger
    /// state.
    pub fn audit(&self, account_id: &AccountId) -> Result<AuditReport> {
        let balance = self.require_balance(account_id)?;
        let transactions = self.store.list_transactions(account_id, usize::MAX, 0)?;
        let report = AuditReport::compute(&balance, &transactions);

        if !report.is_consistent() {
            tracing::error!(
                account_id = %account_id,
                projected = ?report.projected,
                from_log = ?report.from_log,
                "Balance projection disagrees with transaction log"
            );
        }

        Ok(report)
    }

    fn require_balance(&self, account_id: &AccountId) -> Result<Balance> {
        self.store
            .get_balance(account_id)?
            .ok_or(LedgerError::AccountNotFound {
                account_id: *account_id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RocksStore;
    use credits_core::{CreditType, TransactionType};
    use tempfile::TempDir;

    fn create_test_ledger() -> (Ledger, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (Ledger::new(Arc::new(store)), dir)
    }

    fn assert_conserved(ledger: &Ledger, account_id: &AccountId) {
        let report = ledger.audit(account_id).unwrap();
        assert!(report.is_consistent(), "{report:?}");
        assert_eq!(
            report.from_log.total(),
            ledger.get_balance(account_id).unwrap().total_credits()
        );
    }

    #[test]
    fn purchase_debit_and_replayed_purchase() {
        let (ledger, _dir) = create_test_ledger();
        let account_id = AccountId::generate();

        assert_eq!(ledger.get_balance(&account_id).unwrap().total_credits(), 0);

        let receipt = ledger
            .credit(&account_id, 500, CreditOptions::purchase("sess_abc"))
            .unwrap();
        assert_eq!(receipt.balance.purchased_credits, 500);
        assert_eq!(receipt.balance.total_credits(), 500);

        let receipt = ledger
            .debit(&account_id, 120, DebitOptions::consumption("Keyword research"))
            .unwrap();
        assert_eq!(receipt.balance.total_credits(), 380);
        assert_eq!(receipt.debited(), 120);

        let err = ledger
            .credit(&account_id, 500, CreditOptions::purchase("sess_abc"))
            .unwrap_err();
        assert!(err.is_already_applied());
        assert_eq!(ledger.get_balance(&account_id).unwrap().total_credits(), 380);

        assert_conserved(&ledger, &account_id);
    }

    #[test]
    fn idempotent_credit_applies_once() {
        let (ledger, _dir) = create_test_ledger();
        let account_id = AccountId::generate();

        let first = ledger
            .credit(&account_id, 100, CreditOptions::purchase("evt_1"))
            .unwrap();
        let err = ledger
            .credit(&account_id, 100, CreditOptions::purchase("evt_1"))
            .unwrap_err();

        match err {
            LedgerError::Idempotency {
                key,
                transaction_id,
            } => {
                assert_eq!(key, "evt_1");
                assert_eq!(transaction_id, first.transaction.id);
            }
            other => panic!("expected idempotency error, got {other:?}"),
        }

        assert_eq!(ledger.get_balance(&account_id).unwrap().total_credits(), 100);
        assert_eq!(ledger.transactions(&account_id, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn credit_past_i64_total_is_rejected_without_writes() {
        let (ledger, _dir) = create_test_ledger();
        let account_id = AccountId::generate();
        ledger
            .credit(&account_id, i64::MAX, CreditOptions::bonus("promo"))
            .unwrap();
        let before = ledger.get_balance(&account_id).unwrap();

        let err = ledger
            .credit(&account_id, 1, CreditOptions::purchase("sess_overflow"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));

        assert_eq!(ledger.get_balance(&account_id).unwrap(), before);
        assert_eq!(ledger.transactions(&account_id, 10, 0).unwrap().len(), 1);

        // The key was not recorded, so a corrected retry is not a replay.
        ledger
            .debit(&account_id, 10, DebitOptions::default())
            .unwrap();
        ledger
            .credit(&account_id, 1, CreditOptions::purchase("sess_overflow"))
            .unwrap();
        assert_conserved(&ledger, &account_id);
    }

    #[test]
    fn overdraw_leaves_state_unchanged() {
        let (ledger, _dir) = create_test_ledger();
        let account_id = AccountId::generate();
        ledger
            .credit(&account_id, 50, CreditOptions::bonus("welcome"))
            .unwrap();
        let before = ledger.get_balance(&account_id).unwrap();

        let err = ledger
            .debit(&account_id, 51, DebitOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits {
                available: 50,
                required: 51
            }
        ));

        assert_eq!(ledger.get_balance(&account_id).unwrap(), before);
        assert_eq!(ledger.transactions(&account_id, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn debit_on_unknown_account_is_insufficient() {
        let (ledger, _dir) = create_test_ledger();
        let account_id = AccountId::generate();

        let err = ledger
            .debit(&account_id, 1, DebitOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits {
                available: 0,
                required: 1
            }
        ));
    }

    #[test]
    fn debit_prefers_bonus_then_subscription() {
        let (ledger, _dir) = create_test_ledger();
        let account_id = AccountId::generate();

        ledger
            .credit(&account_id, 100, CreditOptions::purchase("cs_1"))
            .unwrap();
        ledger
            .credit(
                &account_id,
                500,
                CreditOptions::subscription_grant("starter", "in_1"),
            )
            .unwrap();
        ledger
            .credit(&account_id, 20, CreditOptions::bonus("promo"))
            .unwrap();

        let receipt = ledger
            .debit(&account_id, 100, DebitOptions::default())
            .unwrap();

        let drawn: Vec<_> = receipt
            .transactions
            .iter()
            .map(|tx| (tx.credit_type, tx.amount))
            .collect();
        assert_eq!(
            drawn,
            vec![(CreditType::Bonus, -20), (CreditType::Subscription, -80)]
        );
        assert_eq!(receipt.balance.purchased_credits, 100);
        assert_eq!(receipt.balance.subscription_credits, 420);
        assert_conserved(&ledger, &account_id);
    }

    #[test]
    fn idempotent_debit_charges_once() {
        let (ledger, _dir) = create_test_ledger();
        let account_id = AccountId::generate();
        ledger
            .credit(&account_id, 10, CreditOptions::bonus("promo"))
            .unwrap();

        let options = DebitOptions::consumption("Rank check").with_idempotency_key("job_7");
        ledger.debit(&account_id, 3, options.clone()).unwrap();
        let err = ledger.debit(&account_id, 3, options).unwrap_err();

        assert!(err.is_already_applied());
        assert_eq!(ledger.get_balance(&account_id).unwrap().total_credits(), 7);
    }

    #[test]
    fn rejects_non_positive_amounts_and_wrong_direction() {
        let (ledger, _dir) = create_test_ledger();
        let account_id = AccountId::generate();

        assert!(matches!(
            ledger.credit(&account_id, 0, CreditOptions::bonus("x")),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.debit(&account_id, -1, DebitOptions::default()),
            Err(LedgerError::InvalidAmount(_))
        ));

        let mut options = CreditOptions::bonus("x");
        options.transaction_type = TransactionType::Consumption;
        assert!(matches!(
            ledger.credit(&account_id, 5, options),
            Err(LedgerError::InvalidAmount(_))
        ));

        let options = DebitOptions::default().with_transaction_type(TransactionType::Grant);
        assert!(matches!(
            ledger.debit(&account_id, 5, options),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn reads_do_not_create_state() {
        let (ledger, _dir) = create_test_ledger();
        let account_id = AccountId::generate();

        assert!(matches!(
            ledger.transactions(&account_id, 10, 0),
            Err(LedgerError::AccountNotFound { .. })
        ));
        assert!(matches!(
            ledger.audit(&account_id),
            Err(LedgerError::AccountNotFound { .. })
        ));
    }

    #[test]
    fn can_afford_reflects_balance() {
        let (ledger, _dir) = create_test_ledger();
        let account_id = AccountId::generate();

        assert!(!ledger.can_afford(&account_id, 1).unwrap());
        ledger
            .credit(&account_id, 5, CreditOptions::bonus("promo"))
            .unwrap();
        assert!(ledger.can_afford(&account_id, 5).unwrap());
        assert!(!ledger.can_afford(&account_id, 6).unwrap());
    }
}
