//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait
//! on top of a pessimistic `TransactionDB`.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, MultiThreaded, Options,
    TransactionDB, TransactionDBOptions,
};

use credits_core::{AccountId, Balance, DebitOptions, Transaction, TransactionId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// Default time a writer waits for a row lock, in milliseconds.
pub const DEFAULT_LOCK_TIMEOUT_MS: i64 = 5_000;

type Db = TransactionDB<MultiThreaded>;
type DbTransaction<'a> = rocksdb::Transaction<'a, Db>;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<Db>,
}

impl RocksStore {
    /// Open or create a database at the given path with the default lock timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_lock_timeout(path, DEFAULT_LOCK_TIMEOUT_MS)
    }

    /// Open or create a database at the given path.
    ///
    /// `lock_timeout_ms` bounds how long a writer waits for another writer
    /// holding the same balance row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open_with_lock_timeout<P: AsRef<Path>>(path: P, lock_timeout_ms: i64) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(lock_timeout_ms);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(&opts, &txn_db_opts, path, cf_descriptors)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Lock the idempotency key, failing if it was already recorded.
    fn lock_idempotency_key(
        &self,
        txn: &DbTransaction<'_>,
        account_id: &AccountId,
        key: &str,
    ) -> Result<()> {
        let cf = self.cf(cf::IDEMPOTENCY_KEYS)?;
        let existing = txn.get_for_update_cf(&cf, keys::idempotency_key(account_id, key), true)?;

        match existing {
            None => Ok(()),
            Some(bytes) => {
                let transaction_id = keys::decode_transaction_id(&bytes).ok_or_else(|| {
                    StoreError::Serialization(format!("corrupt idempotency entry for {key}"))
                })?;
                Err(StoreError::DuplicateKey {
                    key: key.to_string(),
                    transaction_id,
                })
            }
        }
    }

    /// Lock the balance row, returning a fresh balance if none exists yet.
    fn lock_balance(&self, txn: &DbTransaction<'_>, account_id: &AccountId) -> Result<Balance> {
        let cf = self.cf(cf::BALANCES)?;
        txn.get_for_update_cf(&cf, keys::balance_key(account_id), true)?
            .map_or_else(
                || Ok(Balance::new(*account_id)),
                |data| Self::deserialize(&data),
            )
    }

    /// Stage the balance, the transactions and their index entries.
    fn stage_writes(
        &self,
        txn: &DbTransaction<'_>,
        balance: &Balance,
        transactions: &[Transaction],
    ) -> Result<()> {
        let cf_balances = self.cf(cf::BALANCES)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_account = self.cf(cf::TRANSACTIONS_BY_ACCOUNT)?;
        let cf_idempotency = self.cf(cf::IDEMPOTENCY_KEYS)?;

        txn.put_cf(
            &cf_balances,
            keys::balance_key(&balance.account_id),
            Self::serialize(balance)?,
        )?;

        for transaction in transactions {
            txn.put_cf(
                &cf_tx,
                keys::transaction_key(&transaction.id),
                Self::serialize(transaction)?,
            )?;
            txn.put_cf(
                &cf_tx_by_account,
                keys::account_transaction_key(&transaction.account_id, &transaction.id),
                b"",
            )?;
        }

        // All rows of one mutation share the key; it points at the first row.
        if let Some(first) = transactions.first() {
            if let Some(key) = &first.idempotency_key {
                txn.put_cf(
                    &cf_idempotency,
                    keys::idempotency_key(&first.account_id, key),
                    first.id.to_bytes(),
                )?;
            }
        }

        Ok(())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Balance Operations
    // =========================================================================

    fn ensure_balance(&self, account_id: &AccountId) -> Result<Balance> {
        let cf = self.cf(cf::BALANCES)?;
        let key = keys::balance_key(account_id);

        let txn = self.db.transaction();
        if let Some(data) = txn.get_for_update_cf(&cf, &key, true)? {
            return Self::deserialize(&data);
        }

        let balance = Balance::new(*account_id);
        txn.put_cf(&cf, &key, Self::serialize(&balance)?)?;
        txn.commit()?;

        tracing::debug!(account_id = %account_id, "Created balance");
        Ok(balance)
    }

    fn get_balance(&self, account_id: &AccountId) -> Result<Option<Balance>> {
        let cf = self.cf(cf::BALANCES)?;

        self.db
            .get_cf(&cf, keys::balance_key(account_id))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        let cf = self.cf(cf::TRANSACTIONS)?;

        self.db
            .get_cf(&cf, keys::transaction_key(transaction_id))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_transactions(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let cf_by_account = self.cf(cf::TRANSACTIONS_BY_ACCOUNT)?;
        let prefix = keys::account_transactions_prefix(account_id);
        let upper = keys::account_transactions_upper_bound(account_id);

        // Walk backwards from the end of the account's range: newest first.
        let iter = self
            .db
            .iterator_cf(&cf_by_account, IteratorMode::From(&upper, Direction::Reverse));

        let mut transactions = Vec::new();
        for item in iter.skip(offset) {
            if transactions.len() >= limit {
                break;
            }

            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            let tx_id = keys::extract_transaction_id_from_account_key(&key).ok_or_else(|| {
                StoreError::Serialization("malformed transaction index key".into())
            })?;
            let tx = self.get_transaction(&tx_id)?.ok_or_else(|| StoreError::NotFound {
                entity: "transaction",
                id: tx_id.to_string(),
            })?;
            transactions.push(tx);
        }

        Ok(transactions)
    }

    fn find_idempotency_key(
        &self,
        account_id: &AccountId,
        key: &str,
    ) -> Result<Option<TransactionId>> {
        let cf = self.cf(cf::IDEMPOTENCY_KEYS)?;

        self.db
            .get_cf(&cf, keys::idempotency_key(account_id, key))?
            .map(|bytes| {
                keys::decode_transaction_id(&bytes).ok_or_else(|| {
                    StoreError::Serialization(format!("corrupt idempotency entry for {key}"))
                })
            })
            .transpose()
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn commit_credit(&self, transaction: &Transaction) -> Result<Balance> {
        if transaction.amount <= 0 {
            return Err(StoreError::InvalidAmount(format!(
                "credit amount must be positive, got {}",
                transaction.amount
            )));
        }

        let account_id = &transaction.account_id;
        let txn = self.db.transaction();

        // Lock order: idempotency key, then balance.
        if let Some(key) = &transaction.idempotency_key {
            self.lock_idempotency_key(&txn, account_id, key)?;
        }
        let mut balance = self.lock_balance(&txn, account_id)?;

        balance.apply(transaction)?;
        self.stage_writes(&txn, &balance, std::slice::from_ref(transaction))?;
        txn.commit()?;

        Ok(balance)
    }

    fn commit_debit(
        &self,
        account_id: &AccountId,
        amount: i64,
        options: &DebitOptions,
    ) -> Result<(Balance, Vec<Transaction>)> {
        let txn = self.db.transaction();

        if let Some(key) = &options.idempotency_key {
            self.lock_idempotency_key(&txn, account_id, key)?;
        }
        let mut balance = self.lock_balance(&txn, account_id)?;

        let draws = balance.plan_debit(amount)?;
        let transactions: Vec<_> = draws
            .into_iter()
            .map(|(credit_type, take)| Transaction::debit(*account_id, credit_type, take, options))
            .collect();
        for transaction in &transactions {
            balance.apply(transaction)?;
        }

        self.stage_writes(&txn, &balance, &transactions)?;
        txn.commit()?;

        Ok((balance, transactions))
    }
}
