//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in column families.

use credits_core::{AccountId, TransactionId};

/// Length of an encoded account or transaction identifier.
const ID_LEN: usize = 16;

/// Create a balance key from an account ID.
#[must_use]
pub fn balance_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create an account-transaction index key.
///
/// Format: `account_id (16 bytes) || transaction_id (16 bytes)`
///
/// Since ULIDs are time-ordered, transactions for an account sort by time.
#[must_use]
pub fn account_transaction_key(account_id: &AccountId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN * 2);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a prefix for iterating all transactions of an account.
#[must_use]
pub fn account_transactions_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create the largest possible index key for an account.
///
/// Seeking backwards from here visits the account's newest transaction first.
#[must_use]
pub fn account_transactions_upper_bound(account_id: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN * 2);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&[0xFF; ID_LEN]);
    key
}

/// Extract the transaction ID from an account-transaction index key.
///
/// Returns `None` if the key is shorter than 32 bytes.
#[must_use]
pub fn extract_transaction_id_from_account_key(key: &[u8]) -> Option<TransactionId> {
    decode_transaction_id(key.get(ID_LEN..ID_LEN * 2)?)
}

/// Create an idempotency key scoped to an account.
///
/// Format: `account_id (16 bytes) || key (UTF-8)`
#[must_use]
pub fn idempotency_key(account_id: &AccountId, key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(ID_LEN + key.len());
    out.extend_from_slice(account_id.as_bytes());
    out.extend_from_slice(key.as_bytes());
    out
}

/// Decode a transaction ID stored as 16 raw bytes.
#[must_use]
pub fn decode_transaction_id(bytes: &[u8]) -> Option<TransactionId> {
    let bytes: [u8; ID_LEN] = bytes.try_into().ok()?;
    Some(TransactionId::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_key_length() {
        let account_id = AccountId::generate();
        assert_eq!(balance_key(&account_id).len(), 16);
    }

    #[test]
    fn account_transaction_key_format() {
        let account_id = AccountId::generate();
        let tx_id = TransactionId::generate();
        let key = account_transaction_key(&account_id, &tx_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], account_id.as_bytes());
        assert_eq!(&key[16..], tx_id.to_bytes());
        assert_eq!(extract_transaction_id_from_account_key(&key), Some(tx_id));
    }

    #[test]
    fn short_index_key_is_rejected() {
        assert_eq!(extract_transaction_id_from_account_key(&[0u8; 20]), None);
    }

    #[test]
    fn upper_bound_sorts_after_every_transaction() {
        let account_id = AccountId::generate();
        let tx_key = account_transaction_key(&account_id, &TransactionId::generate());
        assert!(account_transactions_upper_bound(&account_id) > tx_key);
    }

    #[test]
    fn idempotency_keys_are_scoped_per_account() {
        let a = AccountId::generate();
        let b = AccountId::generate();
        assert_ne!(idempotency_key(&a, "evt_1"), idempotency_key(&b, "evt_1"));
        assert!(idempotency_key(&a, "evt_1").ends_with(b"evt_1"));
    }

    #[test]
    fn idempotency_key_is_account_bytes_then_key() {
        let account_id = AccountId::generate();
        let key = idempotency_key(&account_id, "evt_1");
        assert_eq!(key.len(), ID_LEN + 5);
        assert_eq!(&key[..ID_LEN], account_id.as_bytes());
        assert_eq!(&key[ID_LEN..], b"evt_1");
    }
}
