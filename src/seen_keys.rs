// Copyright (c) 2024 Botho Foundation

//! Registry of output keys already credited during this run.
//!
//! A well-formed ledger never carries the same one-time output key twice.
//! When it does, the wallet cannot tell which transaction's key image is the
//! spendable one, so the transfer builder refuses to credit any transaction
//! re-using a key this registry has seen. The registry lives for the process
//! and is not persisted: its job is to catch ledger anomalies observed within
//! a run, and callers re-seed it from persisted wallet state on startup via
//! [`insert`](SeenKeysRegistry::insert).

use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard},
};

use crate::transaction::TransactionHash;

/// The registry contents. Append-only.
#[derive(Debug, Default)]
pub struct SeenKeys {
    transactions: HashSet<TransactionHash>,
    output_keys: HashSet<[u8; 32]>,
}

impl SeenKeys {
    /// Whether this transaction's keys were already recorded.
    pub fn contains_transaction(&self, tx_hash: &TransactionHash) -> bool {
        self.transactions.contains(tx_hash)
    }

    /// Whether some earlier transaction emitted this output key.
    pub fn contains_output_key(&self, output_key: &[u8; 32]) -> bool {
        self.output_keys.contains(output_key)
    }

    /// Record a processed transaction and the output keys it emitted.
    pub fn record(&mut self, tx_hash: TransactionHash, output_keys: &[[u8; 32]]) {
        self.transactions.insert(tx_hash);
        self.output_keys.extend(output_keys.iter().copied());
    }
}

/// Shared, mutex-guarded [`SeenKeys`].
///
/// The transfer builder holds the guard across its whole check-then-record
/// sequence so concurrent builders cannot interleave between the duplicate
/// check and the insert.
#[derive(Debug, Default)]
pub struct SeenKeysRegistry {
    inner: Mutex<SeenKeys>,
}

impl SeenKeysRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the registry for a check-then-record sequence.
    pub fn lock(&self) -> MutexGuard<'_, SeenKeys> {
        self.inner.lock().expect("seen-keys mutex poisoned")
    }

    /// Record a single transaction/output-key pair.
    ///
    /// Used to re-seed the registry from persisted wallet state.
    pub fn insert(&self, tx_hash: TransactionHash, output_key: [u8; 32]) {
        let mut inner = self.lock();
        inner.transactions.insert(tx_hash);
        inner.output_keys.insert(output_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_lookup() {
        let registry = SeenKeysRegistry::new();
        let tx_hash = [1u8; 32];
        let keys = [[2u8; 32], [3u8; 32]];

        {
            let mut seen = registry.lock();
            assert!(!seen.contains_transaction(&tx_hash));
            seen.record(tx_hash, &keys);
        }

        let seen = registry.lock();
        assert!(seen.contains_transaction(&tx_hash));
        assert!(seen.contains_output_key(&[2u8; 32]));
        assert!(seen.contains_output_key(&[3u8; 32]));
        assert!(!seen.contains_output_key(&[4u8; 32]));
    }

    #[test]
    fn test_insert_seeds_both_sets() {
        let registry = SeenKeysRegistry::new();
        registry.insert([7u8; 32], [8u8; 32]);

        let seen = registry.lock();
        assert!(seen.contains_transaction(&[7u8; 32]));
        assert!(seen.contains_output_key(&[8u8; 32]));
    }

    #[test]
    fn test_record_with_no_keys_still_marks_transaction() {
        let registry = SeenKeysRegistry::new();
        registry.lock().record([9u8; 32], &[]);

        assert!(registry.lock().contains_transaction(&[9u8; 32]));
    }
}
