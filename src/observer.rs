// Copyright (c) 2024 Botho Foundation

//! Consumer event broadcast.
//!
//! Observers are notified synchronously on the calling thread and must not
//! call back into the consumer from inside a notification.

use std::sync::Arc;

use crate::{account::PublicAddress, transaction::TransactionHash};

/// Events emitted while the consumer digests chain and pool updates.
///
/// Every method has an empty default body so observers implement only what
/// they care about.
pub trait ConsumerObserver: Send + Sync {
    /// A block batch passed preprocessing; its transactions are about to be
    /// applied.
    fn on_blocks_added(&self, _block_hashes: &[TransactionHash]) {}

    /// A chain reorganization removed all blocks above `height`.
    fn on_blockchain_detach(&self, _height: u64) {}

    /// A transaction was recorded or confirmed; `holders` lists the accounts
    /// now holding it.
    fn on_transaction_updated(&self, _tx_hash: &TransactionHash, _holders: &[PublicAddress]) {}

    /// An unconfirmed transaction is about to be dropped from every account.
    fn on_transaction_delete_begin(&self, _tx_hash: &TransactionHash) {}

    /// The drop finished.
    fn on_transaction_delete_end(&self, _tx_hash: &TransactionHash) {}
}

/// A broadcast list of observers.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Vec<Arc<dyn ConsumerObserver>>,
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn add(&mut self, observer: Arc<dyn ConsumerObserver>) {
        self.observers.push(observer);
    }

    /// Invoke `notification` on every registered observer in registration
    /// order.
    pub fn notify<F: Fn(&dyn ConsumerObserver)>(&self, notification: F) {
        for observer in &self.observers {
            notification(observer.as_ref());
        }
    }
}
