// Copyright (c) 2024 Botho Foundation

//! The per-account subscription interface the consumer drives.
//!
//! A subscription owns one account's transfer container (owned outputs,
//! spends, transaction history). The consumer never looks inside it beyond
//! the two container reads below; everything else is a command.

use crate::{
    account::{AccountKeys, PublicAddress, SynchronizationStart},
    error::ConsumerError,
    transaction::{
        TransactionBlockInfo, TransactionHash, TransactionInformation, TransactionReader,
    },
    transfers::TransferInfo,
};

/// One subscribed account, as seen by the consumer.
///
/// Implementations are handed to [`add_subscription`] fully built; the
/// consumer owns them until [`remove_subscription`] and is their only caller.
/// Getter methods may run on worker threads during batch preprocessing, so
/// implementations must be `Sync` to participate in [`on_new_blocks`].
///
/// [`add_subscription`]: crate::consumer::TransfersConsumer::add_subscription
/// [`remove_subscription`]: crate::consumer::TransfersConsumer::remove_subscription
/// [`on_new_blocks`]: crate::consumer::TransfersConsumer::on_new_blocks
pub trait TransfersSubscription {
    /// Lower bound of the chain range this account wants scanned.
    fn sync_start(&self) -> SynchronizationStart;

    /// The account's keys; the view secret must match the consumer's.
    fn keys(&self) -> &AccountKeys;

    /// The account's public address.
    fn address(&self) -> PublicAddress {
        *self.keys().address()
    }

    /// What the container knows about `tx_hash`, if anything.
    fn transaction_information(&self, tx_hash: &TransactionHash) -> Option<TransactionInformation>;

    /// Hashes of every unconfirmed transaction the container holds.
    fn unconfirmed_transactions(&self) -> Vec<TransactionHash>;

    /// A chain reorganization removed all blocks above `height`.
    fn on_blockchain_detach(&mut self, height: u64);

    /// Batch processing failed at `height`; nothing from it was applied.
    fn on_error(&mut self, error: &ConsumerError, height: u64);

    /// Record a transaction newly seen for this account.
    ///
    /// Returns whether anything was recorded; a subscription may ignore a
    /// transaction carrying no owned outputs and no spends against it.
    fn add_transaction(
        &mut self,
        block_info: &TransactionBlockInfo,
        tx: &dyn TransactionReader,
        transfers: &[TransferInfo],
    ) -> bool;

    /// A previously unconfirmed transaction was mined. One-way: the consumer
    /// never moves a transaction back to the pool through this interface.
    fn mark_transaction_confirmed(
        &mut self,
        block_info: &TransactionBlockInfo,
        tx_hash: &TransactionHash,
        global_indices: &[u32],
    );

    /// The wallet vouches that spending `tx_hash`'s outputs is safe.
    fn mark_transaction_safe(&mut self, tx_hash: &TransactionHash);

    /// Drop an unconfirmed transaction evicted from the pool.
    fn delete_unconfirmed_transaction(&mut self, tx_hash: &TransactionHash);

    /// The account is now synchronized through `height`.
    fn advance_height(&mut self, height: u64);
}
