// Copyright (c) 2024 Botho Foundation

//! The node interface the consumer queries for global output indices.
//!
//! The node API is callback-shaped; batch preprocessing needs answers
//! in-line, so [`request_global_indices`] parks the calling worker on a
//! one-shot channel until the callback fires.

use thiserror::Error;

use crate::transaction::TransactionHash;

/// Errors a node can report while resolving global output indices.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The transaction is not known to the node
    #[error("Transaction not found")]
    TransactionNotFound,

    /// The request failed in transit or on the node
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The node dropped the request without answering
    #[error("Node disconnected before answering")]
    Disconnected,
}

/// Completion callback for a global-index lookup.
pub type GlobalIndicesCallback = Box<dyn FnOnce(Result<Vec<u32>, NodeError>) + Send>;

/// Block-source capabilities the consumer relies on.
pub trait Node {
    /// Resolve the ledger-wide index of every output of `tx_hash`.
    ///
    /// The callback must eventually be invoked or dropped; dropping it
    /// (e.g. because the node shut down) is reported to the waiter as
    /// [`NodeError::Disconnected`].
    fn transaction_output_global_indices(
        &self,
        tx_hash: &TransactionHash,
        callback: GlobalIndicesCallback,
    );
}

/// Synchronously resolve global output indices through the callback API.
///
/// The waiter owns the receiving half of a one-shot channel whose sending
/// half lives inside the callback, so an abandoned request cannot leak a
/// blocked worker: the channel disconnects and the wait ends.
pub fn request_global_indices<N: Node + ?Sized>(
    node: &N,
    tx_hash: &TransactionHash,
) -> Result<Vec<u32>, NodeError> {
    let (sender, receiver) = crossbeam_channel::bounded(1);

    node.transaction_output_global_indices(
        tx_hash,
        Box::new(move |result| {
            // The waiter may already be gone; nothing to do then.
            let _ = sender.send(result);
        }),
    );

    receiver.recv().unwrap_or(Err(NodeError::Disconnected))
}
