// Copyright (c) 2024 Botho Foundation

//! Error types for the transfers consumer.

use thiserror::Error;

use crate::node::NodeError;

/// Errors from key parsing and derivation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Bytes do not encode a canonical curve point
    #[error("Invalid curve point")]
    InvalidCurvePoint,

    /// Wrong byte length for a key
    #[error("Key length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    /// Shared-secret derivation produced the identity point
    #[error("Degenerate key derivation")]
    DegenerateDerivation,
}

/// Errors that abort processing of a transaction or a whole batch.
#[derive(Debug, Error, Clone)]
pub enum ConsumerError {
    /// A subscription was offered with a view secret this consumer is not
    /// bound to
    #[error("View secret key mismatch")]
    ViewSecretMismatch,

    /// A scanner hit referenced an output index past the end of the
    /// transaction
    #[error("Output index {index} out of range for transaction {transaction} with {count} outputs")]
    OutputIndexOutOfRange {
        index: u32,
        count: u32,
        transaction: String,
    },

    /// The node returned fewer global indices than the transaction has
    /// outputs
    #[error("Node returned {got} global indices for transaction {transaction} with {expected} outputs")]
    GlobalIndexCountMismatch {
        expected: usize,
        got: usize,
        transaction: String,
    },

    /// A transaction reached transfer building without a transaction public
    /// key
    #[error("Transaction {0} carries no public key")]
    MissingTransactionPublicKey(String),

    /// Key derivation failed while building transfers
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// The node failed to resolve global output indices
    #[error("Node error: {0}")]
    Node(#[from] NodeError),
}
