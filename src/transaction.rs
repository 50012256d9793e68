// Copyright (c) 2024 Botho Foundation

//! Transaction and block surface the consumer scans.
//!
//! The consumer never parses wire bytes itself; the supplying source hands it
//! readers exposing just the fields scanning needs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::keys::PublicKey;

/// A transaction hash.
pub type TransactionHash = [u8; 32];

/// Sentinel height for mempool-resident transactions.
pub const UNCONFIRMED_TRANSACTION_HEIGHT: u64 = u64::MAX;

/// Sentinel global output index carried by mempool-resident transfers.
pub const UNCONFIRMED_TRANSACTION_GLOBAL_INDEX: u32 = u32::MAX;

/// The kind of claim guarding a transaction output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputType {
    /// A one-time stealth key.
    Key,
    /// A multisignature key set.
    Multisignature,
    /// Anything this wallet cannot claim.
    Other,
}

/// A one-time-key output target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOutput {
    /// The one-time stealth key.
    pub key: PublicKey,
}

/// A multisignature output target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisignatureOutput {
    /// The participating one-time keys, one per signer slot.
    pub keys: Vec<PublicKey>,

    /// How many of `keys` must sign to spend.
    pub required_signatures: u32,
}

/// The claim guarding one output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputTarget {
    Key(KeyOutput),
    Multisignature(MultisignatureOutput),
    /// An output class this wallet does not understand; carried through so
    /// positions stay stable but never claimed.
    Unknown,
}

/// One transaction output as seen by the scanner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// Amount in picocredits.
    pub amount: u64,

    /// The claim guarding this output.
    pub target: OutputTarget,
}

impl TransactionOutput {
    /// The output's type tag.
    pub fn output_type(&self) -> OutputType {
        match self.target {
            OutputTarget::Key(_) => OutputType::Key,
            OutputTarget::Multisignature(_) => OutputType::Multisignature,
            OutputTarget::Unknown => OutputType::Other,
        }
    }
}

/// Read access to one parsed transaction.
///
/// Implementations are handed in by the block source; readers cross worker
/// threads during batch preprocessing, hence the `Send + Sync` bound.
pub trait TransactionReader: Send + Sync {
    /// The transaction public key `R`, or `None` when the transaction does
    /// not carry one. Keyless transactions cannot pay this wallet and are
    /// skipped at enumeration.
    fn transaction_public_key(&self) -> Option<PublicKey>;

    /// The transaction hash.
    fn transaction_hash(&self) -> TransactionHash;

    /// Number of outputs.
    fn output_count(&self) -> usize;

    /// The output at `index`, or `None` past the end.
    fn output(&self, index: usize) -> Option<&TransactionOutput>;
}

/// Where in the chain a transaction sits while being processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBlockInfo {
    /// Block height, or [`UNCONFIRMED_TRANSACTION_HEIGHT`] for pool entries.
    pub height: u64,

    /// Block timestamp; zero for pool entries.
    pub timestamp: u64,

    /// Position within the block.
    pub transaction_index: u32,
}

impl TransactionBlockInfo {
    /// Block info for a mempool-resident transaction.
    pub fn unconfirmed() -> Self {
        Self {
            height: UNCONFIRMED_TRANSACTION_HEIGHT,
            timestamp: 0,
            transaction_index: 0,
        }
    }

    /// Whether this transaction is mempool-resident.
    pub fn is_unconfirmed(&self) -> bool {
        self.height == UNCONFIRMED_TRANSACTION_HEIGHT
    }
}

/// Header fields of a fetched block the consumer cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDetails {
    /// The block's timestamp.
    pub timestamp: u64,
}

/// One block of a batch delivered to [`on_new_blocks`].
///
/// A block whose `details` is `None` was announced but not fetched; the
/// consumer skips it and lets a later batch fill the gap.
///
/// [`on_new_blocks`]: crate::consumer::TransfersConsumer::on_new_blocks
#[derive(Clone)]
pub struct CompleteBlock {
    /// The block hash.
    pub hash: TransactionHash,

    /// Header fields, when the block body was fetched.
    pub details: Option<BlockDetails>,

    /// The block's transactions in block order, coinbase included.
    pub transactions: Vec<Arc<dyn TransactionReader>>,
}

/// What a subscription's container records about a known transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInformation {
    /// Height the container believes the transaction sits at; the
    /// unconfirmed sentinel for pool entries.
    pub block_height: u64,

    /// Timestamp of the containing block; zero for pool entries.
    pub timestamp: u64,
}
