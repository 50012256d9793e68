// Copyright (c) 2024 Botho Foundation

//! Botho Transfers Consumer
//!
//! The wallet-side subsystem that scans newly announced blocks and mempool
//! deltas for transaction outputs owned by a set of subscribed accounts
//! sharing one view secret. For each matched output it materializes what the
//! wallet needs to later spend it: the recovered key image, the amount and
//! the global ledger index.
//!
//! # Architecture
//!
//! A [`TransfersConsumer`] sits between a block source (the [`Node`] trait)
//! and one subscription per account (the [`TransfersSubscription`] trait).
//! Incoming block batches are preprocessed in parallel: each transaction is
//! run through the output [`scanner`] and the transfer builder on a worker
//! pool. The results are then re-serialized and applied to the subscriptions
//! in `(height, position in block)` order, so container state is independent
//! of worker scheduling.
//!
//! # Security model
//!
//! The view secret never leaves this crate's data structures and spend
//! secrets are touched only to recover key images. The consumer does not
//! validate consensus and does not verify signatures; it trusts the
//! supplying source for block ordering and tolerates chain detaches. The one
//! ledger anomaly it defends against is a duplicated one-time output key,
//! which makes ownership of the key image ambiguous: such transactions are
//! refused credit (see [`seen_keys`]).

pub mod account;
pub mod consumer;
pub mod error;
pub mod keys;
pub mod node;
pub mod observer;
pub mod onetime_keys;
pub mod scanner;
pub mod seen_keys;
pub mod subscription;
pub mod transaction;
pub mod transfers;

pub use account::{AccountKeys, PublicAddress, SynchronizationStart};
pub use consumer::{PreprocessInfo, TransfersConsumer};
pub use error::{ConsumerError, KeyError};
pub use keys::{KeyImage, PublicKey, SecretKey};
pub use node::{GlobalIndicesCallback, Node, NodeError};
pub use observer::ConsumerObserver;
pub use seen_keys::SeenKeysRegistry;
pub use subscription::TransfersSubscription;
pub use transaction::{
    BlockDetails, CompleteBlock, TransactionBlockInfo, TransactionHash, TransactionInformation,
    TransactionOutput, TransactionReader, UNCONFIRMED_TRANSACTION_GLOBAL_INDEX,
    UNCONFIRMED_TRANSACTION_HEIGHT,
};
pub use transfers::{TransferDetail, TransferInfo};
