// Copyright (c) 2024 Botho Foundation

//! Building spendable transfer records from scanner hits.
//!
//! For each output the scanner attributed to an account, the builder
//! materializes what the wallet needs to later spend it: the recovered key
//! image, the amount and the global ledger index. It also enforces the
//! duplicate-output-key defense: a one-time key appearing under two distinct
//! transactions means the ledger is anomalous and neither occurrence is
//! safely spendable, so the offending transaction is refused credit.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    account::AccountKeys,
    error::ConsumerError,
    keys::{KeyImage, PublicKey},
    onetime_keys::generate_key_image_helper,
    seen_keys::{SeenKeys, SeenKeysRegistry},
    transaction::{
        OutputTarget, OutputType, TransactionBlockInfo, TransactionReader,
        UNCONFIRMED_TRANSACTION_GLOBAL_INDEX,
    },
};

/// Type-specific half of a transfer record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDetail {
    /// A one-time-key output we can spend alone.
    Key {
        /// The one-time key as it appears on the ledger.
        output_key: PublicKey,

        /// The recovered key image; spending the output reveals it.
        key_image: KeyImage,
    },

    /// A multisignature output we co-own.
    Multisignature {
        /// How many signers must cooperate to spend.
        required_signatures: u32,
    },
}

/// Everything a subscription records about one owned output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInfo {
    /// The transaction public key the output was derived from.
    pub transaction_public_key: PublicKey,

    /// The output's position within its transaction.
    pub output_in_transaction: u32,

    /// Ledger-wide output index, or the unconfirmed sentinel for pool
    /// transactions.
    pub global_output_index: u32,

    /// Amount in picocredits.
    pub amount: u64,

    /// Type-specific fields.
    pub detail: TransferDetail,
}

impl TransferInfo {
    /// The output's type tag.
    pub fn output_type(&self) -> OutputType {
        match self.detail {
            TransferDetail::Key { .. } => OutputType::Key,
            TransferDetail::Multisignature { .. } => OutputType::Multisignature,
        }
    }
}

/// Build transfer records for the outputs of `tx` owned by `account`.
///
/// `owned_indices` comes from the scanner; `global_indices` holds one ledger
/// index per transaction output and is ignored for unconfirmed transactions.
///
/// A duplicate output key (against the registry or within this call) is a
/// soft failure: the whole transaction is refused credit with `Ok(vec![])`
/// and an error-level log entry, so batch processing continues.
pub fn build_transfers(
    account: &AccountKeys,
    block_info: &TransactionBlockInfo,
    tx: &dyn TransactionReader,
    owned_indices: &[u32],
    global_indices: &[u32],
    seen_keys: &SeenKeysRegistry,
) -> Result<Vec<TransferInfo>, ConsumerError> {
    let tx_hash = tx.transaction_hash();
    let transaction_public_key = tx
        .transaction_public_key()
        .ok_or_else(|| ConsumerError::MissingTransactionPublicKey(hex::encode(tx_hash)))?;

    let mut transfers = Vec::with_capacity(owned_indices.len());
    let mut staged_keys: Vec<[u8; 32]> = Vec::new();

    // Held for the whole check-then-record sequence.
    let mut seen = seen_keys.lock();

    for &idx in owned_indices {
        let output = tx
            .output(idx as usize)
            .ok_or_else(|| ConsumerError::OutputIndexOutOfRange {
                index: idx,
                count: tx.output_count() as u32,
                transaction: hex::encode(tx_hash),
            })?;

        let global_output_index = if block_info.is_unconfirmed() {
            UNCONFIRMED_TRANSACTION_GLOBAL_INDEX
        } else {
            global_indices[idx as usize]
        };

        let detail = match &output.target {
            OutputTarget::Key(out) => {
                let (ephemeral, key_image) =
                    generate_key_image_helper(account, &transaction_public_key, idx as u64)?;

                // The scanner only hands us indices it matched, so the
                // recovered one-time key must equal the ledger's output key.
                debug_assert_eq!(ephemeral.public_key, out.key);

                if !stage_output_key(&seen, &mut staged_keys, &tx_hash, &out.key) {
                    return Ok(Vec::new());
                }

                TransferDetail::Key {
                    output_key: out.key,
                    key_image,
                }
            }
            OutputTarget::Multisignature(out) => {
                for key in &out.keys {
                    if !stage_output_key(&seen, &mut staged_keys, &tx_hash, key) {
                        return Ok(Vec::new());
                    }
                }

                TransferDetail::Multisignature {
                    required_signatures: out.required_signatures,
                }
            }
            OutputTarget::Unknown => continue,
        };

        transfers.push(TransferInfo {
            transaction_public_key,
            output_in_transaction: idx,
            global_output_index,
            amount: output.amount,
            detail,
        });
    }

    seen.record(tx_hash, &staged_keys);

    Ok(transfers)
}

/// Stage one output key for recording, or report the transaction unsafe.
///
/// Keys of an already-recorded transaction are not re-checked: the ledger can
/// legitimately show us the same transaction twice (pool then chain).
fn stage_output_key(
    seen: &SeenKeys,
    staged_keys: &mut Vec<[u8; 32]>,
    tx_hash: &[u8; 32],
    output_key: &PublicKey,
) -> bool {
    if seen.contains_transaction(tx_hash) {
        return true;
    }

    let key_bytes = output_key.to_bytes();

    if seen.contains_output_key(&key_bytes) {
        error!(
            "Failed to process transaction {}: duplicate output key {} is found",
            hex::encode(tx_hash),
            output_key
        );
        return false;
    }

    if staged_keys.contains(&key_bytes) {
        error!(
            "Failed to process transaction {}: the same output key {} is present more than once",
            hex::encode(tx_hash),
            output_key
        );
        return false;
    }

    staged_keys.push(key_bytes);
    true
}
