// Copyright (c) 2024 Botho Foundation

//! Per-transaction output ownership test.
//!
//! Given one transaction, the shared view secret and the set of watched
//! spend keys, decide which outputs belong to which account. This is a pure
//! function of its inputs; amounts, key images and global indices are the
//! transfer builder's business.

use std::collections::{HashMap, HashSet};

use crate::{
    keys::{KeyDerivation, PublicKey, SecretKey},
    onetime_keys::{generate_key_derivation, underive_public_key},
    transaction::{OutputTarget, TransactionReader},
};

/// Find the outputs of `tx` owned by any of `spend_keys`.
///
/// Returns a map from the owning spend key (compressed form) to the owned
/// output indices in transaction order. Derivation failure against a
/// degenerate transaction key yields an empty map.
///
/// One-time-key outputs are underived with a running key index counted over
/// addressable key slots; multisignature sub-keys are underived with the
/// output's own index. Senders target whichever position the output class
/// dictates, so both sides must count the same way for matching to work.
pub fn find_owned_outputs(
    tx: &dyn TransactionReader,
    view_secret: &SecretKey,
    spend_keys: &HashSet<[u8; 32]>,
) -> HashMap<[u8; 32], Vec<u32>> {
    let mut owned: HashMap<[u8; 32], Vec<u32>> = HashMap::new();

    let Some(tx_public_key) = tx.transaction_public_key() else {
        return owned;
    };
    let Some(derivation) = generate_key_derivation(&tx_public_key, view_secret) else {
        return owned;
    };

    let mut key_index: u64 = 0;
    for idx in 0..tx.output_count() {
        let Some(output) = tx.output(idx) else {
            break;
        };

        match &output.target {
            OutputTarget::Key(out) => {
                check_output_key(
                    &derivation,
                    &out.key,
                    key_index,
                    idx as u32,
                    spend_keys,
                    &mut owned,
                );
                key_index += 1;
            }
            OutputTarget::Multisignature(out) => {
                for key in &out.keys {
                    check_output_key(
                        &derivation,
                        key,
                        idx as u64,
                        idx as u32,
                        spend_keys,
                        &mut owned,
                    );
                    key_index += 1;
                }
            }
            OutputTarget::Unknown => {}
        }
    }

    owned
}

fn check_output_key(
    derivation: &KeyDerivation,
    output_key: &PublicKey,
    key_index: u64,
    output_index: u32,
    spend_keys: &HashSet<[u8; 32]>,
    owned: &mut HashMap<[u8; 32], Vec<u32>>,
) {
    let candidate = underive_public_key(derivation, key_index, output_key).to_bytes();

    if spend_keys.contains(&candidate) {
        owned.entry(candidate).or_default().push(output_index);
    }
}
