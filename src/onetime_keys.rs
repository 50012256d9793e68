// Copyright (c) 2024 Botho Foundation

//! One-time (stealth) output key derivation.
//!
//! # Protocol
//!
//! **Sender (creating output `n` for address `(S, V)`):**
//! 1. Pick a transaction key pair `(r, R = r * G)` and publish `R`.
//! 2. Derive the shared secret `D = r * V`.
//! 3. Compute the one-time output key `P = Hs(D || n) * G + S`.
//!
//! **Recipient (scanning with view secret `v`, since `D = v * R`):**
//! 1. Recompute `D = v * R`.
//! 2. "Underive" the candidate spend key `S' = P - Hs(D || n) * G`.
//! 3. If `S'` is one of the wallet's spend keys, the output is owned.
//! 4. Spending key: `x = Hs(D || n) + s`; key image: `I = x * Hp(P)`.
//!
//! Only the holder of the view secret can run step 2, and only the holder of
//! the spend secret can produce `x`, so detection and spend authority stay
//! separable.

use blake2::{Blake2b512, Digest};
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT, ristretto::RistrettoPoint, scalar::Scalar,
    traits::IsIdentity,
};

use crate::{
    account::AccountKeys,
    error::KeyError,
    keys::{KeyDerivation, KeyImage, KeyPair, PublicKey, SecretKey},
};

const G: RistrettoPoint = RISTRETTO_BASEPOINT_POINT;

/// Domain separator for hashing a key derivation to a scalar
const DERIVATION_TO_SCALAR_DOMAIN_TAG: &[u8] = b"botho-derivation-to-scalar-v1";

/// Domain separator for hashing a public key to a curve point
const HASH_TO_POINT_DOMAIN_TAG: &[u8] = b"botho-key-image-base-v1";

/// Hashes a key derivation and an output position to a Scalar: `Hs(D || n)`.
fn derivation_to_scalar(derivation: &KeyDerivation, index: u64) -> Scalar {
    let mut hasher = Blake2b512::new();
    hasher.update(DERIVATION_TO_SCALAR_DOMAIN_TAG);
    hasher.update(derivation.to_bytes());
    hasher.update(index.to_le_bytes());
    Scalar::from_hash(hasher)
}

/// Hashes a public key to a curve point: `Hp(P)`, the key-image base.
fn hash_to_point(public_key: &PublicKey) -> RistrettoPoint {
    let mut hasher = Blake2b512::new();
    hasher.update(HASH_TO_POINT_DOMAIN_TAG);
    hasher.update(public_key.to_bytes());
    RistrettoPoint::from_hash(hasher)
}

/// Computes the shared secret `D = secret * public`.
///
/// Returns `None` when the result is degenerate (the identity point), which
/// happens for a null transaction key. A transaction carrying one cannot be
/// scanned and is treated as owning nothing.
pub fn generate_key_derivation(
    public_key: &PublicKey,
    secret_key: &SecretKey,
) -> Option<KeyDerivation> {
    let shared: RistrettoPoint = secret_key.as_ref() * public_key.as_ref();
    if shared.is_identity() {
        return None;
    }
    Some(KeyDerivation::from(shared))
}

/// Sender-side one-time key construction: `P = Hs(D || n) * G + S`.
pub fn derive_public_key(
    derivation: &KeyDerivation,
    index: u64,
    spend_public_key: &PublicKey,
) -> PublicKey {
    let hs = derivation_to_scalar(derivation, index);
    PublicKey::from(hs * G + spend_public_key.as_ref())
}

/// One-time secret key construction: `x = Hs(D || n) + s`.
pub fn derive_secret_key(
    derivation: &KeyDerivation,
    index: u64,
    spend_secret_key: &SecretKey,
) -> SecretKey {
    let hs = derivation_to_scalar(derivation, index);
    SecretKey::from(hs + spend_secret_key.as_ref())
}

/// Recipient-side inversion: `S' = P - Hs(D || n) * G`.
///
/// When the output was built for one of our spend keys with the same
/// derivation and position, the result is that spend key; otherwise it is an
/// unrelated point.
pub fn underive_public_key(
    derivation: &KeyDerivation,
    index: u64,
    output_key: &PublicKey,
) -> PublicKey {
    let hs = derivation_to_scalar(derivation, index);
    PublicKey::from(output_key.as_ref() - hs * G)
}

/// Computes the key image `I = x * Hp(P)` of a one-time key pair.
pub fn generate_key_image(
    onetime_public_key: &PublicKey,
    onetime_secret_key: &SecretKey,
) -> KeyImage {
    let base = hash_to_point(onetime_public_key);
    KeyImage::from(onetime_secret_key.as_ref() * base)
}

/// Recovers the ephemeral key pair and key image for an owned output.
///
/// `output_index` is the output's position within the transaction. The caller
/// is expected to check the recovered public key against the output key on
/// the ledger.
pub fn generate_key_image_helper(
    account: &AccountKeys,
    tx_public_key: &PublicKey,
    output_index: u64,
) -> Result<(KeyPair, KeyImage), KeyError> {
    let derivation = generate_key_derivation(tx_public_key, account.view_secret_key())
        .ok_or(KeyError::DegenerateDerivation)?;

    let public_key = derive_public_key(
        &derivation,
        output_index,
        account.address().spend_public_key(),
    );
    let secret_key = derive_secret_key(&derivation, output_index, account.spend_secret_key());
    let key_image = generate_key_image(&public_key, &secret_key);

    Ok((
        KeyPair {
            public_key,
            secret_key,
        },
        key_image,
    ))
}
