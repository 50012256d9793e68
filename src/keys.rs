// Copyright (c) 2024 Botho Foundation

//! Curve key types used by the transfers consumer.
//!
//! Everything here is a thin wrapper over Ristretto group elements. Maps and
//! sets throughout the crate are keyed by the compressed `[u8; 32]` form of a
//! key, which is cheap to hash and order.

use core::fmt;

use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::KeyError;

/// A public key: a point on the Ristretto curve.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct PublicKey {
    point: RistrettoPoint,
}

impl PublicKey {
    /// The compressed byte form of this key.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.point.compress().to_bytes()
    }

    /// Generate a random public key (intended for tests and decoys).
    pub fn from_random<T: RngCore + CryptoRng>(rng: &mut T) -> Self {
        Self {
            point: RistrettoPoint::random(rng),
        }
    }
}

impl From<RistrettoPoint> for PublicKey {
    fn from(point: RistrettoPoint) -> Self {
        Self { point }
    }
}

impl AsRef<RistrettoPoint> for PublicKey {
    fn as_ref(&self) -> &RistrettoPoint {
        &self.point
    }
}

impl TryFrom<&[u8; 32]> for PublicKey {
    type Error = KeyError;

    fn try_from(src: &[u8; 32]) -> Result<Self, Self::Error> {
        let point = CompressedRistretto(*src)
            .decompress()
            .ok_or(KeyError::InvalidCurvePoint)?;
        Ok(Self { point })
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;

    fn try_from(src: &[u8]) -> Result<Self, Self::Error> {
        let bytes: &[u8; 32] = src.try_into().map_err(|_| KeyError::LengthMismatch {
            expected: 32,
            found: src.len(),
        })?;
        Self::try_from(bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

/// A secret key: a scalar. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    scalar: Scalar,
}

impl SecretKey {
    /// Generate a random secret key.
    pub fn from_random<T: RngCore + CryptoRng>(rng: &mut T) -> Self {
        Self {
            scalar: Scalar::random(rng),
        }
    }

    /// The public key corresponding to this secret.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(&self.scalar * curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT)
    }

    /// The canonical byte form of the underlying scalar.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.scalar.to_bytes()
    }
}

impl From<Scalar> for SecretKey {
    fn from(scalar: Scalar) -> Self {
        Self { scalar }
    }
}

impl AsRef<Scalar> for SecretKey {
    fn as_ref(&self) -> &Scalar {
        &self.scalar
    }
}

// Secret material never reaches logs.
impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<redacted>)")
    }
}

/// An ephemeral keypair recovered for an owned output.
#[derive(Clone, Debug)]
pub struct KeyPair {
    /// The one-time public key, equal to the output key on the ledger.
    pub public_key: PublicKey,

    /// The one-time secret key able to spend the output.
    pub secret_key: SecretKey,
}

/// The shared secret between a transaction key and a view key.
///
/// Produced by [`generate_key_derivation`](crate::onetime_keys::generate_key_derivation)
/// and consumed by the derive/underive functions; opaque to everything else.
#[derive(Clone, Copy)]
pub struct KeyDerivation {
    point: RistrettoPoint,
}

impl KeyDerivation {
    /// The compressed byte form, used as hash input.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.point.compress().to_bytes()
    }
}

impl From<RistrettoPoint> for KeyDerivation {
    fn from(point: RistrettoPoint) -> Self {
        Self { point }
    }
}

/// The "image" of a one-time key `x`: I = x * Hp(P).
///
/// Spending an output reveals its key image, so a wallet needs it recorded for
/// every owned output to recognize its own spends.
#[derive(Clone, Copy, Serialize, Deserialize, Zeroize)]
pub struct KeyImage {
    point: CompressedRistretto,
}

impl Default for KeyImage {
    fn default() -> Self {
        Self {
            point: CompressedRistretto([0u8; 32]),
        }
    }
}

impl KeyImage {
    /// View the underlying compressed point as an array of bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.point.as_bytes()
    }
}

impl From<RistrettoPoint> for KeyImage {
    fn from(point: RistrettoPoint) -> Self {
        Self {
            point: point.compress(),
        }
    }
}

// Many tests use this.
impl From<u64> for KeyImage {
    fn from(n: u64) -> Self {
        let secret = SecretKey::from(Scalar::from(n));
        crate::onetime_keys::generate_key_image(&secret.public_key(), &secret)
    }
}

impl TryFrom<&[u8; 32]> for KeyImage {
    type Error = KeyError;

    fn try_from(src: &[u8; 32]) -> Result<Self, Self::Error> {
        // Reject encodings that are not canonical curve points.
        let point = CompressedRistretto(*src);
        point.decompress().ok_or(KeyError::InvalidCurvePoint)?;
        Ok(Self { point })
    }
}

impl PartialEq for KeyImage {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for KeyImage {}

impl PartialOrd for KeyImage {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyImage {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Debug for KeyImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl fmt::Display for KeyImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}
