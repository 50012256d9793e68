// Copyright (c) 2024 Botho Foundation

//! Account addresses, account keys and per-account sync bounds.
//!
//! An account is a pair of key pairs: the view pair `(v, V)` used for
//! detecting owned outputs and the spend pair `(s, S)` granting spend
//! authority. The consumer is bound to one view secret; every subscribed
//! account shares it and is identified by its spend public key.

use core::fmt;

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::keys::{PublicKey, SecretKey};

/// A user's public address.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct PublicAddress {
    /// The public spend key `S`.
    spend_public_key: PublicKey,

    /// The public view key `V`.
    view_public_key: PublicKey,
}

impl PublicAddress {
    /// Create a new public address from a key pair.
    #[inline]
    pub fn new(spend_public_key: &PublicKey, view_public_key: &PublicKey) -> Self {
        Self {
            spend_public_key: *spend_public_key,
            view_public_key: *view_public_key,
        }
    }

    /// Get the public spend key.
    pub fn spend_public_key(&self) -> &PublicKey {
        &self.spend_public_key
    }

    /// Get the public view key.
    pub fn view_public_key(&self) -> &PublicKey {
        &self.view_public_key
    }
}

impl fmt::Display for PublicAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BTH")?;
        for byte in self
            .spend_public_key
            .to_bytes()
            .iter()
            .chain(self.view_public_key.to_bytes().iter())
        {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PublicAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Complete account keys: the address plus both secret halves.
///
/// Held per subscription and used only when building transfers (key-image
/// generation). This should only ever be present in client code.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccountKeys {
    /// The account's public address.
    address: PublicAddress,

    /// Secret key `s` granting spend authority.
    spend_secret_key: SecretKey,

    /// Secret key `v` used for view-key matching.
    view_secret_key: SecretKey,
}

impl AccountKeys {
    /// Assemble account keys from their parts.
    ///
    /// The address is taken as given; callers derive it from the secrets when
    /// constructing fresh accounts.
    pub fn new(
        address: PublicAddress,
        spend_secret_key: SecretKey,
        view_secret_key: SecretKey,
    ) -> Self {
        Self {
            address,
            spend_secret_key,
            view_secret_key,
        }
    }

    /// Create account keys with random secrets (intended for tests).
    pub fn random<T: RngCore + CryptoRng>(rng: &mut T) -> Self {
        let spend_secret_key = SecretKey::from_random(rng);
        let view_secret_key = SecretKey::from_random(rng);
        let address = PublicAddress::new(
            &spend_secret_key.public_key(),
            &view_secret_key.public_key(),
        );
        Self::new(address, spend_secret_key, view_secret_key)
    }

    /// Create account keys sharing an existing view secret (intended for
    /// tests covering several accounts under one view-key family).
    pub fn random_with_view_secret<T: RngCore + CryptoRng>(
        view_secret_key: &SecretKey,
        rng: &mut T,
    ) -> Self {
        let spend_secret_key = SecretKey::from_random(rng);
        let address = PublicAddress::new(
            &spend_secret_key.public_key(),
            &view_secret_key.public_key(),
        );
        Self::new(address, spend_secret_key, view_secret_key.clone())
    }

    /// Get the public address.
    pub fn address(&self) -> &PublicAddress {
        &self.address
    }

    /// Get the spend secret key.
    pub fn spend_secret_key(&self) -> &SecretKey {
        &self.spend_secret_key
    }

    /// Get the view secret key.
    pub fn view_secret_key(&self) -> &SecretKey {
        &self.view_secret_key
    }
}

impl fmt::Debug for AccountKeys {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AccountKeys({:?})", self.address)
    }
}

/// Lower bound for scanning on behalf of one account.
///
/// Aggregated across a consumer's subscriptions as a component-wise minimum;
/// the empty aggregate is `(u64::MAX, u64::MAX)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynchronizationStart {
    /// First block height this account cares about.
    pub height: u64,

    /// Earliest block timestamp this account cares about. Zero disables
    /// timestamp filtering.
    pub timestamp: u64,
}

impl SynchronizationStart {
    /// Create a sync start from its parts.
    pub fn new(height: u64, timestamp: u64) -> Self {
        Self { height, timestamp }
    }

    /// The component-wise minimum of two sync starts.
    pub fn component_min(&self, other: &Self) -> Self {
        Self {
            height: self.height.min(other.height),
            timestamp: self.timestamp.min(other.timestamp),
        }
    }
}

impl Default for SynchronizationStart {
    fn default() -> Self {
        Self {
            height: u64::MAX,
            timestamp: u64::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand_core::SeedableRng;

    #[test]
    fn test_random_account_address_matches_secrets() {
        let mut rng = StdRng::seed_from_u64(91);
        let keys = AccountKeys::random(&mut rng);

        assert_eq!(
            keys.address().spend_public_key(),
            &keys.spend_secret_key().public_key()
        );
        assert_eq!(
            keys.address().view_public_key(),
            &keys.view_secret_key().public_key()
        );
    }

    #[test]
    fn test_shared_view_secret_accounts_differ_by_spend_key() {
        let mut rng = StdRng::seed_from_u64(92);
        let view_secret = SecretKey::from_random(&mut rng);

        let a = AccountKeys::random_with_view_secret(&view_secret, &mut rng);
        let b = AccountKeys::random_with_view_secret(&view_secret, &mut rng);

        assert_eq!(a.view_secret_key(), b.view_secret_key());
        assert_ne!(
            a.address().spend_public_key(),
            b.address().spend_public_key()
        );
    }

    #[test]
    fn test_address_display_is_prefixed_hex() {
        let mut rng = StdRng::seed_from_u64(93);
        let keys = AccountKeys::random(&mut rng);

        let shown = keys.address().to_string();
        assert!(shown.starts_with("BTH"));
        assert_eq!(shown.len(), 3 + 2 * 64);
    }

    #[test]
    fn test_sync_start_component_min() {
        let a = SynchronizationStart::new(100, 5_000);
        let b = SynchronizationStart::new(200, 1_000);

        let min = a.component_min(&b);
        assert_eq!(min, SynchronizationStart::new(100, 1_000));
    }

    #[test]
    fn test_sync_start_default_is_max() {
        let empty = SynchronizationStart::default();
        assert_eq!(empty.height, u64::MAX);
        assert_eq!(empty.timestamp, u64::MAX);

        let sub = SynchronizationStart::new(7, 9);
        assert_eq!(empty.component_min(&sub), sub);
    }
}
