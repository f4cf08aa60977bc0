//! Deterministic derivation of account addresses.
//!
//! Protocol-owned accounts (the escrow record and its vault) live at
//! addresses computed from the initializer's identity and a fixed tag.
//! Every operation re-derives these addresses and compares them against
//! whatever the caller supplied, so no request can substitute a vault or
//! record belonging to someone else.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use serde_with::hex::Hex;
use serde_with::serde_as;
use sha2::{Digest, Sha256};

use crate::asset::AssetId;
use crate::error::{IdentityError, ValidationError};
use crate::identity::{parse_bytes32, Identity};

/// Domain separator for derived protocol addresses.
const DERIVE_DOMAIN: &[u8] = b"swapvault/derive/v1";

/// Domain separator for ordinary per-owner asset accounts.
const ACCOUNT_DOMAIN: &[u8] = b"swapvault/account/v1";

/// Fixed derivation tags; one escrow uses one address per tag.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    /// The escrow record account.
    State,
    /// The custody vault account.
    Vault,
}

impl Tag {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::State => b"state",
            Self::Vault => b"vault",
        }
    }
}

/// A 32-byte ledger account address.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address(#[serde_as(as = "Hex")] [u8; 32]);

impl Address {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl FromStr for Address {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_bytes32(s).map(Self)
    }
}

/// A derived address together with its bump disambiguator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
    pub address: Address,
    pub bump: u8,
}

/// Derives the protocol account address for `seed` under `tag`.
///
/// Walks bump values downward and returns the first candidate digest
/// that is not a valid curve point, so a derived address can never
/// coincide with a participant identity and no signing key exists for
/// it. Deterministic: same inputs, same result.
pub fn derive(seed: &Identity, tag: Tag) -> Result<Derived, ValidationError> {
    for bump in (0..=u8::MAX).rev() {
        let address = derive_with_bump(seed, tag, bump);
        if !is_curve_point(&address) {
            return Ok(Derived { address, bump });
        }
    }
    Err(ValidationError::BumpsExhausted)
}

/// Single-candidate derivation, used to verify a claimed
/// `(address, bump)` pair rather than trust it.
pub fn derive_with_bump(seed: &Identity, tag: Tag, bump: u8) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(DERIVE_DOMAIN);
    hasher.update(tag.as_bytes());
    hasher.update(seed.as_bytes());
    hasher.update([bump]);
    Address(hasher.finalize().into())
}

/// Address of `owner`'s asset account for `asset`.
pub fn account_address(owner: &Identity, asset: &AssetId) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(ACCOUNT_DOMAIN);
    hasher.update(owner.as_bytes());
    hasher.update(asset.as_bytes());
    Address(hasher.finalize().into())
}

fn is_curve_point(address: &Address) -> bool {
    VerifyingKey::from_bytes(address.as_bytes()).is_ok()
}
