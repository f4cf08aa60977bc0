//! Asset-type identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::hex::Hex;
use serde_with::serde_as;
use sha2::{Digest, Sha256};

use crate::error::IdentityError;
use crate::identity::parse_bytes32;

/// Identifies one asset type on the ledger.
///
/// Asset units only ever move between accounts holding the same
/// `AssetId`; the escrow itself never inspects what the identifier
/// stands for.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AssetId(#[serde_as(as = "Hex")] [u8; 32]);

impl AssetId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Asset id from a human-readable label, via SHA-256.
    pub fn digest(label: impl AsRef<[u8]>) -> Self {
        Self(Sha256::digest(label.as_ref()).into())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl FromStr for AssetId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_bytes32(s).map(Self)
    }
}
