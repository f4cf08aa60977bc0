//! Identities of escrow participants and the signers that prove them.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use serde_with::hex::Hex;
use serde_with::serde_as;

use crate::error::IdentityError;

/// A 32-byte participant identity (an Ed25519 public key in byte form).
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Identity(#[serde_as(as = "Hex")] [u8; 32]);

impl Identity {
    pub const LEN: usize = 32;

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_bytes32(s).map(Self)
    }
}

/// Parses a 32-byte value from hex (optionally `0x`-prefixed) or base58.
pub(crate) fn parse_bytes32(s: &str) -> Result<[u8; 32], IdentityError> {
    if s.is_empty() {
        return Err(IdentityError::EmptyIdentity);
    }
    let bytes = if let Some(stripped) = s.strip_prefix("0x") {
        hex::decode(stripped)?
    } else if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
        hex::decode(s)?
    } else {
        bs58::decode(s).into_vec()?
    };
    let len = bytes.len();
    bytes.try_into().map_err(|_| IdentityError::BadLength(len))
}

/// Proof of control over an [`Identity`].
///
/// Possession of the signing key is what the core trusts as
/// authentication; each operation binds its effects to the identity of
/// the signer it was handed.
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
}

impl Signer {
    /// Generates a fresh signer from the system CSPRNG.
    pub fn generate() -> Self {
        use rand_core::OsRng;

        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic signer from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// The identity this signer proves control of.
    pub fn identity(&self) -> Identity {
        Identity(self.key.verifying_key().to_bytes())
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("identity", &self.identity().to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_formats() {
        let bytes = [7u8; 32];
        let hex_plain = hex::encode(bytes);
        let hex_prefixed = format!("0x{hex_plain}");
        let base58 = bs58::encode(bytes).into_string();

        for s in [hex_plain, hex_prefixed, base58] {
            assert_eq!(Identity::from_str(&s).unwrap(), Identity::new(bytes));
        }
    }

    #[test]
    fn display_round_trip() {
        let id = Identity::new([42u8; 32]);
        assert_eq!(Identity::from_str(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            Identity::from_str("").unwrap_err(),
            IdentityError::EmptyIdentity
        );
        assert_eq!(
            Identity::from_str("0xdeadbeef").unwrap_err(),
            IdentityError::BadLength(4)
        );
        assert!(matches!(
            Identity::from_str("0xzz").unwrap_err(),
            IdentityError::Hex(_)
        ));
        assert!(matches!(
            Identity::from_str("not-base58-0OIl").unwrap_err(),
            IdentityError::Base58(_)
        ));
    }

    #[test]
    fn signer_identity_is_deterministic() {
        let a = Signer::from_seed([1u8; 32]);
        let b = Signer::from_seed([1u8; 32]);
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), Signer::from_seed([2u8; 32]).identity());
    }
}
