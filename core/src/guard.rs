//! Cross-cutting authorization checks shared by the escrow operations.

use subtle::ConstantTimeEq;

use crate::address::{derive, Tag};
use crate::error::AuthorizationError;
use crate::escrow::EscrowHandle;
use crate::identity::Identity;
use crate::Result;

/// Requires the state/vault references in `handle` to be exactly the
/// addresses derived from `claimed`.
///
/// Rejecting here is what stops a caller from pairing one identity with
/// another party's record or vault: references are recomputed, never
/// trusted.
pub fn verify_handle_for(claimed: &Identity, handle: &EscrowHandle) -> Result<()> {
    let state = derive(claimed, Tag::State)?;
    let vault = derive(claimed, Tag::Vault)?;

    let state_ok = state
        .address
        .as_bytes()
        .ct_eq(handle.state.address.as_bytes());
    let vault_ok = vault
        .address
        .as_bytes()
        .ct_eq(handle.vault.address.as_bytes());

    if bool::from(state_ok & vault_ok)
        && state.bump == handle.state.bump
        && vault.bump == handle.vault.bump
    {
        Ok(())
    } else {
        tracing::debug!(%claimed, "escrow references do not match derivation");
        Err(AuthorizationError::AddressMismatch.into())
    }
}

/// Requires `actual` to be the identity holding the expected role.
pub fn expect_identity(expected: &Identity, actual: &Identity) -> Result<()> {
    if bool::from(expected.as_bytes().ct_eq(actual.as_bytes())) {
        Ok(())
    } else {
        tracing::debug!(%actual, "identity does not hold the required role");
        Err(AuthorizationError::UnauthorizedSigner.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EscrowError;

    #[test]
    fn handle_must_derive_from_claimed_identity() {
        let alice = Identity::new([1u8; 32]);
        let carol = Identity::new([9u8; 32]);
        let handle = EscrowHandle::for_initializer(&alice).unwrap();

        assert!(verify_handle_for(&alice, &handle).is_ok());
        assert_eq!(
            verify_handle_for(&carol, &handle).unwrap_err(),
            EscrowError::Authorization(AuthorizationError::AddressMismatch)
        );
    }

    #[test]
    fn tampered_bump_is_rejected() {
        let alice = Identity::new([1u8; 32]);
        let mut handle = EscrowHandle::for_initializer(&alice).unwrap();
        handle.vault.bump = handle.vault.bump.wrapping_add(1);
        assert_eq!(
            verify_handle_for(&alice, &handle).unwrap_err(),
            EscrowError::Authorization(AuthorizationError::AddressMismatch)
        );
    }

    #[test]
    fn role_check() {
        let alice = Identity::new([1u8; 32]);
        let carol = Identity::new([9u8; 32]);
        assert!(expect_identity(&alice, &alice).is_ok());
        assert_eq!(
            expect_identity(&alice, &carol).unwrap_err(),
            EscrowError::Authorization(AuthorizationError::UnauthorizedSigner)
        );
    }
}
