//! The escrow state machine: initialize, cancel, exchange.
//!
//! One escrow passes through `NonExistent -> Open -> NonExistent`; the
//! record and its vault are created together by [`initialize`] and
//! destroyed together by whichever of [`cancel`] or [`exchange`] commits
//! first. The loser of that race observes [`EscrowError::NotFound`].

use serde::{Deserialize, Serialize};

use crate::address::{Derived, Tag};
use crate::asset::AssetId;
use crate::error::EscrowError;
use crate::guard;
use crate::identity::{Identity, Signer};
use crate::interface::EscrowParams;
use crate::ledger::{Account, AccountKind, Authority, Ledger, TransferAuthority};
use crate::Result;

/// One open escrow: who locked what, and what completes the swap.
///
/// Write-once: created by [`initialize`], deleted by [`cancel`] or
/// [`exchange`]; no field changes in between.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EscrowRecord {
    /// Party that created the escrow and locked asset A.
    pub initializer: Identity,
    /// Sole party permitted to complete the exchange.
    pub taker: Identity,
    /// Asset locked in the vault.
    pub asset_a: AssetId,
    /// Asset the taker must supply.
    pub asset_b: AssetId,
    /// Units of `asset_a` in custody, owed to the taker on completion.
    pub amount_a: u64,
    /// Units of `asset_b` owed to the initializer on completion.
    pub amount_b: u64,
}

impl EscrowRecord {
    /// Rebuilds the account references for this record.
    pub fn handle(&self) -> Result<EscrowHandle> {
        EscrowHandle::for_initializer(&self.initializer)
    }
}

/// Caller-side reference to an escrow's derived accounts.
///
/// Handles are a convenience only; every operation re-derives the
/// addresses from the relevant identity and rejects references that do
/// not match.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowHandle {
    pub initializer: Identity,
    pub state: Derived,
    pub vault: Derived,
}

impl EscrowHandle {
    /// Derives the escrow account references for `initializer`.
    pub fn for_initializer(initializer: &Identity) -> Result<Self> {
        Ok(Self {
            initializer: *initializer,
            state: crate::address::derive(initializer, Tag::State)?,
            vault: crate::address::derive(initializer, Tag::Vault)?,
        })
    }
}

/// Creates an escrow: locks `amount_a` of `asset_a` from the caller in a
/// protocol-owned vault and records the swap terms.
///
/// Fails without effect if the amounts are zero, an escrow is already
/// open for the caller, or the caller's balance cannot cover the lock.
pub fn initialize(
    ledger: &mut Ledger,
    initializer: &Signer,
    params: &EscrowParams,
) -> Result<EscrowHandle> {
    params.validate()?;
    let caller = initializer.identity();
    let handle = EscrowHandle::for_initializer(&caller)?;

    // The state address is a pure function of the initializer identity,
    // so a live record there means an escrow is already open.
    if ledger.account(&handle.state.address).is_some() {
        return Err(EscrowError::AlreadyExists);
    }

    let record = EscrowRecord {
        initializer: caller,
        taker: params.taker,
        asset_a: params.asset_a,
        asset_b: params.asset_b,
        amount_a: params.amount_a,
        amount_b: params.amount_b,
    };

    let mut txn = ledger.begin();
    txn.create_account(
        handle.state.address,
        Account {
            owner: Authority::Derived(handle.state.address),
            kind: AccountKind::State(record),
        },
    )?;
    txn.create_account(
        handle.vault.address,
        Account {
            owner: Authority::Derived(handle.state.address),
            kind: AccountKind::Asset {
                asset: params.asset_a,
                balance: 0,
            },
        },
    )?;
    let source = txn.ensure_asset_account(&caller, &params.asset_a);
    txn.transfer(
        &params.asset_a,
        &source,
        &handle.vault.address,
        params.amount_a,
        &TransferAuthority::Signed(caller),
    )?;
    txn.commit();

    tracing::info!(
        initializer = %caller,
        taker = %params.taker,
        amount_a = params.amount_a,
        amount_b = params.amount_b,
        "escrow initialized"
    );
    Ok(handle)
}

/// Cancels the caller's open escrow, returning the locked asset to the
/// caller and deleting the record and vault.
///
/// Only the recorded initializer can cancel; the taker holds no cancel
/// privilege.
pub fn cancel(ledger: &mut Ledger, initializer: &Signer, handle: &EscrowHandle) -> Result<()> {
    let caller = initializer.identity();
    // The caller's own identity must re-derive the referenced accounts;
    // a non-initializer cannot pair its signature with someone else's
    // state or vault.
    guard::verify_handle_for(&caller, handle)?;

    let mut txn = ledger.begin();
    let record = match txn.account(&handle.state.address) {
        Some(Account {
            kind: AccountKind::State(record),
            ..
        }) => record.clone(),
        _ => return Err(EscrowError::NotFound),
    };
    guard::expect_identity(&record.initializer, &caller)?;

    let seeds = TransferAuthority::Seeds {
        seed: record.initializer,
        tag: Tag::State,
        bump: handle.state.bump,
    };
    let refund = txn.ensure_asset_account(&caller, &record.asset_a);
    let locked = txn.balance(&handle.vault.address)?;
    txn.transfer(&record.asset_a, &handle.vault.address, &refund, locked, &seeds)?;
    txn.close_account(&handle.vault.address, &seeds)?;
    txn.close_account(&handle.state.address, &seeds)?;
    txn.commit();

    tracing::info!(initializer = %caller, amount_a = locked, "escrow cancelled");
    Ok(())
}

/// Completes the swap: the caller (who must be the recorded taker) pays
/// `amount_b` of `asset_b` to the initializer and receives the vault's
/// locked `asset_a`; the record and vault are deleted.
///
/// Both legs commit together or not at all; no state where only one leg
/// applied is ever observable.
pub fn exchange(ledger: &mut Ledger, taker: &Signer, handle: &EscrowHandle) -> Result<()> {
    let caller = taker.identity();
    // Account references must derive from the initializer named in the
    // handle, which the record check below ties to the stored escrow.
    guard::verify_handle_for(&handle.initializer, handle)?;

    let mut txn = ledger.begin();
    let record = match txn.account(&handle.state.address) {
        Some(Account {
            kind: AccountKind::State(record),
            ..
        }) => record.clone(),
        _ => return Err(EscrowError::NotFound),
    };
    guard::expect_identity(&record.initializer, &handle.initializer)?;
    guard::expect_identity(&record.taker, &caller)?;

    let seeds = TransferAuthority::Seeds {
        seed: record.initializer,
        tag: Tag::State,
        bump: handle.state.bump,
    };

    // Leg 1: taker pays asset B to the initializer.
    let taker_b = txn.ensure_asset_account(&caller, &record.asset_b);
    let initializer_b = txn.ensure_asset_account(&record.initializer, &record.asset_b);
    txn.transfer(
        &record.asset_b,
        &taker_b,
        &initializer_b,
        record.amount_b,
        &TransferAuthority::Signed(caller),
    )?;

    // Leg 2: the vault's full balance goes to the taker.
    let taker_a = txn.ensure_asset_account(&caller, &record.asset_a);
    let locked = txn.balance(&handle.vault.address)?;
    txn.transfer(&record.asset_a, &handle.vault.address, &taker_a, locked, &seeds)?;

    txn.close_account(&handle.vault.address, &seeds)?;
    txn.close_account(&handle.state.address, &seeds)?;
    txn.commit();

    tracing::info!(
        initializer = %record.initializer,
        taker = %caller,
        amount_a = locked,
        amount_b = record.amount_b,
        "escrow exchanged"
    );
    Ok(())
}

/// Snapshot of all open escrows, consistent as of the last commit.
///
/// Discovery only; holds no freshness guarantee beyond that and takes no
/// part in the operations' atomicity.
pub fn open_escrows(ledger: &Ledger) -> Vec<EscrowRecord> {
    ledger
        .accounts()
        .filter_map(|(_, account)| match &account.kind {
            AccountKind::State(record) => Some(record.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn params(taker: Identity, amount_a: u64, amount_b: u64) -> EscrowParams {
        EscrowParams {
            taker,
            asset_a: AssetId::digest("gold"),
            asset_b: AssetId::digest("silver"),
            amount_a,
            amount_b,
        }
    }

    #[test]
    fn zero_amounts_are_rejected() {
        let mut ledger = Ledger::new();
        let alice = Signer::from_seed([1u8; 32]);
        let bob = Signer::from_seed([2u8; 32]);

        for (a, b) in [(0, 10), (10, 0), (0, 0)] {
            assert_eq!(
                initialize(&mut ledger, &alice, &params(bob.identity(), a, b)).unwrap_err(),
                EscrowError::Validation(ValidationError::ZeroAmount)
            );
        }
        assert!(open_escrows(&ledger).is_empty());
    }

    #[test]
    fn one_open_escrow_per_initializer() {
        let mut ledger = Ledger::new();
        let alice = Signer::from_seed([1u8; 32]);
        let bob = Signer::from_seed([2u8; 32]);
        ledger
            .mint(&alice.identity(), &AssetId::digest("gold"), 100)
            .unwrap();

        let p = params(bob.identity(), 10, 20);
        initialize(&mut ledger, &alice, &p).unwrap();
        assert_eq!(
            initialize(&mut ledger, &alice, &p).unwrap_err(),
            EscrowError::AlreadyExists
        );
        assert_eq!(open_escrows(&ledger).len(), 1);
    }
}
