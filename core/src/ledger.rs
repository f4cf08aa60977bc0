//! In-memory ledger modeling the execution environment: accounts with
//! owner authorities, bounded balances, and all-or-nothing transactions.
//!
//! The escrow operations never mutate the store directly. They open a
//! [`Transaction`], stage every effect against it, and publish with one
//! [`Transaction::commit`]; a transaction dropped before commit leaves
//! no observable trace.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::address::{account_address, derive_with_bump, Address, Tag};
use crate::asset::AssetId;
use crate::error::LedgerError;
use crate::escrow::EscrowRecord;
use crate::identity::Identity;

/// Who may move an account's contents.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Authority {
    /// A participant; transfers must carry its proven identity.
    Holder(Identity),
    /// A derived protocol address; transfers must carry seeds that
    /// re-derive it.
    Derived(Address),
}

/// What an account holds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum AccountKind {
    /// Units of one asset type.
    Asset { asset: AssetId, balance: u64 },
    /// An open escrow record.
    State(EscrowRecord),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Account {
    pub owner: Authority,
    pub kind: AccountKind,
}

/// Authority presented with a transfer or close.
#[derive(Debug, Clone)]
pub enum TransferAuthority {
    /// The caller proved control of this identity.
    Signed(Identity),
    /// Protocol authority: seeds that must re-derive the owning address.
    Seeds { seed: Identity, tag: Tag, bump: u8 },
}

impl TransferAuthority {
    fn controls(&self, owner: &Authority) -> bool {
        match (self, owner) {
            (Self::Signed(id), Authority::Holder(holder)) => {
                bool::from(id.as_bytes().ct_eq(holder.as_bytes()))
            }
            (Self::Seeds { seed, tag, bump }, Authority::Derived(address)) => {
                let candidate = derive_with_bump(seed, *tag, *bump);
                bool::from(candidate.as_bytes().ct_eq(address.as_bytes()))
            }
            _ => false,
        }
    }
}

/// The account store.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Ledger {
    accounts: BTreeMap<Address, Account>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` of `asset` to `owner`'s asset account, creating
    /// the account if it does not exist yet. Returns the account address.
    pub fn mint(
        &mut self,
        owner: &Identity,
        asset: &AssetId,
        amount: u64,
    ) -> Result<Address, LedgerError> {
        let address = account_address(owner, asset);
        let account = self.accounts.entry(address).or_insert_with(|| Account {
            owner: Authority::Holder(*owner),
            kind: AccountKind::Asset {
                asset: *asset,
                balance: 0,
            },
        });
        match &mut account.kind {
            AccountKind::Asset { balance, .. } => {
                *balance = balance
                    .checked_add(amount)
                    .ok_or(LedgerError::BalanceOverflow(address))?;
            }
            AccountKind::State(_) => return Err(LedgerError::AssetMismatch(address)),
        }
        Ok(address)
    }

    /// Balance of `owner`'s asset account; zero if the account is absent.
    pub fn balance_of(&self, owner: &Identity, asset: &AssetId) -> u64 {
        match self.accounts.get(&account_address(owner, asset)) {
            Some(Account {
                kind: AccountKind::Asset { balance, .. },
                ..
            }) => *balance,
            _ => 0,
        }
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Iterates all accounts, consistent as of the last commit.
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    /// Opens a unit of work; effects stage until [`Transaction::commit`].
    pub fn begin(&mut self) -> Transaction<'_> {
        Transaction {
            ledger: self,
            staged: BTreeMap::new(),
        }
    }
}

/// All-or-nothing unit of work over a [`Ledger`].
///
/// Reads see staged effects layered over committed state, so precondition
/// checks always observe the transaction's own writes. Dropping the
/// transaction without committing discards every staged effect.
pub struct Transaction<'a> {
    ledger: &'a mut Ledger,
    /// Pending writes; `None` marks a pending deletion.
    staged: BTreeMap<Address, Option<Account>>,
}

impl Transaction<'_> {
    /// Reads an account as of this transaction.
    pub fn account(&self, address: &Address) -> Option<&Account> {
        match self.staged.get(address) {
            Some(staged) => staged.as_ref(),
            None => self.ledger.accounts.get(address),
        }
    }

    /// Balance of the asset account at `address` as of this transaction.
    pub fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        match self.account(address) {
            Some(Account {
                kind: AccountKind::Asset { balance, .. },
                ..
            }) => Ok(*balance),
            Some(_) => Err(LedgerError::AssetMismatch(*address)),
            None => Err(LedgerError::UnknownAccount(*address)),
        }
    }

    /// Stages creation of a new account.
    pub fn create_account(
        &mut self,
        address: Address,
        account: Account,
    ) -> Result<(), LedgerError> {
        if self.account(&address).is_some() {
            return Err(LedgerError::AccountExists(address));
        }
        self.staged.insert(address, Some(account));
        Ok(())
    }

    /// Ensures `owner` has an asset account for `asset`, staging an empty
    /// one if needed. Returns the account address.
    pub fn ensure_asset_account(&mut self, owner: &Identity, asset: &AssetId) -> Address {
        let address = account_address(owner, asset);
        if self.account(&address).is_none() {
            self.staged.insert(
                address,
                Some(Account {
                    owner: Authority::Holder(*owner),
                    kind: AccountKind::Asset {
                        asset: *asset,
                        balance: 0,
                    },
                }),
            );
        }
        address
    }

    /// Moves `amount` units of `asset` between asset accounts.
    ///
    /// `authority` must control the source account. Balances are bounded:
    /// a debit below zero and a credit past `u64::MAX` both fail, and a
    /// failed transfer stages nothing.
    pub fn transfer(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u64,
        authority: &TransferAuthority,
    ) -> Result<(), LedgerError> {
        let source = self
            .account(from)
            .cloned()
            .ok_or(LedgerError::UnknownAccount(*from))?;
        if !authority.controls(&source.owner) {
            return Err(LedgerError::BadAuthority(*from));
        }
        let available = match &source.kind {
            AccountKind::Asset {
                asset: held,
                balance,
            } if held == asset => *balance,
            _ => return Err(LedgerError::AssetMismatch(*from)),
        };
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                account: *from,
                available,
                required: amount,
            });
        }
        // a self-transfer nets to zero once it passes the checks above
        if from == to {
            return Ok(());
        }

        let dest = self
            .account(to)
            .cloned()
            .ok_or(LedgerError::UnknownAccount(*to))?;
        let credited = match &dest.kind {
            AccountKind::Asset {
                asset: held,
                balance,
            } if held == asset => balance
                .checked_add(amount)
                .ok_or(LedgerError::BalanceOverflow(*to))?,
            _ => return Err(LedgerError::AssetMismatch(*to)),
        };

        self.staged.insert(
            *from,
            Some(Account {
                owner: source.owner,
                kind: AccountKind::Asset {
                    asset: *asset,
                    balance: available - amount,
                },
            }),
        );
        self.staged.insert(
            *to,
            Some(Account {
                owner: dest.owner,
                kind: AccountKind::Asset {
                    asset: *asset,
                    balance: credited,
                },
            }),
        );
        Ok(())
    }

    /// Stages closing an account. Asset accounts must be empty and
    /// `authority` must control the account.
    pub fn close_account(
        &mut self,
        address: &Address,
        authority: &TransferAuthority,
    ) -> Result<(), LedgerError> {
        let account = self
            .account(address)
            .ok_or(LedgerError::UnknownAccount(*address))?;
        if !authority.controls(&account.owner) {
            return Err(LedgerError::BadAuthority(*address));
        }
        if let AccountKind::Asset { balance, .. } = &account.kind {
            if *balance != 0 {
                return Err(LedgerError::NonEmptyClose(*address));
            }
        }
        self.staged.insert(*address, None);
        Ok(())
    }

    /// Publishes every staged effect atomically.
    pub fn commit(self) {
        let Transaction { ledger, staged } = self;
        for (address, entry) in staged {
            match entry {
                Some(account) => {
                    ledger.accounts.insert(address, account);
                }
                None => {
                    ledger.accounts.remove(&address);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::derive;

    fn gold() -> AssetId {
        AssetId::digest("gold")
    }

    fn alice() -> Identity {
        Identity::new([1u8; 32])
    }

    fn bob() -> Identity {
        Identity::new([2u8; 32])
    }

    fn funded_ledger() -> (Ledger, Address, Address) {
        let mut ledger = Ledger::new();
        let from = ledger.mint(&alice(), &gold(), 100).unwrap();
        let to = ledger.mint(&bob(), &gold(), 5).unwrap();
        (ledger, from, to)
    }

    #[test]
    fn mint_accumulates() {
        let mut ledger = Ledger::new();
        ledger.mint(&alice(), &gold(), 30).unwrap();
        ledger.mint(&alice(), &gold(), 12).unwrap();
        assert_eq!(ledger.balance_of(&alice(), &gold()), 42);
        assert_eq!(ledger.balance_of(&bob(), &gold()), 0);
    }

    #[test]
    fn mint_overflow_is_bounded() {
        let mut ledger = Ledger::new();
        let addr = ledger.mint(&alice(), &gold(), u64::MAX).unwrap();
        assert_eq!(
            ledger.mint(&alice(), &gold(), 1).unwrap_err(),
            LedgerError::BalanceOverflow(addr)
        );
    }

    #[test]
    fn signed_transfer_moves_funds() {
        let (mut ledger, from, to) = funded_ledger();
        let mut txn = ledger.begin();
        txn.transfer(&gold(), &from, &to, 40, &TransferAuthority::Signed(alice()))
            .unwrap();
        txn.commit();
        assert_eq!(ledger.balance_of(&alice(), &gold()), 60);
        assert_eq!(ledger.balance_of(&bob(), &gold()), 45);
    }

    #[test]
    fn transfer_requires_source_authority() {
        let (mut ledger, from, to) = funded_ledger();
        let mut txn = ledger.begin();
        assert_eq!(
            txn.transfer(&gold(), &from, &to, 1, &TransferAuthority::Signed(bob()))
                .unwrap_err(),
            LedgerError::BadAuthority(from)
        );
    }

    #[test]
    fn transfer_requires_funds() {
        let (mut ledger, from, to) = funded_ledger();
        let mut txn = ledger.begin();
        assert_eq!(
            txn.transfer(&gold(), &from, &to, 101, &TransferAuthority::Signed(alice()))
                .unwrap_err(),
            LedgerError::InsufficientFunds {
                account: from,
                available: 100,
                required: 101,
            }
        );
    }

    #[test]
    fn transfer_checks_asset() {
        let (mut ledger, from, _) = funded_ledger();
        let silver_to = ledger.mint(&bob(), &AssetId::digest("silver"), 0).unwrap();
        let mut txn = ledger.begin();
        assert_eq!(
            txn.transfer(
                &gold(),
                &from,
                &silver_to,
                1,
                &TransferAuthority::Signed(alice())
            )
            .unwrap_err(),
            LedgerError::AssetMismatch(silver_to)
        );
    }

    #[test]
    fn seeds_authority_must_re_derive() {
        let mut ledger = Ledger::new();
        let derived = derive(&alice(), Tag::Vault).unwrap();
        let mut txn = ledger.begin();
        txn.create_account(
            derived.address,
            Account {
                owner: Authority::Derived(derived.address),
                kind: AccountKind::Asset {
                    asset: gold(),
                    balance: 0,
                },
            },
        )
        .unwrap();
        let dest = txn.ensure_asset_account(&bob(), &gold());

        let wrong_seed = TransferAuthority::Seeds {
            seed: bob(),
            tag: Tag::Vault,
            bump: derived.bump,
        };
        assert_eq!(
            txn.transfer(&gold(), &derived.address, &dest, 0, &wrong_seed)
                .unwrap_err(),
            LedgerError::BadAuthority(derived.address)
        );

        let right_seed = TransferAuthority::Seeds {
            seed: alice(),
            tag: Tag::Vault,
            bump: derived.bump,
        };
        txn.transfer(&gold(), &derived.address, &dest, 0, &right_seed)
            .unwrap();
    }

    #[test]
    fn self_transfer_conserves_balance() {
        let (mut ledger, from, _) = funded_ledger();
        let mut txn = ledger.begin();
        txn.transfer(&gold(), &from, &from, 60, &TransferAuthority::Signed(alice()))
            .unwrap();
        assert_eq!(
            txn.transfer(&gold(), &from, &from, 101, &TransferAuthority::Signed(alice()))
                .unwrap_err(),
            LedgerError::InsufficientFunds {
                account: from,
                available: 100,
                required: 101,
            }
        );
        txn.commit();
        assert_eq!(ledger.balance_of(&alice(), &gold()), 100);
    }

    #[test]
    fn dropped_transaction_stages_nothing() {
        let (mut ledger, from, to) = funded_ledger();
        let mut txn = ledger.begin();
        txn.transfer(&gold(), &from, &to, 40, &TransferAuthority::Signed(alice()))
            .unwrap();
        drop(txn);
        assert_eq!(ledger.balance_of(&alice(), &gold()), 100);
        assert_eq!(ledger.balance_of(&bob(), &gold()), 5);
    }

    #[test]
    fn reads_see_staged_writes() {
        let (mut ledger, from, to) = funded_ledger();
        let mut txn = ledger.begin();
        txn.transfer(&gold(), &from, &to, 40, &TransferAuthority::Signed(alice()))
            .unwrap();
        assert_eq!(txn.balance(&from).unwrap(), 60);
        assert_eq!(txn.balance(&to).unwrap(), 45);
    }

    #[test]
    fn create_rejects_duplicates() {
        let (mut ledger, from, _) = funded_ledger();
        let owner = Authority::Holder(alice());
        let mut txn = ledger.begin();
        assert_eq!(
            txn.create_account(
                from,
                Account {
                    owner,
                    kind: AccountKind::Asset {
                        asset: gold(),
                        balance: 0,
                    },
                },
            )
            .unwrap_err(),
            LedgerError::AccountExists(from)
        );
    }

    #[test]
    fn close_requires_empty_balance() {
        let (mut ledger, from, _) = funded_ledger();
        let mut txn = ledger.begin();
        assert_eq!(
            txn.close_account(&from, &TransferAuthority::Signed(alice()))
                .unwrap_err(),
            LedgerError::NonEmptyClose(from)
        );
    }

    #[test]
    fn close_deletes_on_commit() {
        let mut ledger = Ledger::new();
        let addr = ledger.mint(&alice(), &gold(), 0).unwrap();
        let mut txn = ledger.begin();
        txn.close_account(&addr, &TransferAuthority::Signed(alice()))
            .unwrap();
        txn.commit();
        assert!(ledger.account(&addr).is_none());
    }
}
