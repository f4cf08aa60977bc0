//! Two-party conditional asset swaps over derived custody accounts.
//!
//! An initializer locks a quantity of one asset in a protocol-owned
//! vault and names the taker and the quantity of a second asset it wants
//! in return. The taker may complete the swap atomically, or the
//! initializer may cancel and reclaim its asset; either way the record
//! and vault are destroyed together. All account references are derived
//! from the initializer's identity and re-verified on every operation.

/// Deterministic account address derivation
pub mod address;
/// Asset-type identifiers
pub mod asset;
pub mod error;
/// Escrow record, handle, and the three state-machine operations
pub mod escrow;
/// Cross-cutting authorization checks
pub mod guard;
/// Participant identities and signers
pub mod identity;
/// JSON parameters and file helpers
pub mod interface;
/// Modeled account store with all-or-nothing transactions
pub mod ledger;

pub use address::{account_address, derive, derive_with_bump, Address, Derived, Tag};
pub use asset::AssetId;
pub use error::{
    AuthorizationError, EscrowError, IdentityError, LedgerError, ValidationError,
};
pub use escrow::{cancel, exchange, initialize, open_escrows, EscrowHandle, EscrowRecord};
pub use identity::{Identity, Signer};
pub use interface::EscrowParams;
pub use ledger::{Account, AccountKind, Authority, Ledger, Transaction, TransferAuthority};

pub type Result<T> = std::result::Result<T, EscrowError>;
