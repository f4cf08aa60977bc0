use thiserror::Error;

use crate::address::Address;

/// Escrow-related errors.
///
/// Every failure is detected before a transaction commits; an error means
/// nothing observable changed.
#[derive(Debug, Error, PartialEq)]
pub enum EscrowError {
    #[error("validation error: {0}")]
    Validation(ValidationError),

    #[error("authorization error: {0}")]
    Authorization(AuthorizationError),

    /// An open escrow already exists for this initializer.
    #[error("escrow already exists for this initializer")]
    AlreadyExists,

    /// No open escrow (or backing account) where one was expected,
    /// including the loser of a cancel/exchange race.
    #[error("escrow not found")]
    NotFound,

    #[error("insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },
}

/// Rejected inputs and ledger arithmetic violations.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("identity error: {0}")]
    Identity(IdentityError),

    #[error("account does not hold the transferred asset")]
    AssetMismatch,

    #[error("balance overflow on credit")]
    BalanceOverflow,

    #[error("cannot close an account that still holds funds")]
    NonEmptyClose,

    #[error("exhausted bump space deriving address")]
    BumpsExhausted,
}

/// Caller identity does not satisfy the derived-address binding or the
/// role recorded in the escrow.
#[derive(Debug, Error, PartialEq)]
pub enum AuthorizationError {
    /// Supplied state/vault references do not match the derivation.
    #[error("derived address mismatch")]
    AddressMismatch,

    /// Proven identity does not hold the required role.
    #[error("signer does not hold the required role")]
    UnauthorizedSigner,
}

/// Errors that might occur while parsing an identity, asset, or address.
#[derive(Debug, Error, PartialEq)]
pub enum IdentityError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid base58: {0}")]
    Base58(#[from] bs58::decode::Error),

    #[error("expected 32 bytes, got {0}")]
    BadLength(usize),

    #[error("cannot parse identity from empty string")]
    EmptyIdentity,
}

/// Errors surfaced by the ledger primitives.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("insufficient funds in {account}: have {available}, need {required}")]
    InsufficientFunds {
        account: Address,
        available: u64,
        required: u64,
    },

    #[error("no account at {0}")]
    UnknownAccount(Address),

    #[error("account already exists at {0}")]
    AccountExists(Address),

    #[error("authority does not control account {0}")]
    BadAuthority(Address),

    #[error("account {0} does not hold the transferred asset")]
    AssetMismatch(Address),

    #[error("balance overflow crediting {0}")]
    BalanceOverflow(Address),

    #[error("account {0} still holds funds")]
    NonEmptyClose(Address),
}

impl From<ValidationError> for EscrowError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AuthorizationError> for EscrowError {
    fn from(value: AuthorizationError) -> Self {
        Self::Authorization(value)
    }
}

impl From<IdentityError> for ValidationError {
    fn from(value: IdentityError) -> Self {
        Self::Identity(value)
    }
}

impl From<IdentityError> for EscrowError {
    fn from(value: IdentityError) -> Self {
        Self::Validation(ValidationError::Identity(value))
    }
}

impl From<LedgerError> for EscrowError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::InsufficientFunds {
                available,
                required,
                ..
            } => Self::InsufficientFunds {
                available,
                required,
            },
            LedgerError::UnknownAccount(_) => Self::NotFound,
            LedgerError::AccountExists(_) => Self::AlreadyExists,
            LedgerError::BadAuthority(_) => {
                Self::Authorization(AuthorizationError::UnauthorizedSigner)
            }
            LedgerError::AssetMismatch(_) => Self::Validation(ValidationError::AssetMismatch),
            LedgerError::BalanceOverflow(_) => Self::Validation(ValidationError::BalanceOverflow),
            LedgerError::NonEmptyClose(_) => Self::Validation(ValidationError::NonEmptyClose),
        }
    }
}
