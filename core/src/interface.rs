//! JSON interface: request parameters and file helpers for client-side
//! round-trips (create an escrow, keep its handle, use it to cancel or
//! exchange later).

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::asset::AssetId;
use crate::error::ValidationError;
use crate::identity::Identity;
use crate::Result;

/// Parameters for [`initialize`](crate::escrow::initialize).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscrowParams {
    /// Sole party permitted to complete the exchange.
    pub taker: Identity,
    /// Asset the initializer locks.
    pub asset_a: AssetId,
    /// Asset the taker must supply.
    pub asset_b: AssetId,
    /// Units of `asset_a` to lock.
    pub amount_a: u64,
    /// Units of `asset_b` requested in return.
    pub amount_b: u64,
}

impl EscrowParams {
    /// Zero-value escrows are rejected up front.
    pub fn validate(&self) -> Result<()> {
        if self.amount_a == 0 || self.amount_b == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        Ok(())
    }
}

/// Reads a JSON-encoded file from `path` and deserializes into `T`.
///
/// # Errors
///
/// Returns an `anyhow::Error` if the file cannot be read or parsed.
pub fn load_escrow_data<P, T>(path: P) -> anyhow::Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("loading escrow data: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing JSON from {:?}", path))
}

/// Writes `data` as pretty-printed JSON to `path`.
///
/// # Errors
///
/// Returns an `anyhow::Error` if the file cannot be created or the data
/// cannot be serialized.
pub fn save_escrow_data<P, T>(path: P, data: &T) -> anyhow::Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating file {:?}", path))?;
    serde_json::to_writer_pretty(file, data)
        .with_context(|| format!("serializing to JSON to {:?}", path))
}
