//! Error kinds for the CUBE core.
//!
//! Three kinds, per the fatal / input-domain / configuration split: fatal
//! errors bubble up as [`CubeError`]; input-domain problems never become a
//! `CubeError` at all (they're counted in [`crate::assimilator::AssimilateReport`]);
//! configuration problems are rejected at construction time, before any grid
//! exists.

use thiserror::Error;

/// Errors that can propagate out of the CUBE core's public operations.
#[derive(Debug, Error)]
pub enum CubeError {
    /// Backing-store I/O failure on a mandatory read or an eviction write.
    #[error("backing store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A hypothesis or tile could not be allocated. Fatal by definition;
    /// the node tracker has no degraded mode to fall back to.
    #[error("allocation failure: {0}")]
    Allocation(String),

    /// Invalid parameters at grid or configuration construction time.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A persisted tile failed its header/version check on load.
    #[error("corrupt tile at ({row}, {col}): {reason}")]
    CorruptTile {
        row: u32,
        col: u32,
        reason: String,
    },
}
