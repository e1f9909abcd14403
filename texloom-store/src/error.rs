//! Store error taxonomy.
//!
//! Maps 1:1 onto the subset of the core's error taxonomy that a persistence
//! call can produce (spec.md §6.3): `not_found`, `conflict`, `unavailable`,
//! `internal`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency version check failed. The caller must reload
    /// and retry the transition (spec.md §4.1: `stale_update`).
    #[error("stale update for {id}: expected version {expected}, found {actual}")]
    Conflict { id: String, expected: u64, actual: u64 },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("internal store error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Internal(format!("serialization error: {e}"))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}
