//! Core error taxonomy (spec.md §7).
//!
//! Transient kinds (`Unavailable`, `Timeout`, `RateLimited`) are retried by
//! the dispatcher. Deterministic kinds (`InvalidTransition`, `NotFound`,
//! `ContentFiltered`, `Conflict` after one reload) are surfaced to the
//! caller and end the attempt.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("content filtered: {0}")]
    ContentFiltered(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Whether a worker/dispatcher should retry after this error (spec.md §7).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WorkflowError::Unavailable(_) | WorkflowError::Timeout(_) | WorkflowError::RateLimited(_)
        )
    }

    /// The stable error kind string surfaced to callers (spec.md §6.1).
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::InvalidTransition(_) => "invalid_transition",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::Unavailable(_) => "unavailable",
            WorkflowError::Timeout(_) => "timeout",
            WorkflowError::RateLimited(_) => "rate_limited",
            WorkflowError::ContentFiltered(_) => "content_filtered",
            WorkflowError::Internal(_) => "internal",
        }
    }
}

impl From<texloom_store::StoreError> for WorkflowError {
    fn from(e: texloom_store::StoreError) -> Self {
        match e {
            texloom_store::StoreError::NotFound(id) => WorkflowError::NotFound(id),
            texloom_store::StoreError::Conflict { id, expected, actual } => {
                WorkflowError::Conflict(format!("stale update for {id}: expected version {expected}, found {actual}"))
            }
            texloom_store::StoreError::Unavailable(msg) => WorkflowError::Unavailable(msg),
            texloom_store::StoreError::Internal(msg) => WorkflowError::Internal(msg),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds() {
        assert!(WorkflowError::Unavailable("x".into()).is_transient());
        assert!(WorkflowError::Timeout("x".into()).is_transient());
        assert!(WorkflowError::RateLimited("x".into()).is_transient());
        assert!(!WorkflowError::InvalidTransition("x".into()).is_transient());
        assert!(!WorkflowError::NotFound("x".into()).is_transient());
    }

    #[test]
    fn kind_strings_match_spec() {
        assert_eq!(WorkflowError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(WorkflowError::Conflict("x".into()).kind(), "conflict");
        assert_eq!(WorkflowError::ContentFiltered("x".into()).kind(), "content_filtered");
    }

    #[test]
    fn store_conflict_maps_to_conflict() {
        let e = texloom_store::StoreError::Conflict {
            id: "b1".into(),
            expected: 2,
            actual: 3,
        };
        let wf: WorkflowError = e.into();
        assert!(matches!(wf, WorkflowError::Conflict(_)));
    }
}
