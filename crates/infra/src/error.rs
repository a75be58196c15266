//! Errors surfaced by the ledger service.

use thiserror::Error;

use stockroom_core::DomainError;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The operation was rejected before anything was written.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A lock wait timed out. Nothing was written; the caller may retry.
    #[error("busy: {0}")]
    Busy(String),

    /// Shared state is unusable (a writer panicked mid-commit).
    #[error("ledger state unavailable: {0}")]
    Store(String),
}

impl LedgerError {
    pub fn poisoned() -> Self {
        LedgerError::Store("lock poisoned".to_string())
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            LedgerError::Domain(e) => Some(e),
            _ => None,
        }
    }
}
