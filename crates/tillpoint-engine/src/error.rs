//! # Engine Error Type
//!
//! Unified error returned by every [`crate::Engine`] operation.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Engine operation                                                       │
//! │  Result<T, EngineError>                                                 │
//! │         │                                                               │
//! │         ├── business rule broken ── CommerceError ──┐                   │
//! │         │                                           │                   │
//! │         ├── storage failed ──────── DbError ────────┼─► EngineError     │
//! │         │     (busy / pool exhausted → retryable)   │   .kind()         │
//! │         │                                           │   .is_retryable() │
//! │         └── bad configuration ───── ConfigError ────┘                   │
//! │                                                                         │
//! │  A storage constraint that encodes a business rule (one open session    │
//! │  per operator, stock never negative) is mapped back to the matching     │
//! │  CommerceError by the service that hit it.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::config::ConfigError;
use tillpoint_core::{CommerceError, ErrorKind, ValidationError};
use tillpoint_db::DbError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    #[error("Storage error: {0}")]
    Db(#[from] DbError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Classification for callers. Storage failures report by what they
    /// mean to the caller: a missing row is NotFound, a violated constraint
    /// is a Conflict, everything else is an Integrity problem.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Commerce(e) => e.kind(),
            EngineError::Db(DbError::NotFound { .. }) => ErrorKind::NotFound,
            EngineError::Db(
                DbError::UniqueViolation { .. }
                | DbError::CheckViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::Busy(_)
                | DbError::PoolExhausted,
            ) => ErrorKind::Conflict,
            EngineError::Db(_) => ErrorKind::Integrity,
            EngineError::Config(_) => ErrorKind::Precondition,
        }
    }

    /// True when the same call may succeed if simply repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Db(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// The business error, if this is one.
    pub fn as_commerce(&self) -> Option<&CommerceError> {
        match self {
            EngineError::Commerce(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Commerce(CommerceError::Validation(err))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
