//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Classified by SQLite message                   │
//! │       │                                                                 │
//! │       ├── UNIQUE / FOREIGN KEY / CHECK → constraint variants            │
//! │       ├── RAISE(ABORT, 'append-only: ...') → Immutable                  │
//! │       └── database is locked / busy    → Busy (retryable)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EngineError (tillpoint-engine) ← kind() / is_retryable()               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second open session for one operator
    /// - Duplicate SKU or receipt number
    /// - Two active exchange rates
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (negative stock, paid above total...).
    #[error("Check constraint violated: {message}")]
    CheckViolation { message: String },

    /// A trigger refused to modify an append-only or sealed row.
    #[error("Immutable record: {message}")]
    Immutable { message: String },

    /// The write lock could not be taken within busy_timeout.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Payload could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True for lock contention: the caller may retry the whole unit of work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }

    /// True when a UNIQUE index on `column` was violated.
    pub fn is_unique_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(column))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => classify(db_err.message()),

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// Maps an SQLite error message onto a variant.
fn classify(msg: &str) -> DbError {
    // "UNIQUE constraint failed: <table>.<column>"
    if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
        return DbError::UniqueViolation {
            field: field.to_string(),
            value: "unknown".to_string(),
        };
    }
    if msg.contains("FOREIGN KEY constraint failed") {
        return DbError::ForeignKeyViolation {
            message: msg.to_string(),
        };
    }
    if msg.contains("CHECK constraint failed") {
        return DbError::CheckViolation {
            message: msg.to_string(),
        };
    }
    if ["append-only:", "sealed:", "immutable:"]
        .iter()
        .any(|prefix| msg.starts_with(prefix))
    {
        return DbError::Immutable {
            message: msg.to_string(),
        };
    }
    if ["database is locked", "database is busy", "SQLITE_BUSY"]
        .iter()
        .any(|needle| msg.contains(needle))
    {
        return DbError::Busy(msg.to_string());
    }
    DbError::QueryFailed(msg.to_string())
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_constraints() {
        assert!(matches!(
            classify("UNIQUE constraint failed: cash_sessions.operator_id"),
            DbError::UniqueViolation { ref field, .. } if field == "cash_sessions.operator_id"
        ));
        assert!(matches!(
            classify("CHECK constraint failed: quantity >= 0"),
            DbError::CheckViolation { .. }
        ));
        assert!(matches!(
            classify("FOREIGN KEY constraint failed"),
            DbError::ForeignKeyViolation { .. }
        ));
    }

    #[test]
    fn test_classify_triggers_and_locks() {
        assert!(matches!(
            classify("append-only: cash_ledger rows cannot be modified"),
            DbError::Immutable { .. }
        ));
        assert!(matches!(
            classify("sealed: closed cash sessions cannot be modified"),
            DbError::Immutable { .. }
        ));

        let busy = classify("database is locked");
        assert!(busy.is_retryable());
        assert!(!DbError::not_found("Product", "p-1").is_retryable());
    }

    #[test]
    fn test_is_unique_on() {
        let err = classify("UNIQUE constraint failed: cash_sessions.operator_id");
        assert!(err.is_unique_on("operator_id"));
        assert!(!err.is_unique_on("session_code"));
    }
}
