//! Journal (persistence) errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {0}")]
    NotFound(i64),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}
