//! Decision engine errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Completion was empty")]
    EmptyCompletion,

    #[error("No parseable JSON in completion: {0}")]
    Parse(String),

    #[error("API key not configured")]
    MissingApiKey,
}
