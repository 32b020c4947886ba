//! Browser error types.

use restock_protocols::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    /// Chrome not reachable on the debugging endpoint.
    #[error("Chrome not available at {0}")]
    ChromeNotAvailable(String),

    #[error("Chrome executable not found")]
    ChromeNotFound,

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Error reported by the DevTools protocol itself.
    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript error: {0}")]
    JavaScript(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for BrowserError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BrowserError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for BrowserError {
    fn from(e: reqwest::Error) -> Self {
        BrowserError::Http(e.to_string())
    }
}

impl From<BrowserError> for AdapterError {
    fn from(e: BrowserError) -> Self {
        match e {
            BrowserError::Timeout(what) => AdapterError::Timeout(what),
            BrowserError::ElementNotFound(what) => AdapterError::ElementMissing(what),
            BrowserError::NavigationFailed(msg) => {
                // Chromium reports connectivity problems as net:: error codes.
                if msg.contains("net::ERR") {
                    AdapterError::Network(msg)
                } else {
                    AdapterError::Navigation(msg)
                }
            }
            BrowserError::Http(msg) => AdapterError::Network(msg),
            other => AdapterError::Browser(other.to_string()),
        }
    }
}
