//! Storefront adapter errors.

use thiserror::Error;

use crate::types::FailureKind;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// The persisted session is no longer authenticated.
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    #[error("Element missing: {0}")]
    ElementMissing(String),

    /// The page no longer matches the selectors this adapter was built
    /// against. Never retried; a human needs to look at the site.
    #[error("Layout changed: {0}")]
    LayoutChanged(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

impl AdapterError {
    /// Transient failures are worth another attempt after a short backoff.
    /// Structural failures are not: retrying a changed page cannot help.
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Timeout(_))
    }

    /// Collapses the error into the wire-facing failure kind.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AdapterError::SessionInvalid(_) => FailureKind::NeedsLogin,
            AdapterError::LayoutChanged(_) => FailureKind::LayoutChanged,
            AdapterError::ElementMissing(_) => FailureKind::ElementMissing,
            AdapterError::Network(_) => FailureKind::Network,
            AdapterError::Timeout(_) => FailureKind::Timeout,
            AdapterError::Navigation(_) | AdapterError::Browser(_) => FailureKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_transient() {
        assert!(AdapterError::Timeout("search results".to_string()).is_transient());
    }

    #[test]
    fn test_layout_change_is_not_transient() {
        assert!(!AdapterError::LayoutChanged("product card".to_string()).is_transient());
        assert!(!AdapterError::ElementMissing("add button".to_string()).is_transient());
        assert!(!AdapterError::SessionInvalid("logged out".to_string()).is_transient());
    }

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            AdapterError::SessionInvalid("x".to_string()).failure_kind(),
            FailureKind::NeedsLogin
        );
        assert_eq!(
            AdapterError::LayoutChanged("x".to_string()).failure_kind(),
            FailureKind::LayoutChanged
        );
        assert_eq!(
            AdapterError::Navigation("x".to_string()).failure_kind(),
            FailureKind::Other
        );
    }

    #[test]
    fn test_display_messages() {
        let err = AdapterError::Timeout("cart badge".to_string());
        assert!(err.to_string().contains("Timed out"));
        assert!(err.to_string().contains("cart badge"));
    }
}
