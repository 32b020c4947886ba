//! Storefront capability trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::types::{ProductCandidate, ProviderId};

/// Session probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Logged in (or the provider needs no login); safe to mutate the cart.
    Ready,
    /// A human must complete the provider's login flow before any run.
    NeedsManualLogin,
}

/// Confirmation that a candidate landed in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartReceipt {
    pub title: String,
    pub quantity: u32,
}

/// One grocery storefront driven through a live browser session.
///
/// Implementations own their browser state behind `&self`. Callers are
/// expected to serialize runs per provider; the orchestrator holds a
/// per-provider lock for the duration of a run.
#[async_trait]
pub trait Storefront: Send + Sync {
    /// Which provider this adapter drives.
    fn id(&self) -> ProviderId;

    /// Whether the provider requires an authenticated session.
    fn requires_login(&self) -> bool;

    /// Opens (or reuses) a browser session and probes login state.
    ///
    /// Never proceeds unauthenticated on providers that require login;
    /// returns [`SessionStatus::NeedsManualLogin`] instead.
    async fn ensure_session(&self) -> Result<SessionStatus, AdapterError>;

    /// Searches the storefront, returning candidates in presentation order.
    ///
    /// Zero results is an empty `Vec`, not an error.
    async fn search(&self, query: &str) -> Result<Vec<ProductCandidate>, AdapterError>;

    /// Adds `quantity` units of `candidate` to the cart.
    ///
    /// Quantity controls are resolved inside the candidate's own card;
    /// adding or incrementing one product never touches another product's
    /// cart state.
    async fn add_to_cart(
        &self,
        candidate: &ProductCandidate,
        quantity: u32,
    ) -> Result<CartReceipt, AdapterError>;

    /// Number of item lines currently in the cart.
    async fn cart_count(&self) -> Result<u32, AdapterError>;

    /// Empties the cart, confirming any dialog the storefront raises.
    async fn clear_cart(&self) -> Result<(), AdapterError>;

    /// Navigates the visible session to the cart page.
    async fn open_cart(&self) -> Result<(), AdapterError>;

    /// Releases the browser session, persisting login state for providers
    /// that keep one.
    async fn close(&self) -> Result<(), AdapterError>;
}
