//! # Restock Browser
//!
//! Chrome DevTools Protocol plumbing for the storefront adapters: a
//! WebSocket CDP client, a page handle with bounded readiness polling, a
//! Chrome launcher, and persisted per-provider session state.
//!
//! Readiness is always probed against the live DOM under a bounded timeout;
//! nothing in this crate sleeps for a fixed interval and hopes.

pub mod client;
pub mod error;
pub mod launcher;
pub mod protocol;
pub mod retry;
pub mod sessions;
pub mod tab;
pub mod wait;

pub use client::CdpClient;
pub use error::BrowserError;
pub use launcher::{BrowserHandle, LaunchProfile, Launcher};
pub use retry::RetryPolicy;
pub use sessions::{SessionBlob, SessionStore, SessionStoreError};
pub use tab::PageTab;
pub use wait::poll;
