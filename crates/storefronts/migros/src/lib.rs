//! # Restock Migros
//!
//! Migros Sanal Market storefront adapter. Migros fingerprints automated
//! browsers, so the launch profile is hardened (user agent, locale,
//! timezone, `navigator.webdriver` masking) before the first navigation,
//! and every page visit dismisses the cookie/delivery overlays that would
//! otherwise swallow clicks.

mod adapter;

pub use adapter::{MigrosConfig, MigrosStorefront};
