//! # Restock Akbal
//!
//! Akbal Online storefront adapter. Akbal runs a stock Magento theme:
//! server-rendered catalog search, one `tocart` button per product card,
//! and a minicart badge that tracks total quantity. No customer login is
//! needed to fill a cart, so the session probe is just a reachability
//! check.

mod adapter;

pub use adapter::{AkbalConfig, AkbalStorefront};
