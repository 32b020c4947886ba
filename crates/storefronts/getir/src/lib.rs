//! # Restock Getir
//!
//! Getir storefront adapter. Getir renders a React single-page app where
//! every product card carries a `Show Product` button and its own quantity
//! counter; all cart mutations here resolve controls inside one card's
//! subtree, never by document-wide position.

mod adapter;

pub use adapter::{GetirConfig, GetirStorefront};
