//! # Restock Protocols
//!
//! Shared data model and capability traits for the restock ordering
//! pipeline. Contains only interface definitions and plain types - no
//! implementations.
//!
//! ## Core Trait
//!
//! - [`Storefront`] - one grocery storefront driven through a live
//!   browser session

pub mod catalog;
pub mod error;
pub mod storefront;
pub mod types;

pub use catalog::{CatalogEntry, ItemCatalog};
pub use error::{AdapterError, EngineError, JournalError};
pub use storefront::{CartReceipt, SessionStatus, Storefront};
pub use types::*;
