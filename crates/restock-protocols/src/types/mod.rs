//! Common types used across the restock pipeline.

mod history;
mod item;
mod order;

pub use history::*;
pub use item::*;
pub use order::*;
