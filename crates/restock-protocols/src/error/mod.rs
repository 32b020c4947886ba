//! Error types for the restock pipeline.

mod adapter;
mod engine;
mod journal;

pub use adapter::AdapterError;
pub use engine::EngineError;
pub use journal::JournalError;
