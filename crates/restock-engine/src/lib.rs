//! Language-model decision engine for Restock.
//!
//! Wraps an OpenRouter-compatible chat-completions API behind the
//! [`ModelClient`] trait and layers the two operations the orderer
//! needs on top: picking one product out of scraped candidates and
//! suggesting restock items from consumption history. Neither
//! operation propagates model failures to the caller; ordering must
//! keep moving when the model is down or answers with garbage.

mod api;
mod client;
mod engine;
mod extract;

pub use client::{Completion, ModelClient, OpenRouterClient};
pub use engine::{Decision, DecisionEngine, HistoryAnalysis};
pub use extract::{JsonShape, extract_json};
