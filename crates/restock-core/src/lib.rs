//! Core run logic for Restock: deficit resolution and order orchestration.
//!
//! The [`resolver`] module is pure bookkeeping: it compares the current
//! detection against a baseline or prior snapshots and emits the list
//! of [`restock_protocols::Deficit`]s worth ordering. The
//! [`Orchestrator`] then drives one run end to end: session gate,
//! per-item search/decide/add loop, and the terminal run report. Runs
//! against the same provider are serialized through [`ProviderLocks`];
//! distinct providers may overlap.

mod locks;
mod orchestrator;
pub mod resolver;

pub use locks::ProviderLocks;
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use resolver::{ResolutionSource, resolve};
