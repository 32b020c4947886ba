//! SQLite-backed persistence for Restock.
//!
//! The journal keeps two things: dated detection snapshots (what the
//! fridge contained when) and the singleton user preference record.
//! All access goes through [`Journal`], which owns an async connection.

mod journal;
mod schema;

pub use journal::Journal;
