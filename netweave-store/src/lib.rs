//! Metadata persistence for fabric records
//!
//! This crate provides a trait-based keyed record store with an in-memory
//! implementation for tests and a JSON-file implementation for the CLI.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod json;

pub use backend::{MemoryStore, RecordStore};
pub use json::JsonFileStore;

// Re-export commonly used types
pub use netweave_core::{Record, ResourceId};
