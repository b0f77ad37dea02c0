//! Storage subsystem
//!
//! Captured requests live in memory only and are lost on restart.
//!
//! Components:
//! - `request_store`: the retention store with append, lookup, delete and prune.

pub mod request_store;

pub use request_store::{RequestStore, RetentionPolicy};
