//! # Pipeline Store
//!
//! The external key-value store abstraction shared by the cache layer and
//! the budget counters:
//! - `KeyValueStore` trait with TTL-aware reads/writes and increments
//! - In-memory implementation for single-process deployments and tests
//! - Atomic vs read-modify-write counter split

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod counter;
pub mod kv;

// Re-export main types
pub use counter::{counter_for, AtomicCounter, Counter, ReadModifyWriteCounter};
pub use kv::{KeyValueStore, MemoryStore};
