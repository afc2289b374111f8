//! # Storage
//!
//! Implementations of the collaborator ports:
//! - `MemoryPersistence`: in-memory store that records every call
//! - `RedbPersistence`: disk-backed store on redb
//! - `MetricRegistry` and `MemoryIssues`: in-memory metric finder and issue sink

mod memory;
mod redb_store;

pub use memory::{MemoryIssues, MemoryPersistence, MetricRegistry, PersistenceCall};
pub use redb_store::{RedbPersistence, StoreStats, StoredComponent};
