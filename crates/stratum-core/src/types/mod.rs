//! # Core Type Definitions
//!
//! This module contains the value types shared by the whole engine:
//! - Handles (`ResourceId`, `SnapshotId`)
//! - Resources and their classification (`Resource`, `Qualifier`, `Scope`, `Language`)
//! - Measurement (`Metric`, `Measure`, `PersistenceMode`, `MeasuresFilter`)
//! - Relations and annotations (`Dependency`, `Violation`, `Event`, `ProjectLink`)
//! - Error types (`StratumError`)
//!
//! ## Identity
//!
//! A resource is identified by its qualifier and key. Everything else on a
//! `Resource` is an attribute. The index hands out `ResourceId` handles so
//! the containment tree never needs back-pointers.

mod measure;
mod records;
mod resource;

pub use measure::{Measure, MeasuresFilter, Metric, MetricType, PersistenceMode};
pub use records::{
    Dependency, Event, ProjectLink, Rule, Severity, SwitchMode, Violation,
};
pub use resource::{Language, Qualifier, Resource, ResourceKey, Scope};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// HANDLES
// =============================================================================

/// Handle of a bucket in the resource graph.
/// Handles are never reused within one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

/// Durable snapshot identity returned by persistence for a saved resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub u64);

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in Stratum.
///
/// Per project rules:
/// - No `unwrap()` in production code
/// - Use `Result<T, StratumError>` for fallible operations
#[derive(Debug, Error)]
pub enum StratumError {
    /// A resource was created or referenced while the index is locked in strict mode.
    #[error("Structural violation: {0}")]
    StructuralViolation(String),

    /// A resource that must already be indexed is not.
    #[error("Resource is not indexed: {0}")]
    ResourceNotIndexed(String),

    /// A measure names a metric the registry does not know.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// A violation targets a resource below file granularity.
    #[error("Violations are only supported on files, directories and project: {0}")]
    InvalidViolationTarget(String),

    /// A decorator failed on a resource.
    #[error("Fail to decorate '{resource}' with {decorator}: {source}")]
    DecoratorFailure {
        decorator: String,
        resource: String,
        #[source]
        source: Box<StratumError>,
    },

    /// User-facing message raised by a decorator; propagated unwrapped.
    #[error("{0}")]
    Message(String),

    /// Error raised by a persistence backend.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid configuration (filters, descriptors).
    #[error("Configuration error: {0}")]
    Config(String),
}
