//! # stratum-core
//!
//! The resource index and decorator engine for Stratum - THE LOGIC.
//!
//! A batch analysis walks a project module by module. For each module:
//!
//! 1. Analyzers feed the [`ScanIndex`] with resources, measures,
//!    dependencies and violations (the scan phase).
//! 2. The index is locked: no new resources may appear.
//! 3. Decorators run bottom-up over the module tree, each resource seeing
//!    the frozen results of its children (the decoration phase).
//! 4. The index is cleared down to project-scope resources before the
//!    next module starts.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is sequential and single-threaded: one module at a time
//! - Is deterministic: traversal follows registration order
//! - Is closed: storage, metric lookup, issue handling and decorator
//!   selection plug in through the traits in [`ports`]
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod batch;
pub mod decorator;
pub mod dependency_graph;
pub mod events;
pub mod executor;
pub mod filters;
pub mod index;
pub mod keys;
pub mod lock;
pub mod ports;
pub mod primitives;
pub mod resource_graph;
pub mod session;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Dependency, Event, Language, Measure, MeasuresFilter, Metric, MetricType, PersistenceMode,
    ProjectLink, Qualifier, Resource, ResourceId, ResourceKey, Rule, Scope, Severity, SnapshotId,
    StratumError, SwitchMode, Violation,
};

// =============================================================================
// RE-EXPORTS: Index
// =============================================================================

pub use dependency_graph::DependencyGraph;
pub use index::ScanIndex;
pub use lock::CreationLock;
pub use resource_graph::{Bucket, ResourceGraph};

// =============================================================================
// RE-EXPORTS: Decoration
// =============================================================================

pub use batch::{ModuleBatch, ModuleReport};
pub use decorator::{Decorator, DecoratorContext, FrozenContext, RegisteredDecorators};
pub use events::{BatchEvent, EventBus, TracingEventHandler};
pub use executor::DecoratorsExecutor;
pub use filters::{
    MeasurementFilter, MeasurementFilters, PatternFilter, ResourceFilters,
};
pub use session::{ModuleDefinition, ModuleLanguages, ModuleView};

// =============================================================================
// RE-EXPORTS: Ports & Storage
// =============================================================================

pub use ports::{
    DecoratorSelector, EventHandler, IssueSink, MetricFinder, ModuleScanner, Persistence,
    ResourceFilter,
};
pub use storage::{
    MemoryIssues, MemoryPersistence, MetricRegistry, PersistenceCall, RedbPersistence,
    StoreStats, StoredComponent,
};
