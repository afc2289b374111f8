//! # Collaborator Ports
//!
//! Traits through which the engine talks to the outside world. The core
//! ships simple implementations (see `storage`, `filters`, `events`); the
//! application plugs in its own where needed.
//!
//! Every fallible call returns `Result<T, StratumError>`. The engine never
//! retries a failed call.

use crate::decorator::Decorator;
use crate::events::BatchEvent;
use crate::index::ScanIndex;
use crate::session::{ModuleDefinition, ModuleView};
use crate::types::{
    Dependency, Event, Measure, Metric, ProjectLink, Resource, SnapshotId, StratumError,
    Violation,
};
use std::rc::Rc;

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Durable storage of everything the index records.
///
/// Resources handed to persistence are canonical: their effective key is set.
pub trait Persistence {
    /// Save the root project (or a module, with its parent project).
    fn save_project(
        &mut self,
        project: &Resource,
        parent: Option<&Resource>,
    ) -> Result<SnapshotId, StratumError>;

    /// Save a freshly indexed, non-excluded resource.
    /// Returns the snapshot it was saved under, if any.
    fn save_resource(
        &mut self,
        module: Option<&Resource>,
        resource: &Resource,
        parent: Option<&Resource>,
    ) -> Result<Option<SnapshotId>, StratumError>;

    /// Register a persistable resource with the component graph.
    fn register_component(
        &mut self,
        resource: &Resource,
        snapshot: Option<SnapshotId>,
    ) -> Result<(), StratumError>;

    fn save_measure(&mut self, resource: &Resource, measure: &Measure) -> Result<(), StratumError>;

    /// Refresh a cached measure from storage. Returns the cached one when
    /// storage has nothing newer.
    fn reload_measure(&self, resource: &Resource, measure: &Measure)
    -> Result<Measure, StratumError>;

    /// Save a registered dependency. Returns its durable id.
    fn save_dependency(
        &mut self,
        module: Option<&Resource>,
        dependency: &Dependency,
        parent: Option<&Dependency>,
    ) -> Result<u64, StratumError>;

    fn save_link(&mut self, module: &Resource, link: &ProjectLink) -> Result<(), StratumError>;

    fn delete_link(&mut self, module: &Resource, key: &str) -> Result<(), StratumError>;

    /// Save an event; the returned copy carries its durable id.
    fn save_event(&mut self, resource: &Resource, event: &Event) -> Result<Event, StratumError>;

    fn events(&self, resource: &Resource) -> Result<Vec<Event>, StratumError>;

    fn delete_event(&mut self, event: &Event) -> Result<(), StratumError>;

    fn set_source(&mut self, resource: &Resource, source: &str) -> Result<(), StratumError>;

    fn source(&self, resource: &Resource) -> Result<Option<String>, StratumError>;
}

// =============================================================================
// SCANNING
// =============================================================================

/// Feeds a module's resources, measures, dependencies and violations into
/// the index before it is locked.
pub trait ModuleScanner {
    fn scan(&mut self, module: &ModuleDefinition, index: &mut ScanIndex)
    -> Result<(), StratumError>;
}

// =============================================================================
// METRICS
// =============================================================================

/// Resolves metric keys.
pub trait MetricFinder {
    fn find_by_key(&self, key: &str) -> Option<Metric>;
}

// =============================================================================
// FILTERS
// =============================================================================

/// Decides whether a freshly indexed resource is excluded.
///
/// Consulted once per bucket, at creation.
pub trait ResourceFilter {
    fn is_excluded(&self, resource: &Resource) -> bool;
}

// =============================================================================
// ISSUES
// =============================================================================

/// Records violations for the current module.
pub trait IssueSink {
    fn add_violation(&mut self, violation: Violation) -> Result<(), StratumError>;

    /// Violations recorded on the resource with this effective key,
    /// in recording order.
    fn violations(&self, effective_key: &str) -> Vec<Violation>;
}

// =============================================================================
// DECORATOR SELECTION
// =============================================================================

/// Chooses and orders the decorators that run on a module.
pub trait DecoratorSelector {
    fn select(&self, module: &ModuleView<'_>) -> Vec<Rc<dyn Decorator>>;
}

// =============================================================================
// TELEMETRY
// =============================================================================

/// Observes batch lifecycle events. Handlers cannot affect control flow.
pub trait EventHandler {
    fn on_event(&self, event: &BatchEvent);
}
