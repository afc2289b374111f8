//! In-memory collaborators.

use crate::ports::{IssueSink, MetricFinder, Persistence};
use crate::types::{
    Dependency, Event, Measure, Metric, ProjectLink, Resource, SnapshotId, StratumError,
    Violation,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

// =============================================================================
// MEMORY PERSISTENCE
// =============================================================================

/// One call received by [`MemoryPersistence`], keyed by effective key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceCall {
    SaveProject(String),
    SaveResource(String),
    RegisterComponent(String),
    SaveMeasure { resource: String, metric: String },
    SaveDependency {
        from: String,
        to: String,
        parent: Option<(String, String)>,
    },
    SaveLink(String),
    DeleteLink(String),
    SaveEvent(String),
    DeleteEvent(u64),
    SetSource(String),
}

#[derive(Debug, Default)]
struct MemoryState {
    calls: Vec<PersistenceCall>,
    snapshots: BTreeMap<String, SnapshotId>,
    measures: BTreeMap<(String, String), Measure>,
    dependencies: BTreeMap<u64, Dependency>,
    links: BTreeMap<(String, String), ProjectLink>,
    events: BTreeMap<u64, (String, Event)>,
    sources: BTreeMap<String, String>,
    next_id: u64,
}

impl MemoryState {
    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn snapshot_for(&mut self, resource: &Resource) -> SnapshotId {
        let key = resource.effective_key_or_key().to_string();
        if let Some(existing) = self.snapshots.get(&key) {
            return *existing;
        }
        let snapshot = SnapshotId(self.allocate());
        self.snapshots.insert(key, snapshot);
        snapshot
    }
}

/// Persistence kept in memory, recording every call it receives.
///
/// Clones share one store, so a caller can keep a handle for inspection
/// while the index owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PersistenceCall> {
        self.state.borrow().calls.clone()
    }

    /// Snapshot saved for the resource with this effective key.
    #[must_use]
    pub fn snapshot(&self, effective_key: &str) -> Option<SnapshotId> {
        self.state.borrow().snapshots.get(effective_key).copied()
    }

    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.state.borrow().snapshots.len()
    }

    #[must_use]
    pub fn stored_measure(&self, effective_key: &str, metric_key: &str) -> Option<Measure> {
        self.state
            .borrow()
            .measures
            .get(&(effective_key.to_string(), metric_key.to_string()))
            .cloned()
    }

    /// Saved dependencies, by durable id.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.state.borrow().dependencies.values().cloned().collect()
    }

    #[must_use]
    pub fn links(&self, module_key: &str) -> Vec<ProjectLink> {
        self.state
            .borrow()
            .links
            .iter()
            .filter(|((module, _), _)| module == module_key)
            .map(|(_, link)| link.clone())
            .collect()
    }

    fn record(&self, call: PersistenceCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

fn key_of(resource: &Resource) -> String {
    resource.effective_key_or_key().to_string()
}

impl Persistence for MemoryPersistence {
    fn save_project(
        &mut self,
        project: &Resource,
        _parent: Option<&Resource>,
    ) -> Result<SnapshotId, StratumError> {
        self.record(PersistenceCall::SaveProject(key_of(project)));
        Ok(self.state.borrow_mut().snapshot_for(project))
    }

    fn save_resource(
        &mut self,
        _module: Option<&Resource>,
        resource: &Resource,
        _parent: Option<&Resource>,
    ) -> Result<Option<SnapshotId>, StratumError> {
        self.record(PersistenceCall::SaveResource(key_of(resource)));
        if !resource.is_persistable() {
            return Ok(None);
        }
        Ok(Some(self.state.borrow_mut().snapshot_for(resource)))
    }

    fn register_component(
        &mut self,
        resource: &Resource,
        _snapshot: Option<SnapshotId>,
    ) -> Result<(), StratumError> {
        self.record(PersistenceCall::RegisterComponent(key_of(resource)));
        Ok(())
    }

    fn save_measure(&mut self, resource: &Resource, measure: &Measure) -> Result<(), StratumError> {
        self.record(PersistenceCall::SaveMeasure {
            resource: key_of(resource),
            metric: measure.metric_key.clone(),
        });
        self.state
            .borrow_mut()
            .measures
            .insert((key_of(resource), measure.metric_key.clone()), measure.clone());
        Ok(())
    }

    fn reload_measure(
        &self,
        resource: &Resource,
        measure: &Measure,
    ) -> Result<Measure, StratumError> {
        Ok(self
            .state
            .borrow()
            .measures
            .get(&(key_of(resource), measure.metric_key.clone()))
            .cloned()
            .unwrap_or_else(|| measure.clone()))
    }

    fn save_dependency(
        &mut self,
        _module: Option<&Resource>,
        dependency: &Dependency,
        parent: Option<&Dependency>,
    ) -> Result<u64, StratumError> {
        self.record(PersistenceCall::SaveDependency {
            from: key_of(&dependency.from),
            to: key_of(&dependency.to),
            parent: parent.map(|p| (key_of(&p.from), key_of(&p.to))),
        });
        let mut state = self.state.borrow_mut();
        let id = state.allocate();
        let mut stored = dependency.clone();
        stored.id = Some(id);
        state.dependencies.insert(id, stored);
        Ok(id)
    }

    fn save_link(&mut self, module: &Resource, link: &ProjectLink) -> Result<(), StratumError> {
        self.record(PersistenceCall::SaveLink(link.key.clone()));
        self.state
            .borrow_mut()
            .links
            .insert((key_of(module), link.key.clone()), link.clone());
        Ok(())
    }

    fn delete_link(&mut self, module: &Resource, key: &str) -> Result<(), StratumError> {
        self.record(PersistenceCall::DeleteLink(key.to_string()));
        self.state
            .borrow_mut()
            .links
            .remove(&(key_of(module), key.to_string()));
        Ok(())
    }

    fn save_event(&mut self, resource: &Resource, event: &Event) -> Result<Event, StratumError> {
        self.record(PersistenceCall::SaveEvent(key_of(resource)));
        let mut state = self.state.borrow_mut();
        let id = state.allocate();
        let mut stored = event.clone();
        stored.id = Some(id);
        state.events.insert(id, (key_of(resource), stored.clone()));
        Ok(stored)
    }

    fn events(&self, resource: &Resource) -> Result<Vec<Event>, StratumError> {
        let key = key_of(resource);
        Ok(self
            .state
            .borrow()
            .events
            .values()
            .filter(|(owner, _)| *owner == key)
            .map(|(_, event)| event.clone())
            .collect())
    }

    fn delete_event(&mut self, event: &Event) -> Result<(), StratumError> {
        let Some(id) = event.id else {
            return Ok(());
        };
        self.record(PersistenceCall::DeleteEvent(id));
        self.state.borrow_mut().events.remove(&id);
        Ok(())
    }

    fn set_source(&mut self, resource: &Resource, source: &str) -> Result<(), StratumError> {
        self.record(PersistenceCall::SetSource(key_of(resource)));
        self.state
            .borrow_mut()
            .sources
            .insert(key_of(resource), source.to_string());
        Ok(())
    }

    fn source(&self, resource: &Resource) -> Result<Option<String>, StratumError> {
        Ok(self.state.borrow().sources.get(&key_of(resource)).cloned())
    }
}

// =============================================================================
// METRIC REGISTRY
// =============================================================================

/// Metrics known to the analysis, by key.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    metrics: BTreeMap<String, Metric>,
}

impl MetricRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, metric: Metric) -> Self {
        self.register(metric);
        self
    }

    pub fn register(&mut self, metric: Metric) {
        self.metrics.insert(metric.key.clone(), metric);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl MetricFinder for MetricRegistry {
    fn find_by_key(&self, key: &str) -> Option<Metric> {
        self.metrics.get(key).cloned()
    }
}

// =============================================================================
// MEMORY ISSUES
// =============================================================================

/// Issue sink that keeps violations per effective key.
#[derive(Debug, Clone, Default)]
pub struct MemoryIssues {
    violations: BTreeMap<String, Vec<Violation>>,
}

impl MemoryIssues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl IssueSink for MemoryIssues {
    fn add_violation(&mut self, violation: Violation) -> Result<(), StratumError> {
        let key = violation
            .resource
            .as_ref()
            .map(key_of)
            .unwrap_or_default();
        self.violations.entry(key).or_default().push(violation);
        Ok(())
    }

    fn violations(&self, effective_key: &str) -> Vec<Violation> {
        self.violations
            .get(effective_key)
            .cloned()
            .unwrap_or_default()
    }
}
