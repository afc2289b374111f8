//! # Scan Index
//!
//! The facade analyzers and decorators talk to. It combines:
//! - the `ResourceGraph` (containment tree, measures, exclusion)
//! - the `DependencyGraph` (edges between resources)
//! - the `CreationLock`
//! - the collaborators: persistence, metric finder, resource filters, issue sink
//! - the current module
//!
//! ## Skips vs errors
//!
//! Referencing something that is not indexed is logged with `warn!` and
//! skipped. Errors are reserved for strict-lock violations, unknown metrics,
//! invalid violation targets and collaborator failures.

use crate::dependency_graph::DependencyGraph;
use crate::filters::ResourceFilters;
use crate::keys;
use crate::lock::CreationLock;
use crate::ports::{IssueSink, MetricFinder, Persistence, ResourceFilter};
use crate::resource_graph::{Bucket, ResourceGraph};
use crate::session::ModuleDefinition;
use crate::storage::MemoryIssues;
use crate::types::{
    Dependency, Event, Measure, MeasuresFilter, ProjectLink, Resource, ResourceId, Scope,
    StratumError, SwitchMode, Violation,
};
use std::fmt;
use tracing::{debug, warn};

/// The resource and dependency index of one analysis.
pub struct ScanIndex {
    graph: ResourceGraph,
    dependencies: DependencyGraph,
    lock: CreationLock,
    persistence: Box<dyn Persistence>,
    metric_finder: Box<dyn MetricFinder>,
    filters: ResourceFilters,
    issues: Box<dyn IssueSink>,
    current_module: Option<ResourceId>,
}

impl fmt::Debug for ScanIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanIndex")
            .field("buckets", &self.graph.len())
            .field("dependencies", &self.dependencies.len())
            .field("lock", &self.lock)
            .field("current_module", &self.current_module)
            .finish_non_exhaustive()
    }
}

impl ScanIndex {
    /// Create an empty index. Filters default to none and violations are
    /// kept in memory until a module session replaces the sink.
    #[must_use]
    pub fn new(
        persistence: Box<dyn Persistence>,
        metric_finder: Box<dyn MetricFinder>,
        lock: CreationLock,
    ) -> Self {
        Self {
            graph: ResourceGraph::new(),
            dependencies: DependencyGraph::new(),
            lock,
            persistence,
            metric_finder,
            filters: ResourceFilters::new(),
            issues: Box::new(MemoryIssues::new()),
            current_module: None,
        }
    }

    // =========================================================================
    // SESSION
    // =========================================================================

    /// Index the root project and, recursively, every sub-module under its
    /// parent project. The root becomes the current module.
    pub fn start(&mut self, root: &ModuleDefinition) -> Result<(), StratumError> {
        let mut project = root.resource.clone();
        if project.key.trim().is_empty() {
            return Err(StratumError::Config("root project has no key".to_string()));
        }
        project.parent = None;
        project.effective_key = Some(project.key.clone());

        let id = self.graph.insert(project.clone(), None, false);
        self.persistence.save_project(&project, None)?;
        self.current_module = Some(id);
        debug!(module = %project, "Analysis started");

        for module in &root.modules {
            self.add_module(module, &project)?;
        }
        Ok(())
    }

    fn add_module(&mut self, module: &ModuleDefinition, parent: &Resource) -> Result<(), StratumError> {
        let resource = module.resource.clone().with_parent(parent.clone());
        let indexed = self.add_resource(&resource)?;
        let Some(indexed) = indexed else {
            return Ok(());
        };
        for child in &module.modules {
            self.add_module(child, &indexed)?;
        }
        Ok(())
    }

    /// Switch to another module. The module must already be indexed.
    pub fn set_current_module(
        &mut self,
        module: &Resource,
        filters: ResourceFilters,
        issues: Box<dyn IssueSink>,
    ) -> Result<(), StratumError> {
        let id = self
            .graph
            .find(module)
            .ok_or_else(|| StratumError::ResourceNotIndexed(module.to_string()))?;
        self.current_module = Some(id);
        self.filters = filters;
        self.issues = issues;
        Ok(())
    }

    /// The current module, as indexed.
    #[must_use]
    pub fn current_module(&self) -> Option<&Resource> {
        self.current_module.and_then(|id| self.graph.resource(id))
    }

    /// Engage the creation lock: the scan phase is over.
    pub fn lock(&mut self) {
        self.lock.lock();
        debug!("Index locked");
    }

    #[must_use]
    pub fn creation_lock(&self) -> &CreationLock {
        &self.lock
    }

    // =========================================================================
    // INDEXING
    // =========================================================================

    /// Index `resource` and its declared parent chain.
    /// Returns true when the resource is indexed and not excluded.
    pub fn index(&mut self, resource: &Resource) -> Result<bool, StratumError> {
        if !self.admits(resource)? {
            return Ok(false);
        }
        let id = self.do_index(resource)?;
        Ok(id.is_some_and(|id| !self.graph.is_excluded(id)))
    }

    /// Index `resource` under an explicit parent, which must already be indexed.
    pub fn index_with_parent(
        &mut self,
        resource: &Resource,
        parent: Option<&Resource>,
    ) -> Result<bool, StratumError> {
        if !self.admits(resource)? {
            return Ok(false);
        }
        let id = self.do_index_under(resource, parent)?;
        Ok(id.is_some_and(|id| !self.graph.is_excluded(id)))
    }

    /// Index `resource` and return the canonical indexed copy.
    pub fn add_resource(&mut self, resource: &Resource) -> Result<Option<Resource>, StratumError> {
        if !self.admits(resource)? {
            return Ok(None);
        }
        let id = self.do_index(resource)?;
        Ok(id.and_then(|id| self.graph.resource(id)).cloned())
    }

    /// Whether a fresh bucket may be created for `resource` right now.
    /// Strict lock: error. Lenient lock: warning and refusal.
    fn admits(&self, resource: &Resource) -> Result<bool, StratumError> {
        if self.graph.find(resource).is_some() {
            return Ok(true);
        }
        self.lock.check(resource)?;
        if self.lock.blocks(resource) {
            warn!("Resource ignored, index is locked: {}", resource);
            return Ok(false);
        }
        Ok(true)
    }

    fn do_index(&mut self, resource: &Resource) -> Result<Option<ResourceId>, StratumError> {
        if let Some(parent) = resource.parent.as_deref() {
            self.do_index(parent)?;
        }
        self.do_index_under(resource, resource.parent.as_deref())
    }

    fn do_index_under(
        &mut self,
        resource: &Resource,
        parent_ref: Option<&Resource>,
    ) -> Result<Option<ResourceId>, StratumError> {
        if let Some(existing) = self.graph.find(resource) {
            return Ok(Some(existing));
        }
        self.lock.check(resource)?;

        let parent = if resource.is_library() {
            None
        } else {
            match parent_ref {
                Some(declared) => match self.graph.find(declared) {
                    Some(id) => Some(id),
                    None => {
                        warn!("Resource ignored, parent is not indexed: {}", resource);
                        return Ok(None);
                    }
                },
                None => self.current_module,
            }
        };

        let module = self.current_module().cloned();
        let mut canonical = resource.clone();
        canonical.parent = None;
        canonical.effective_key = Some(keys::effective_key(module.as_ref(), resource));

        let parent_excluded = parent.is_some_and(|p| self.graph.is_excluded(p));
        let excluded = parent_excluded || self.filters.is_excluded(&canonical);

        let id = self.graph.insert(canonical.clone(), parent, excluded);
        debug!(resource = %canonical, excluded, "Resource indexed");

        if !excluded {
            let parent_resource = parent.and_then(|p| self.graph.resource(p)).cloned();
            let snapshot = self.persistence.save_resource(
                module.as_ref(),
                &canonical,
                parent_resource.as_ref(),
            )?;
            if canonical.is_persistable() && !canonical.is_library() {
                self.persistence.register_component(&canonical, snapshot)?;
            }
        }
        Ok(Some(id))
    }

    /// Bucket for `resource` before data is attached to it.
    ///
    /// Directories and files are indexed on the fly; anything else must
    /// already be indexed.
    fn check_indexed(&mut self, resource: &Resource) -> Result<Option<ResourceId>, StratumError> {
        if let Some(id) = self.graph.find(resource) {
            return Ok(Some(id));
        }
        if self.lock.is_locked() {
            if self.lock.is_fail_when_locked() {
                return Err(StratumError::StructuralViolation(format!(
                    "Resource is not indexed and the index is locked: {}",
                    resource
                )));
            }
            warn!("Resource will be ignored in next releases, index is locked: {}", resource);
        }
        if resource.is_directory_or_file() {
            return self.do_index(resource);
        }
        if !self.lock.is_locked() {
            warn!("Resource must be indexed before adding data: {}", resource);
        }
        Ok(None)
    }

    // =========================================================================
    // MEASURES
    // =========================================================================

    /// Attach a measure to a resource. Returns the measure with its metric
    /// resolved. Measures on excluded or unknown resources are dropped.
    pub fn add_measure(
        &mut self,
        resource: &Resource,
        mut measure: Measure,
    ) -> Result<Measure, StratumError> {
        let Some(id) = self.check_indexed(resource)? else {
            return Ok(measure);
        };
        if self.graph.is_excluded(id) {
            return Ok(measure);
        }
        let metric = self
            .metric_finder
            .find_by_key(&measure.metric_key)
            .ok_or_else(|| StratumError::UnknownMetric(measure.metric_key.clone()))?;
        measure.metric = Some(metric);
        self.graph.put_measure(id, measure.clone());

        if measure.persistence_mode.use_database() {
            if let Some(canonical) = self.graph.resource(id) {
                self.persistence.save_measure(canonical, &measure)?;
            }
        }
        Ok(measure)
    }

    /// Cached measure of `resource` for `metric_key`.
    ///
    /// The cache holds the last write. Persistence is only consulted when the
    /// cached measure carries neither a value nor data.
    pub fn measure(
        &self,
        resource: &Resource,
        metric_key: &str,
    ) -> Result<Option<Measure>, StratumError> {
        let Some(bucket) = self.graph.find(resource).and_then(|id| self.graph.bucket(id)) else {
            return Ok(None);
        };
        match bucket.measure(metric_key) {
            Some(cached) if cached.value.is_none() && cached.data.is_none() => self
                .persistence
                .reload_measure(bucket.resource(), cached)
                .map(Some),
            Some(cached) => Ok(Some(cached.clone())),
            None => Ok(None),
        }
    }

    /// Cached measures of `resource` accepted by `filter`, ordered by metric key.
    #[must_use]
    pub fn measures(&self, resource: &Resource, filter: &MeasuresFilter) -> Vec<Measure> {
        self.graph
            .find(resource)
            .and_then(|id| self.graph.bucket(id))
            .map(|bucket| {
                bucket
                    .measures()
                    .filter(|measure| filter.accepts(measure))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    // =========================================================================
    // DEPENDENCIES
    // =========================================================================

    /// Register a dependency, its parent first.
    ///
    /// An existing edge with the same endpoints is returned as is. An edge
    /// whose endpoints cannot be indexed, or are excluded, is returned
    /// without being stored.
    pub fn add_dependency(&mut self, dependency: Dependency) -> Result<Dependency, StratumError> {
        if let Some(existing) = self.edge(&dependency.from, &dependency.to) {
            return Ok(existing.clone());
        }

        let parent = match dependency.parent.as_deref() {
            Some(parent) => Some(self.add_dependency(parent.clone())?),
            None => None,
        };

        let Some((from, to)) = self.register_dependency(dependency.clone())? else {
            return Ok(dependency);
        };

        let module = self.current_module().cloned();
        let stored = self
            .dependencies
            .edge(from, to)
            .cloned()
            .ok_or_else(|| StratumError::ResourceNotIndexed(dependency.from.to_string()))?;
        let id = self
            .persistence
            .save_dependency(module.as_ref(), &stored, parent.as_ref())?;
        self.dependencies.set_id(from, to, Some(id));
        debug!(from = %stored.from, to = %stored.to, id, "Dependency saved");

        Ok(self.dependencies.edge(from, to).cloned().unwrap_or(stored))
    }

    fn register_dependency(
        &mut self,
        mut dependency: Dependency,
    ) -> Result<Option<(ResourceId, ResourceId)>, StratumError> {
        if !self.admits(&dependency.from)? || !self.admits(&dependency.to)? {
            return Ok(None);
        }
        let from = self.do_index(&dependency.from)?;
        let to = self.do_index(&dependency.to)?;
        let (Some(from), Some(to)) = (from, to) else {
            return Ok(None);
        };
        if self.graph.is_excluded(from) || self.graph.is_excluded(to) {
            return Ok(None);
        }
        self.canonicalize(&mut dependency, from, to);
        self.dependencies.insert(from, to, dependency);
        Ok(Some((from, to)))
    }

    fn canonicalize(&self, dependency: &mut Dependency, from: ResourceId, to: ResourceId) {
        if let Some(resource) = self.graph.resource(from) {
            dependency.from = resource.clone();
        }
        if let Some(resource) = self.graph.resource(to) {
            dependency.to = resource.clone();
        }
    }

    #[must_use]
    pub fn edge(&self, from: &Resource, to: &Resource) -> Option<&Dependency> {
        let from = self.graph.find(from)?;
        let to = self.graph.find(to)?;
        self.dependencies.edge(from, to)
    }

    #[must_use]
    pub fn has_edge(&self, from: &Resource, to: &Resource) -> bool {
        self.edge(from, to).is_some()
    }

    /// Edges leaving `from`, in registration order.
    #[must_use]
    pub fn outgoing_edges(&self, from: &Resource) -> Vec<&Dependency> {
        self.graph
            .find(from)
            .map(|id| self.dependencies.outgoing(id))
            .unwrap_or_default()
    }

    /// Edges entering `to`, in registration order.
    #[must_use]
    pub fn incoming_edges(&self, to: &Resource) -> Vec<&Dependency> {
        self.graph
            .find(to)
            .map(|id| self.dependencies.incoming(id))
            .unwrap_or_default()
    }

    /// Every stored edge, in registration order.
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().map(|(_, _, dependency)| dependency)
    }

    // =========================================================================
    // MODULE BOUNDARY
    // =========================================================================

    /// End the current module: drop everything below project scope, keep
    /// the edges between project-scope resources with their durable id
    /// reset, and release the lock.
    pub fn clear(&mut self) {
        let kept = self.dependencies.drain_retaining(|_, _, dependency| {
            dependency.from.is_set() && dependency.to.is_set()
        });
        let removed = self.graph.retain_sets();
        for (from, to, mut dependency) in kept {
            dependency.id = None;
            self.dependencies.insert(from, to, dependency);
        }
        self.lock.unlock();
        debug!(
            removed,
            kept = self.dependencies.len(),
            "Index cleared at module boundary"
        );
    }

    // =========================================================================
    // VIOLATIONS
    // =========================================================================

    /// Record a violation. Returns true when it reached the issue sink.
    pub fn add_violation(&mut self, mut violation: Violation) -> Result<bool, StratumError> {
        let target = match violation.resource.take() {
            Some(resource) => {
                if !resource.scope().is_higher_than_or_equals(Scope::File) {
                    return Err(StratumError::InvalidViolationTarget(resource.to_string()));
                }
                resource
            }
            None => match self.current_module().cloned() {
                Some(module) => module,
                None => {
                    warn!("Violation ignored, no current module: {}", violation.message);
                    return Ok(false);
                }
            },
        };

        if violation.rule.is_none() {
            warn!("Rule is null, ignoring violation on {}: {}", target, violation.message);
            return Ok(false);
        }

        let Some(id) = self.check_indexed(&target)? else {
            return Ok(false);
        };
        if self.graph.is_excluded(id) {
            return Ok(false);
        }

        violation.severity = None;
        violation.resource = self.graph.resource(id).cloned();
        self.issues.add_violation(violation)?;
        Ok(true)
    }

    /// Violations recorded on `resource`, filtered by switch mode.
    /// Resources below file scope have none.
    #[must_use]
    pub fn violations(&self, resource: &Resource, mode: SwitchMode) -> Vec<Violation> {
        if !resource.scope().is_higher_than_or_equals(Scope::File) {
            return Vec::new();
        }
        let Some(canonical) = self.graph.find(resource).and_then(|id| self.graph.resource(id))
        else {
            return Vec::new();
        };
        self.issues
            .violations(canonical.effective_key_or_key())
            .into_iter()
            .filter(|violation| mode.accepts(violation))
            .collect()
    }

    // =========================================================================
    // LINKS, EVENTS, SOURCES
    // =========================================================================

    pub fn add_link(&mut self, link: &ProjectLink) -> Result<(), StratumError> {
        let module = self.require_module()?;
        self.persistence.save_link(&module, link)
    }

    pub fn delete_link(&mut self, key: &str) -> Result<(), StratumError> {
        let module = self.require_module()?;
        self.persistence.delete_link(&module, key)
    }

    /// Create an event on `resource` (the current module when `None`).
    pub fn add_event(
        &mut self,
        resource: Option<&Resource>,
        name: &str,
        description: Option<&str>,
        category: Option<&str>,
        date: u64,
    ) -> Result<Event, StratumError> {
        let target = self.event_target(resource)?;
        let mut event = Event::new(name, date);
        event.description = description.map(str::to_string);
        event.category = category.map(str::to_string);
        self.persistence.save_event(&target, &event)
    }

    pub fn events(&self, resource: &Resource) -> Result<Vec<Event>, StratumError> {
        let target = self
            .graph
            .find(resource)
            .and_then(|id| self.graph.resource(id))
            .unwrap_or(resource);
        self.persistence.events(target)
    }

    pub fn delete_event(&mut self, event: &Event) -> Result<(), StratumError> {
        self.persistence.delete_event(event)
    }

    /// Store the source text of an indexed, non-excluded resource.
    /// Returns false when the resource was skipped.
    pub fn set_source(&mut self, resource: &Resource, source: &str) -> Result<bool, StratumError> {
        let Some(id) = self.check_indexed(resource)? else {
            return Ok(false);
        };
        if self.graph.is_excluded(id) {
            return Ok(false);
        }
        match self.graph.resource(id) {
            Some(canonical) => {
                self.persistence.set_source(canonical, source)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn source(&self, resource: &Resource) -> Result<Option<String>, StratumError> {
        match self.graph.find(resource).and_then(|id| self.graph.resource(id)) {
            Some(canonical) => self.persistence.source(canonical),
            None => Ok(None),
        }
    }

    fn require_module(&self) -> Result<Resource, StratumError> {
        self.current_module()
            .cloned()
            .ok_or_else(|| StratumError::ResourceNotIndexed("no current module".to_string()))
    }

    fn event_target(&self, resource: Option<&Resource>) -> Result<Resource, StratumError> {
        match resource {
            None => self.require_module(),
            Some(resource) => Ok(self
                .graph
                .find(resource)
                .and_then(|id| self.graph.resource(id))
                .cloned()
                .unwrap_or_else(|| resource.clone())),
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// The canonical indexed copy of `resource`, excluded or not.
    #[must_use]
    pub fn resource(&self, resource: &Resource) -> Option<&Resource> {
        self.graph
            .find(resource)
            .and_then(|id| self.graph.resource(id))
    }

    #[must_use]
    pub fn resource_id(&self, resource: &Resource) -> Option<ResourceId> {
        self.graph.find(resource)
    }

    #[must_use]
    pub fn is_indexed(&self, resource: &Resource, accept_excluded: bool) -> bool {
        self.graph.get(resource, accept_excluded).is_some()
    }

    #[must_use]
    pub fn is_excluded(&self, resource: &Resource) -> bool {
        self.graph
            .find(resource)
            .is_some_and(|id| self.graph.is_excluded(id))
    }

    /// Children of `resource` in insertion order.
    #[must_use]
    pub fn children(&self, resource: &Resource, accept_excluded: bool) -> Vec<&Resource> {
        let Some(id) = self.graph.get(resource, accept_excluded) else {
            return Vec::new();
        };
        self.graph
            .children(id, accept_excluded)
            .into_iter()
            .filter_map(|child| self.graph.resource(child))
            .collect()
    }

    /// Parent of a non-excluded resource.
    #[must_use]
    pub fn parent(&self, resource: &Resource) -> Option<&Resource> {
        let id = self.graph.get(resource, false)?;
        self.graph
            .parent(id)
            .and_then(|parent| self.graph.resource(parent))
    }

    /// Every indexed resource, in indexing order.
    #[must_use]
    pub fn vertices(&self) -> Vec<&Resource> {
        self.graph.iter().map(|(_, bucket)| bucket.resource()).collect()
    }

    /// Read access to the bucket arena.
    #[must_use]
    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    #[must_use]
    pub fn bucket(&self, id: ResourceId) -> Option<&Bucket> {
        self.graph.bucket(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
