//! # Decorators
//!
//! A decorator computes derived measures on a resource once all of its
//! children have been decorated. It reads and writes through a
//! `DecoratorContext`; the children are visible as `FrozenContext`s,
//! which have no mutating API.

use crate::filters::MeasurementFilters;
use crate::index::ScanIndex;
use crate::ports::DecoratorSelector;
use crate::session::ModuleView;
use crate::types::{
    Dependency, Event, Measure, MeasuresFilter, Resource, ResourceId, StratumError, SwitchMode,
    Violation,
};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

// =============================================================================
// DECORATOR TRAIT
// =============================================================================

pub trait Decorator {
    /// Name used in events and error messages.
    fn name(&self) -> &str;

    /// Whether this decorator applies to the module under the active language.
    fn should_execute_on(&self, module: &ModuleView<'_>) -> bool;

    fn decorate(
        &self,
        resource: &Resource,
        context: &mut DecoratorContext<'_>,
    ) -> Result<(), StratumError>;
}

// =============================================================================
// FROZEN CONTEXT
// =============================================================================

/// Read-only snapshot of a decorated resource, taken when its frame returns.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenContext {
    id: ResourceId,
    resource: Resource,
    measures: BTreeMap<String, Measure>,
}

impl FrozenContext {
    /// Snapshot the bucket `id` of `index`.
    #[must_use]
    pub fn capture(index: &ScanIndex, id: ResourceId) -> Option<Self> {
        let bucket = index.bucket(id)?;
        Some(Self {
            id,
            resource: bucket.resource().clone(),
            measures: bucket
                .measures()
                .map(|m| (m.metric_key.clone(), m.clone()))
                .collect(),
        })
    }

    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    #[must_use]
    pub fn measure(&self, metric_key: &str) -> Option<&Measure> {
        self.measures.get(metric_key)
    }

    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.measures.values()
    }
}

// =============================================================================
// DECORATOR CONTEXT
// =============================================================================

/// The mutable view a decorator gets of the resource it decorates.
pub struct DecoratorContext<'a> {
    index: &'a mut ScanIndex,
    resource: Resource,
    children: &'a [FrozenContext],
    measurement_filters: &'a MeasurementFilters,
}

impl fmt::Debug for DecoratorContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorContext")
            .field("resource", &self.resource)
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

impl<'a> DecoratorContext<'a> {
    #[must_use]
    pub fn new(
        index: &'a mut ScanIndex,
        resource: Resource,
        children: &'a [FrozenContext],
        measurement_filters: &'a MeasurementFilters,
    ) -> Self {
        Self {
            index,
            resource,
            children,
            measurement_filters,
        }
    }

    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Contexts of the already decorated children, in child order.
    #[must_use]
    pub fn children(&self) -> &[FrozenContext] {
        self.children
    }

    /// Measures of `metric_key` on the children that have one.
    #[must_use]
    pub fn child_measures(&self, metric_key: &str) -> Vec<&Measure> {
        self.children
            .iter()
            .filter_map(|child| child.measure(metric_key))
            .collect()
    }

    pub fn measure(&self, metric_key: &str) -> Result<Option<Measure>, StratumError> {
        self.index.measure(&self.resource, metric_key)
    }

    #[must_use]
    pub fn measures(&self, filter: &MeasuresFilter) -> Vec<Measure> {
        self.index.measures(&self.resource, filter)
    }

    /// Save a measure on the decorated resource. Returns false when a
    /// measurement filter rejected it.
    pub fn save_measure(&mut self, measure: Measure) -> Result<bool, StratumError> {
        if !self.measurement_filters.accept(&self.resource, &measure) {
            return Ok(false);
        }
        self.index.add_measure(&self.resource, measure)?;
        Ok(true)
    }

    /// Save a violation; without a target it lands on the decorated resource.
    pub fn save_violation(&mut self, mut violation: Violation) -> Result<bool, StratumError> {
        if violation.resource.is_none() {
            violation.resource = Some(self.resource.clone());
        }
        self.index.add_violation(violation)
    }

    #[must_use]
    pub fn violations(&self, mode: SwitchMode) -> Vec<Violation> {
        self.index.violations(&self.resource, mode)
    }

    pub fn save_dependency(&mut self, dependency: Dependency) -> Result<Dependency, StratumError> {
        self.index.add_dependency(dependency)
    }

    #[must_use]
    pub fn outgoing_dependencies(&self) -> Vec<Dependency> {
        self.index
            .outgoing_edges(&self.resource)
            .into_iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn incoming_dependencies(&self) -> Vec<Dependency> {
        self.index
            .incoming_edges(&self.resource)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn events(&self) -> Result<Vec<Event>, StratumError> {
        self.index.events(&self.resource)
    }

    pub fn create_event(
        &mut self,
        name: &str,
        description: Option<&str>,
        category: Option<&str>,
        date: u64,
    ) -> Result<Event, StratumError> {
        let resource = self.resource.clone();
        self.index
            .add_event(Some(&resource), name, description, category, date)
    }
}

// =============================================================================
// SELECTION
// =============================================================================

/// Selector returning the registered decorators in registration order.
#[derive(Default, Clone)]
pub struct RegisteredDecorators {
    decorators: Vec<Rc<dyn Decorator>>,
}

impl RegisteredDecorators {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, decorator: impl Decorator + 'static) -> Self {
        self.register(decorator);
        self
    }

    pub fn register(&mut self, decorator: impl Decorator + 'static) {
        self.decorators.push(Rc::new(decorator));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }
}

impl DecoratorSelector for RegisteredDecorators {
    fn select(&self, _module: &ModuleView<'_>) -> Vec<Rc<dyn Decorator>> {
        self.decorators.clone()
    }
}

impl fmt::Debug for RegisteredDecorators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.decorators.iter().map(|d| d.name()))
            .finish()
    }
}
