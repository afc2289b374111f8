//! # Module Batch
//!
//! Drives an analysis over a project tree. Modules are processed children
//! first; each one goes through:
//!
//! 1. session switch (exclusion filters, fresh issue sink)
//! 2. scan (the `ModuleScanner` feeds the index)
//! 3. lock
//! 4. decoration (bottom-up, see `executor`)
//! 5. clear (module boundary, releases the lock)

use crate::events::EventBus;
use crate::executor::DecoratorsExecutor;
use crate::filters::{MeasurementFilters, PatternFilter, ResourceFilters};
use crate::index::ScanIndex;
use crate::ports::{DecoratorSelector, ModuleScanner};
use crate::session::ModuleDefinition;
use crate::storage::MemoryIssues;
use crate::types::{ResourceId, Scope, StratumError, SwitchMode};
use serde::Serialize;
use tracing::info;

/// Counts taken on a module right before its boundary clear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleReport {
    pub module: String,
    pub resources: usize,
    pub excluded: usize,
    pub measures: usize,
    pub dependencies: usize,
    pub violations: usize,
}

impl ModuleReport {
    fn collect(index: &ScanIndex, module: &ModuleDefinition) -> Self {
        let mut report = Self {
            module: module.resource.key.clone(),
            dependencies: index.dependencies().count(),
            ..Self::default()
        };
        if let Some(root) = index.resource_id(&module.resource) {
            report.count(index, root);
        }
        report
    }

    fn count(&mut self, index: &ScanIndex, id: ResourceId) {
        let Some(bucket) = index.bucket(id) else {
            return;
        };
        self.resources += 1;
        if bucket.is_excluded() {
            self.excluded += 1;
        }
        self.measures += bucket.measures().count();
        if bucket.resource().scope().is_higher_than_or_equals(Scope::File) {
            self.violations += index.violations(bucket.resource(), SwitchMode::Both).len();
        }
        for child in index.graph().children(id, true) {
            let is_module = index
                .graph()
                .resource(child)
                .is_some_and(|r| r.is_module());
            if !is_module {
                self.count(index, child);
            }
        }
    }
}

/// The per-module pipeline.
pub struct ModuleBatch<'a> {
    selector: &'a dyn DecoratorSelector,
    events: &'a EventBus,
    measurement_filters: MeasurementFilters,
}

impl std::fmt::Debug for ModuleBatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleBatch")
            .field("events", self.events)
            .finish_non_exhaustive()
    }
}

impl<'a> ModuleBatch<'a> {
    #[must_use]
    pub fn new(selector: &'a dyn DecoratorSelector, events: &'a EventBus) -> Self {
        Self {
            selector,
            events,
            measurement_filters: MeasurementFilters::new(),
        }
    }

    #[must_use]
    pub fn with_measurement_filters(mut self, filters: MeasurementFilters) -> Self {
        self.measurement_filters = filters;
        self
    }

    /// Start the analysis of `root` and process every module.
    pub fn run(
        &self,
        index: &mut ScanIndex,
        root: &ModuleDefinition,
        scanner: &mut dyn ModuleScanner,
    ) -> Result<Vec<ModuleReport>, StratumError> {
        index.start(root)?;
        let mut reports = Vec::new();
        for module in root.post_order() {
            reports.push(self.run_module(index, module, scanner)?);
        }
        Ok(reports)
    }

    fn run_module(
        &self,
        index: &mut ScanIndex,
        module: &ModuleDefinition,
        scanner: &mut dyn ModuleScanner,
    ) -> Result<ModuleReport, StratumError> {
        let filters = ResourceFilters::new().with(PatternFilter::new(module.exclusions.as_slice())?);
        index.set_current_module(&module.resource, filters, Box::new(MemoryIssues::new()))?;

        info!(module = %module.resource, "Scanning module");
        scanner.scan(module, index)?;
        index.lock();

        DecoratorsExecutor::new(self.selector, module)
            .with_measurement_filters(self.measurement_filters.clone())
            .execute(index, self.events)?;

        let report = ModuleReport::collect(index, module);
        info!(
            module = %module.resource,
            resources = report.resources,
            measures = report.measures,
            "Module analyzed"
        );
        index.clear();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::RegisteredDecorators;
    use crate::lock::CreationLock;
    use crate::session::ModuleLanguages;
    use crate::storage::{MemoryPersistence, MetricRegistry};
    use crate::types::{Measure, Metric, MetricType, Resource};

    /// Indexes two files per module, one of them under `gen/`.
    struct TwoFiles {
        seen: Vec<String>,
    }

    impl ModuleScanner for TwoFiles {
        fn scan(
            &mut self,
            module: &ModuleDefinition,
            index: &mut ScanIndex,
        ) -> Result<(), StratumError> {
            self.seen.push(module.resource.key.clone());
            let locked_before = index.creation_lock().is_locked();
            assert!(!locked_before);
            let file = Resource::file(format!("{}/a.rs", module.resource.key));
            index.add_measure(&file, Measure::new("lines", 5.0))?;
            index.index(&Resource::file("gen/b.rs"))?;
            Ok(())
        }
    }

    #[test]
    fn modules_run_children_first_and_clear() {
        let root = ModuleDefinition::new(Resource::project("root"), ModuleLanguages::default())
            .with_module(
                ModuleDefinition::new(Resource::module("core"), ModuleLanguages::default())
                    .with_exclusions(vec!["gen/**".to_string()]),
            );
        let mut index = ScanIndex::new(
            Box::new(MemoryPersistence::new()),
            Box::new(MetricRegistry::new().with(Metric::new("lines", "Lines", MetricType::Int))),
            CreationLock::new(true),
        );
        let selector = RegisteredDecorators::new();
        let events = EventBus::new();
        let mut scanner = TwoFiles { seen: Vec::new() };

        let reports = ModuleBatch::new(&selector, &events)
            .run(&mut index, &root, &mut scanner)
            .expect("batch");

        assert_eq!(scanner.seen, vec!["core", "root"]);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].module, "core");
        // core, core/a.rs, gen/b.rs (excluded)
        assert_eq!(reports[0].resources, 3);
        assert_eq!(reports[0].excluded, 1);
        assert_eq!(reports[0].measures, 1);
        // root, root/a.rs, gen/b.rs; the sub-module is not counted
        assert_eq!(reports[1].resources, 3);
        assert_eq!(reports[1].excluded, 0);
        assert!(!index.creation_lock().is_locked());
        assert!(!index.is_indexed(&Resource::file("root/a.rs"), true));
    }
}
