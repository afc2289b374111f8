//! # Filters
//!
//! Resource exclusion filters and measurement filters.

use crate::ports::ResourceFilter;
use crate::types::{Measure, Resource, StratumError};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fmt;
use std::rc::Rc;

// =============================================================================
// RESOURCE FILTERS
// =============================================================================

/// A list of resource filters; a resource is excluded when any of them
/// excludes it.
#[derive(Default)]
pub struct ResourceFilters {
    filters: Vec<Box<dyn ResourceFilter>>,
}

impl ResourceFilters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, filter: impl ResourceFilter + 'static) -> Self {
        self.push(filter);
        self
    }

    pub fn push(&mut self, filter: impl ResourceFilter + 'static) {
        self.filters.push(Box::new(filter));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl ResourceFilter for ResourceFilters {
    fn is_excluded(&self, resource: &Resource) -> bool {
        self.filters.iter().any(|filter| filter.is_excluded(resource))
    }
}

impl fmt::Debug for ResourceFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceFilters")
            .field("len", &self.filters.len())
            .finish()
    }
}

/// Excludes directories and files whose path (or key) matches a glob.
///
/// `*` stays within one path segment, `**` crosses segments.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    patterns: Vec<String>,
    set: GlobSet,
}

impl PatternFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, StratumError> {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| StratumError::Config(format!("invalid exclusion '{}': {}", pattern, e)))?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }
        let set = builder
            .build()
            .map_err(|e| StratumError::Config(e.to_string()))?;
        Ok(Self {
            patterns: kept,
            set,
        })
    }

    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl ResourceFilter for PatternFilter {
    fn is_excluded(&self, resource: &Resource) -> bool {
        if !resource.is_directory_or_file() {
            return false;
        }
        let path = resource.path.as_deref().unwrap_or(&resource.key);
        self.set.is_match(path)
    }
}

// =============================================================================
// MEASUREMENT FILTERS
// =============================================================================

/// Vetoes measures saved by decorators.
pub trait MeasurementFilter {
    fn accept(&self, resource: &Resource, measure: &Measure) -> bool;
}

/// All configured measurement filters; a measure is kept only if every
/// filter accepts it. Clones share the filters.
#[derive(Default, Clone)]
pub struct MeasurementFilters {
    filters: Vec<Rc<dyn MeasurementFilter>>,
}

impl MeasurementFilters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, filter: impl MeasurementFilter + 'static) -> Self {
        self.filters.push(Rc::new(filter));
        self
    }

    #[must_use]
    pub fn accept(&self, resource: &Resource, measure: &Measure) -> bool {
        self.filters
            .iter()
            .all(|filter| filter.accept(resource, measure))
    }
}

impl fmt::Debug for MeasurementFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementFilters")
            .field("len", &self.filters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_filter_matches_paths() {
        let filter = PatternFilter::new(&["**/generated/**", "*.min.js"]).expect("patterns");
        assert!(filter.is_excluded(&Resource::file("src/generated/Model.java")));
        assert!(filter.is_excluded(&Resource::directory("src/generated/api")));
        assert!(filter.is_excluded(&Resource::file("app.min.js")));
        assert!(!filter.is_excluded(&Resource::file("web/app.min.js")));
        assert!(!filter.is_excluded(&Resource::file("src/Main.java")));
    }

    #[test]
    fn pattern_filter_ignores_project_scope() {
        let filter = PatternFilter::new(&["**"]).expect("patterns");
        assert!(!filter.is_excluded(&Resource::project("p")));
        assert!(!filter.is_excluded(&Resource::library("g:a")));
        assert!(filter.is_excluded(&Resource::file("a.rs")));
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = PatternFilter::new(&["src/[a"]).expect_err("invalid glob");
        assert!(matches!(err, StratumError::Config(_)));
    }

    #[test]
    fn blank_patterns_are_skipped() {
        let filter = PatternFilter::new(&["", "  "]).expect("patterns");
        assert!(filter.patterns().is_empty());
        assert!(!filter.is_excluded(&Resource::file("a.rs")));
    }

    struct RejectKey(&'static str);

    impl MeasurementFilter for RejectKey {
        fn accept(&self, _resource: &Resource, measure: &Measure) -> bool {
            measure.metric_key != self.0
        }
    }

    #[test]
    fn measurement_filters_all_must_accept() {
        let filters = MeasurementFilters::new().with(RejectKey("ncloc"));
        let file = Resource::file("a.rs");
        assert!(filters.accept(&file, &Measure::new("lines", 1.0)));
        assert!(!filters.accept(&file, &Measure::new("ncloc", 1.0)));
        assert!(MeasurementFilters::new().accept(&file, &Measure::new("ncloc", 1.0)));
    }

    #[test]
    fn composed_filters_exclude_on_any() {
        let filters = ResourceFilters::new()
            .with(PatternFilter::new(&["a/**"]).expect("patterns"))
            .with(PatternFilter::new(&["b/**"]).expect("patterns"));
        assert_eq!(filters.len(), 2);
        assert!(filters.is_excluded(&Resource::file("b/x.rs")));
        assert!(!filters.is_excluded(&Resource::file("c/x.rs")));
    }
}
