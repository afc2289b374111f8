//! # Scan Report
//!
//! Analyzers run outside this process and hand over what they found as a
//! JSON document, one section per module key:
//!
//! ```json
//! {
//!   "modules": {
//!     "shop-core": {
//!       "resources": [{ "qualifier": "file", "key": "src/Main.java" }],
//!       "measures": [
//!         { "resource": { "qualifier": "file", "key": "src/Main.java" },
//!           "measure": { "metric_key": "ncloc", "value": 42 } }
//!       ],
//!       "dependencies": [],
//!       "violations": [],
//!       "links": []
//!     }
//!   }
//! }
//! ```
//!
//! `ReportScanner` replays a module's section into the index during the
//! scan phase.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use stratum_core::keys::parse_directory_key;
use stratum_core::{
    Dependency, Measure, ModuleDefinition, ModuleScanner, ProjectLink, Qualifier, Resource,
    ScanIndex, StratumError, Violation,
};
use tracing::{debug, info};

/// Maximum report size (100 MB).
const MAX_REPORT_FILE_SIZE: u64 = 100 * 1024 * 1024;

// =============================================================================
// REPORT TYPES
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleScan>,
}

/// Everything reported for one module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleScan {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub measures: Vec<MeasureEntry>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub links: Vec<ProjectLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureEntry {
    pub resource: Resource,
    pub measure: Measure,
}

impl ScanReport {
    pub fn load(path: &Path) -> Result<Self, StratumError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            StratumError::IoError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_REPORT_FILE_SIZE {
            return Err(StratumError::SerializationError(format!(
                "Report size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_REPORT_FILE_SIZE
            )));
        }
        let bytes = std::fs::read(path).map_err(|e| {
            StratumError::IoError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&bytes)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, StratumError> {
        serde_json::from_slice(bytes)
            .map_err(|e| StratumError::SerializationError(format!("Invalid scan report: {}", e)))
    }
}

// =============================================================================
// SCANNER
// =============================================================================

/// Feeds the index from a loaded report.
#[derive(Debug)]
pub struct ReportScanner {
    report: ScanReport,
}

impl ReportScanner {
    #[must_use]
    pub fn new(report: ScanReport) -> Self {
        Self { report }
    }
}

/// Directory keys in a report are written by hand or by foreign tools;
/// bring them (and those of declared parents) to canonical form.
fn normalized(mut resource: Resource) -> Resource {
    if resource.qualifier == Qualifier::Directory {
        resource.key = parse_directory_key(&resource.key);
    }
    resource.effective_key = None;
    resource.parent = resource.parent.map(|parent| Box::new(normalized(*parent)));
    resource
}

fn normalized_dependency(mut dependency: Dependency) -> Dependency {
    dependency.from = normalized(dependency.from);
    dependency.to = normalized(dependency.to);
    dependency.id = None;
    dependency.parent = dependency
        .parent
        .map(|parent| Box::new(normalized_dependency(*parent)));
    dependency
}

impl ModuleScanner for ReportScanner {
    fn scan(&mut self, module: &ModuleDefinition, index: &mut ScanIndex) -> Result<(), StratumError> {
        let Some(scan) = self.report.modules.remove(&module.resource.key) else {
            debug!(module = %module.resource, "Nothing reported for module");
            return Ok(());
        };

        for resource in scan.resources {
            index.index(&normalized(resource))?;
        }
        for entry in &scan.measures {
            index.add_measure(&normalized(entry.resource.clone()), entry.measure.clone())?;
        }
        for dependency in scan.dependencies {
            index.add_dependency(normalized_dependency(dependency))?;
        }
        let mut violations = 0usize;
        for mut violation in scan.violations {
            violation.resource = violation.resource.map(normalized);
            if index.add_violation(violation)? {
                violations += 1;
            }
        }
        for link in &scan.links {
            index.add_link(link)?;
        }

        info!(
            module = %module.resource,
            measures = scan.measures.len(),
            violations,
            links = scan.links.len(),
            "Scan report replayed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::{
        CreationLock, MemoryPersistence, Metric, MetricRegistry, MetricType, ModuleLanguages,
        PersistenceCall,
    };

    const REPORT: &str = r#"{
  "modules": {
    "p": {
      "resources": [
        { "qualifier": "directory", "key": "/src/" },
        { "qualifier": "file", "key": "src/a.rs",
          "parent": { "qualifier": "directory", "key": "src" } }
      ],
      "measures": [
        { "resource": { "qualifier": "file", "key": "src/a.rs" },
          "measure": { "metric_key": "ncloc", "value": 10 } }
      ],
      "dependencies": [
        { "from": { "qualifier": "file", "key": "src/a.rs" },
          "to": { "qualifier": "library", "key": "serde:serde" } }
      ],
      "violations": [
        { "resource": { "qualifier": "file", "key": "src/a.rs" },
          "rule": { "repository": "clippy", "key": "unwrap_used" },
          "message": "unwrap in production code",
          "line": 3 }
      ],
      "links": [
        { "key": "scm", "name": "Sources", "href": "https://example.org/p.git" }
      ]
    }
  }
}"#;

    fn index_with(store: &MemoryPersistence, root: &ModuleDefinition) -> ScanIndex {
        let mut index = ScanIndex::new(
            Box::new(store.clone()),
            Box::new(
                MetricRegistry::new().with(Metric::new("ncloc", "Lines of code", MetricType::Int)),
            ),
            CreationLock::new(true),
        );
        index.start(root).expect("start");
        index
    }

    #[test]
    fn report_is_replayed_into_the_index() {
        let report = ScanReport::from_json(REPORT.as_bytes()).expect("parse");
        let root = ModuleDefinition::new(Resource::project("p"), ModuleLanguages::default());
        let store = MemoryPersistence::new();
        let mut index = index_with(&store, &root);

        ReportScanner::new(report).scan(&root, &mut index).expect("scan");

        let file = Resource::file("src/a.rs");
        assert_eq!(
            index.parent(&file).map(|r| r.key.as_str()),
            Some("src")
        );
        assert_eq!(
            index
                .measure(&file, "ncloc")
                .expect("measure")
                .and_then(|m| m.value),
            Some(10.0)
        );
        assert!(index.has_edge(&file, &Resource::library("serde:serde")));
        assert_eq!(
            index
                .violations(&file, stratum_core::SwitchMode::On)
                .len(),
            1
        );
        assert!(store
            .calls()
            .contains(&PersistenceCall::SaveLink("scm".to_string())));
    }

    #[test]
    fn unreported_module_is_a_no_op() {
        let root = ModuleDefinition::new(Resource::project("other"), ModuleLanguages::default());
        let store = MemoryPersistence::new();
        let mut index = index_with(&store, &root);
        ReportScanner::new(ScanReport::default())
            .scan(&root, &mut index)
            .expect("scan");
        assert_eq!(index.graph().len(), 1);
    }

    #[test]
    fn malformed_report_is_a_serialization_error() {
        assert!(matches!(
            ScanReport::from_json(b"{ \"modules\": 3 }"),
            Err(StratumError::SerializationError(_))
        ));
    }
}
