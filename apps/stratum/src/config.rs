//! # Project Descriptor
//!
//! The TOML file that describes what to analyze: the module tree, the
//! metrics the analyzers may report, and the aggregations to run.
//!
//! ```toml
//! fail_when_locked = true
//!
//! [project]
//! key = "shop"
//! languages = ["java"]
//!
//! [[project.modules]]
//! key = "shop-core"
//! exclusions = ["target/**"]
//!
//! [[metrics]]
//! key = "ncloc"
//! name = "Lines of code"
//!
//! [[aggregate]]
//! metric = "ncloc"
//! ```

use crate::aggregate::SumChildren;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use stratum_core::{
    Language, Metric, MetricFinder, MetricRegistry, MetricType, ModuleDefinition, ModuleLanguages,
    RegisteredDecorators, Resource, Scope, StratumError,
};

/// Maximum descriptor size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// DESCRIPTOR TYPES
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Strict lock: creating a resource after the scan phase is an error.
    #[serde(default)]
    pub fail_when_locked: bool,
    pub project: ModuleConfig,
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
    #[serde(default)]
    pub aggregate: Vec<AggregateConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleConfig {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub multi_language: bool,
    /// Glob patterns of excluded directories and files.
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricConfig {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default = "default_metric_type")]
    pub value_type: MetricType,
}

const fn default_metric_type() -> MetricType {
    MetricType::Int
}

/// A child-sum aggregation: `target` on a resource is the sum over its
/// children of their `target`, or of their `metric` when they have none.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateConfig {
    pub metric: String,
    /// Defaults to `metric`.
    #[serde(default)]
    pub target: Option<String>,
    /// Finest scope that receives the sum.
    #[serde(default = "default_aggregate_scope")]
    pub scope: Scope,
    /// Languages the aggregation runs under; empty means all.
    #[serde(default)]
    pub languages: Vec<String>,
}

const fn default_aggregate_scope() -> Scope {
    Scope::Directory
}

// =============================================================================
// LOADING
// =============================================================================

impl ProjectConfig {
    /// Load and validate a descriptor file.
    pub fn load(path: &Path) -> Result<Self, StratumError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            StratumError::IoError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(StratumError::Config(format!(
                "Descriptor size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            StratumError::IoError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, StratumError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| StratumError::Config(format!("Invalid descriptor: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), StratumError> {
        let mut seen = BTreeSet::new();
        validate_module(&self.project, &mut seen)?;

        let metrics = self.metric_registry();
        for aggregate in &self.aggregate {
            for key in [Some(&aggregate.metric), aggregate.target.as_ref()]
                .into_iter()
                .flatten()
            {
                if metrics.find_by_key(key).is_none() {
                    return Err(StratumError::Config(format!(
                        "Aggregate refers to undeclared metric '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // CONVERSIONS
    // =========================================================================

    /// The module tree, rooted at the project.
    #[must_use]
    pub fn module_definition(&self) -> ModuleDefinition {
        to_definition(&self.project, Resource::project(self.project.key.clone()))
    }

    #[must_use]
    pub fn metric_registry(&self) -> MetricRegistry {
        let mut registry = MetricRegistry::new();
        for metric in &self.metrics {
            let name = metric.name.clone().unwrap_or_else(|| metric.key.clone());
            registry.register(Metric::new(metric.key.clone(), name, metric.value_type));
        }
        registry
    }

    /// One decorator per `[[aggregate]]` entry, in declaration order.
    #[must_use]
    pub fn decorators(&self) -> RegisteredDecorators {
        self.aggregate
            .iter()
            .fold(RegisteredDecorators::new(), |decorators, aggregate| {
                decorators.with(SumChildren::from_config(aggregate))
            })
    }
}

fn validate_module(module: &ModuleConfig, seen: &mut BTreeSet<String>) -> Result<(), StratumError> {
    if module.key.trim().is_empty() {
        return Err(StratumError::Config("Module without a key".to_string()));
    }
    if !seen.insert(module.key.clone()) {
        return Err(StratumError::Config(format!(
            "Module key '{}' is declared twice",
            module.key
        )));
    }
    if module.multi_language && module.languages.is_empty() {
        return Err(StratumError::Config(format!(
            "Multi-language module '{}' declares no language",
            module.key
        )));
    }
    for child in &module.modules {
        validate_module(child, seen)?;
    }
    Ok(())
}

fn to_definition(module: &ModuleConfig, resource: Resource) -> ModuleDefinition {
    let resource = match &module.name {
        Some(name) => resource.with_name(name.clone()),
        None => resource,
    };
    let languages = if module.multi_language {
        ModuleLanguages::multi(module.languages.iter().map(Language::new).collect())
    } else {
        match module.languages.first() {
            Some(language) => ModuleLanguages::single(Language::new(language.clone())),
            None => ModuleLanguages::default(),
        }
    };

    module.modules.iter().fold(
        ModuleDefinition::new(resource, languages).with_exclusions(module.exclusions.clone()),
        |definition, child| {
            definition.with_module(to_definition(child, Resource::module(child.key.clone())))
        },
    )
}
