//! Metrics and measures.

use serde::{Deserialize, Serialize};

// =============================================================================
// METRIC
// =============================================================================

/// Value type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Int,
    Float,
    Percent,
    Bool,
    /// Free-form text payload.
    Data,
}

/// A named quantity that measures attach to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: MetricType,
}

impl Metric {
    #[must_use]
    pub fn new(key: impl Into<String>, name: impl Into<String>, value_type: MetricType) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            value_type,
        }
    }

    /// True for metrics whose measures carry text rather than a number.
    #[must_use]
    pub fn is_data(&self) -> bool {
        self.value_type == MetricType::Data
    }
}

// =============================================================================
// PERSISTENCE MODE
// =============================================================================

/// Where a measure lives once it is added to the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// Kept in memory and written to the persistence port.
    #[default]
    Full,
    /// Kept in memory only.
    Memory,
    /// Written to the persistence port only.
    Database,
}

impl PersistenceMode {
    #[must_use]
    pub const fn use_database(self) -> bool {
        matches!(self, PersistenceMode::Full | PersistenceMode::Database)
    }

    #[must_use]
    pub const fn use_memory(self) -> bool {
        matches!(self, PersistenceMode::Full | PersistenceMode::Memory)
    }
}

// =============================================================================
// MEASURE
// =============================================================================

/// A metric value attached to a resource.
///
/// At most one measure per metric is kept per resource; adding a second one
/// replaces the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub metric_key: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub persistence_mode: PersistenceMode,
    /// Resolved by the index from the metric registry.
    #[serde(default)]
    pub metric: Option<Metric>,
}

impl Measure {
    /// Numeric measure.
    #[must_use]
    pub fn new(metric_key: impl Into<String>, value: f64) -> Self {
        Self {
            metric_key: metric_key.into(),
            value: Some(value),
            data: None,
            persistence_mode: PersistenceMode::Full,
            metric: None,
        }
    }

    /// Text measure.
    #[must_use]
    pub fn data(metric_key: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            metric_key: metric_key.into(),
            value: None,
            data: Some(data.into()),
            persistence_mode: PersistenceMode::Full,
            metric: None,
        }
    }

    #[must_use]
    pub fn with_persistence_mode(mut self, mode: PersistenceMode) -> Self {
        self.persistence_mode = mode;
        self
    }
}

// =============================================================================
// MEASURES FILTER
// =============================================================================

/// Selects measures of a resource by metric.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MeasuresFilter {
    #[default]
    All,
    Metric(String),
    Metrics(Vec<String>),
}

impl MeasuresFilter {
    #[must_use]
    pub fn accepts(&self, measure: &Measure) -> bool {
        match self {
            MeasuresFilter::All => true,
            MeasuresFilter::Metric(key) => *key == measure.metric_key,
            MeasuresFilter::Metrics(keys) => keys.iter().any(|k| *k == measure.metric_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_modes() {
        assert!(PersistenceMode::Full.use_database());
        assert!(PersistenceMode::Full.use_memory());
        assert!(!PersistenceMode::Memory.use_database());
        assert!(!PersistenceMode::Database.use_memory());
    }

    #[test]
    fn filter_by_metric() {
        let lines = Measure::new("lines", 3.0);
        assert!(MeasuresFilter::All.accepts(&lines));
        assert!(MeasuresFilter::Metric("lines".into()).accepts(&lines));
        assert!(!MeasuresFilter::Metric("ncloc".into()).accepts(&lines));
        assert!(
            MeasuresFilter::Metrics(vec!["ncloc".into(), "lines".into()]).accepts(&lines)
        );
    }
}
