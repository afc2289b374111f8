//! Child-sum aggregation decorator, configured by `[[aggregate]]` entries.

use crate::config::AggregateConfig;
use stratum_core::{
    Decorator, DecoratorContext, FrozenContext, Language, Measure, ModuleView, Resource, Scope,
    StratumError,
};

#[derive(Debug, Clone)]
pub struct SumChildren {
    name: String,
    metric: String,
    target: String,
    scope: Scope,
    languages: Vec<Language>,
}

impl SumChildren {
    #[must_use]
    pub fn from_config(config: &AggregateConfig) -> Self {
        let target = config.target.clone().unwrap_or_else(|| config.metric.clone());
        Self {
            name: format!("sum({} -> {})", config.metric, target),
            metric: config.metric.clone(),
            target,
            scope: config.scope,
            languages: config.languages.iter().map(Language::new).collect(),
        }
    }

    /// The value a child contributes: its aggregate if it has one, else
    /// its raw metric.
    fn contribution(&self, child: &FrozenContext) -> Option<f64> {
        child
            .measure(&self.target)
            .or_else(|| child.measure(&self.metric))
            .and_then(|measure| measure.value)
    }
}

impl Decorator for SumChildren {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_execute_on(&self, module: &ModuleView<'_>) -> bool {
        if self.languages.is_empty() {
            return true;
        }
        module
            .active_language()
            .is_some_and(|language| self.languages.contains(language))
    }

    fn decorate(
        &self,
        resource: &Resource,
        context: &mut DecoratorContext<'_>,
    ) -> Result<(), StratumError> {
        if !resource.scope().is_higher_than_or_equals(self.scope) {
            return Ok(());
        }
        if context.measure(&self.target)?.is_some() {
            return Ok(());
        }
        let values: Vec<f64> = context
            .children()
            .iter()
            .filter_map(|child| self.contribution(child))
            .collect();
        if values.is_empty() {
            return Ok(());
        }
        context.save_measure(Measure::new(self.target.clone(), values.iter().sum()))?;
        Ok(())
    }
}
