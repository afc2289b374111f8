//! # Decorators Executor
//!
//! Runs the selected decorators over a module, bottom-up.
//!
//! Every child is decorated and frozen before its parent. Sub-modules are
//! walked but not decorated: they had their own pass. Within one resource
//! decorators run in selection order.
//!
//! ## Languages
//!
//! A single-language module activates its language once. In a
//! multi-language module, a resource with a concrete language activates it;
//! a resource without one (or marked `multi`) tries each module language in
//! turn and runs the decorator under the first one it accepts.

use crate::decorator::{Decorator, DecoratorContext, FrozenContext};
use crate::events::{BatchEvent, EventBus};
use crate::filters::MeasurementFilters;
use crate::index::ScanIndex;
use crate::ports::DecoratorSelector;
use crate::session::ModuleDefinition;
use crate::types::{Language, Resource, ResourceId, StratumError};
use std::rc::Rc;
use tracing::debug;

pub struct DecoratorsExecutor<'a> {
    module: &'a ModuleDefinition,
    decorators: Vec<Rc<dyn Decorator>>,
    measurement_filters: MeasurementFilters,
}

impl std::fmt::Debug for DecoratorsExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoratorsExecutor")
            .field("module", &self.module.resource.key)
            .field("decorators", &self.decorator_names())
            .finish_non_exhaustive()
    }
}

impl<'a> DecoratorsExecutor<'a> {
    /// Resolve the decorators for `module` once, before any traversal.
    #[must_use]
    pub fn new(selector: &dyn DecoratorSelector, module: &'a ModuleDefinition) -> Self {
        let decorators = selector.select(&module.view(module.languages.original()));
        Self {
            module,
            decorators,
            measurement_filters: MeasurementFilters::new(),
        }
    }

    #[must_use]
    pub fn with_measurement_filters(mut self, filters: MeasurementFilters) -> Self {
        self.measurement_filters = filters;
        self
    }

    #[must_use]
    pub fn decorator_names(&self) -> Vec<String> {
        self.decorators.iter().map(|d| d.name().to_string()).collect()
    }

    /// Decorate the module tree.
    pub fn execute(&self, index: &mut ScanIndex, events: &EventBus) -> Result<(), StratumError> {
        let root = index
            .resource_id(&self.module.resource)
            .ok_or_else(|| StratumError::ResourceNotIndexed(self.module.resource.to_string()))?;

        events.fire_event(&BatchEvent::DecoratorsPhase {
            decorators: self.decorator_names(),
            start: true,
        });

        let mut language = if self.module.languages.is_multi_language() {
            None
        } else {
            self.module.languages.original().cloned()
        };
        self.decorate_resource(index, events, root, true, &mut language)?;

        events.fire_event(&BatchEvent::DecoratorsPhase {
            decorators: self.decorator_names(),
            start: false,
        });
        Ok(())
    }

    fn decorate_resource(
        &self,
        index: &mut ScanIndex,
        events: &EventBus,
        id: ResourceId,
        execute: bool,
        language: &mut Option<Language>,
    ) -> Result<FrozenContext, StratumError> {
        let children = index.graph().children(id, false);
        let mut frozen = Vec::with_capacity(children.len());
        for child in children {
            let is_module = index
                .graph()
                .resource(child)
                .is_some_and(Resource::is_module);
            frozen.push(self.decorate_resource(
                index,
                events,
                child,
                execute && !is_module,
                language,
            )?);
        }

        let resource = index
            .graph()
            .resource(id)
            .cloned()
            .ok_or_else(|| StratumError::ResourceNotIndexed(format!("{:?}", id)))?;

        if execute {
            let multi_language = self.module.languages.is_multi_language();
            for decorator in &self.decorators {
                let unspecified = resource
                    .language
                    .as_ref()
                    .is_none_or(Language::is_multi_language);
                if multi_language && unspecified {
                    for candidate in self.module.languages.keys() {
                        *language = Some(candidate.clone());
                        if decorator.should_execute_on(&self.module.view(language.as_ref())) {
                            self.execute_decorator(decorator, index, events, &resource, &frozen)?;
                            break;
                        }
                    }
                } else {
                    if multi_language {
                        language.clone_from(&resource.language);
                    }
                    if decorator.should_execute_on(&self.module.view(language.as_ref())) {
                        self.execute_decorator(decorator, index, events, &resource, &frozen)?;
                    }
                }
            }
        }

        FrozenContext::capture(index, id)
            .ok_or_else(|| StratumError::ResourceNotIndexed(resource.to_string()))
    }

    fn execute_decorator(
        &self,
        decorator: &Rc<dyn Decorator>,
        index: &mut ScanIndex,
        events: &EventBus,
        resource: &Resource,
        children: &[FrozenContext],
    ) -> Result<(), StratumError> {
        let name = decorator.name().to_string();
        events.fire_event(&BatchEvent::DecoratorExecution {
            decorator: name.clone(),
            start: true,
        });

        let mut context =
            DecoratorContext::new(index, resource.clone(), children, &self.measurement_filters);
        match decorator.decorate(resource, &mut context) {
            Ok(()) => {}
            Err(e @ StratumError::Message(_)) => return Err(e),
            Err(e) => {
                debug!(decorator = name.as_str(), resource = %resource, "Decorator failed");
                return Err(StratumError::DecoratorFailure {
                    decorator: name,
                    resource: resource.to_string(),
                    source: Box::new(e),
                });
            }
        }

        events.fire_event(&BatchEvent::DecoratorExecution {
            decorator: name,
            start: false,
        });
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::RegisteredDecorators;
    use crate::lock::CreationLock;
    use crate::ports::EventHandler;
    use crate::session::{ModuleLanguages, ModuleView};
    use crate::storage::{MemoryPersistence, MetricRegistry};
    use crate::types::{Measure, Metric, MetricType};
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records "<name>@<resource key>/<active language>" for every call.
    struct Recording {
        name: &'static str,
        accept: Option<&'static str>,
        log: Log,
    }

    impl Decorator for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn should_execute_on(&self, module: &ModuleView<'_>) -> bool {
            match self.accept {
                None => true,
                Some(lang) => module.active_language().is_some_and(|l| l.as_str() == lang),
            }
        }

        fn decorate(
            &self,
            resource: &Resource,
            _context: &mut DecoratorContext<'_>,
        ) -> Result<(), StratumError> {
            self.log
                .borrow_mut()
                .push(format!("{}@{}", self.name, resource.key));
            Ok(())
        }
    }

    struct Failing(StratumError);

    impl Decorator for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn should_execute_on(&self, _module: &ModuleView<'_>) -> bool {
            true
        }

        fn decorate(
            &self,
            _resource: &Resource,
            _context: &mut DecoratorContext<'_>,
        ) -> Result<(), StratumError> {
            Err(match &self.0 {
                StratumError::Message(m) => StratumError::Message(m.clone()),
                other => StratumError::Persistence(other.to_string()),
            })
        }
    }

    #[derive(Clone, Default)]
    struct Events(Rc<RefCell<Vec<BatchEvent>>>);

    impl EventHandler for Events {
        fn on_event(&self, event: &BatchEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    fn setup(module: &ModuleDefinition) -> ScanIndex {
        let mut index = ScanIndex::new(
            Box::new(MemoryPersistence::new()),
            Box::new(MetricRegistry::new().with(Metric::new("lines", "Lines", MetricType::Int))),
            CreationLock::default(),
        );
        index.start(module).expect("start");
        index
    }

    #[test]
    fn children_are_decorated_before_parents() {
        let module = ModuleDefinition::new(
            Resource::project("p"),
            ModuleLanguages::single(Language::new("rust")),
        );
        let mut index = setup(&module);
        let dir = Resource::directory("src");
        index
            .index(&Resource::file("src/a.rs").with_parent(dir.clone()))
            .expect("index");
        index
            .index(&Resource::file("src/b.rs").with_parent(dir))
            .expect("index");

        let log = Log::default();
        let selector = RegisteredDecorators::new().with(Recording {
            name: "d",
            accept: None,
            log: log.clone(),
        });
        DecoratorsExecutor::new(&selector, &module)
            .execute(&mut index, &EventBus::new())
            .expect("execute");

        assert_eq!(
            *log.borrow(),
            vec!["d@src/a.rs", "d@src/b.rs", "d@src", "d@p"]
        );
    }

    #[test]
    fn sub_modules_are_not_decorated_in_parent_pass() {
        let module = ModuleDefinition::new(Resource::project("p"), ModuleLanguages::default())
            .with_module(ModuleDefinition::new(
                Resource::module("m"),
                ModuleLanguages::default(),
            ));
        let mut index = setup(&module);
        let log = Log::default();
        let selector = RegisteredDecorators::new().with(Recording {
            name: "d",
            accept: None,
            log: log.clone(),
        });
        DecoratorsExecutor::new(&selector, &module)
            .execute(&mut index, &EventBus::new())
            .expect("execute");
        assert_eq!(*log.borrow(), vec!["d@p"]);
    }

    #[test]
    fn multi_language_runs_under_first_accepted_language() {
        let module = ModuleDefinition::new(
            Resource::project("p"),
            ModuleLanguages::multi(vec![Language::new("java"), Language::new("js")]),
        );
        let mut index = setup(&module);
        index.index(&Resource::file("a.txt")).expect("index");
        index
            .index(&Resource::file("b.java").with_language(Language::new("java")))
            .expect("index");

        let log = Log::default();
        let selector = RegisteredDecorators::new().with(Recording {
            name: "js-only",
            accept: Some("js"),
            log: log.clone(),
        });
        DecoratorsExecutor::new(&selector, &module)
            .execute(&mut index, &EventBus::new())
            .expect("execute");

        // a.txt and p have no language: tried under java then js, run once.
        // b.java activates java, which the decorator refuses.
        assert_eq!(*log.borrow(), vec!["js-only@a.txt", "js-only@p"]);
    }

    #[test]
    fn failures_are_wrapped_with_resource() {
        let module = ModuleDefinition::new(Resource::project("p"), ModuleLanguages::default());
        let mut index = setup(&module);
        let selector =
            RegisteredDecorators::new().with(Failing(StratumError::Persistence("disk".into())));
        let err = DecoratorsExecutor::new(&selector, &module)
            .execute(&mut index, &EventBus::new())
            .expect_err("fails");
        match err {
            StratumError::DecoratorFailure {
                decorator,
                resource,
                ..
            } => {
                assert_eq!(decorator, "failing");
                assert_eq!(resource, "TRK[p]");
            }
            other => unreachable!("unexpected error {other}"),
        }
    }

    #[test]
    fn messages_propagate_unwrapped() {
        let module = ModuleDefinition::new(Resource::project("p"), ModuleLanguages::default());
        let mut index = setup(&module);
        let selector =
            RegisteredDecorators::new().with(Failing(StratumError::Message("stop".into())));
        let err = DecoratorsExecutor::new(&selector, &module)
            .execute(&mut index, &EventBus::new())
            .expect_err("fails");
        assert!(matches!(err, StratumError::Message(m) if m == "stop"));
    }

    #[test]
    fn events_bracket_phase_and_invocations() {
        let module = ModuleDefinition::new(Resource::project("p"), ModuleLanguages::default());
        let mut index = setup(&module);
        index.index(&Resource::file("a.rs")).expect("index");
        index
            .add_measure(&Resource::file("a.rs"), Measure::new("lines", 1.0))
            .expect("measure");
        let recorder = Events::default();
        let bus = EventBus::new().with(recorder.clone());
        let selector = RegisteredDecorators::new().with(Recording {
            name: "d",
            accept: None,
            log: Log::default(),
        });
        DecoratorsExecutor::new(&selector, &module)
            .execute(&mut index, &bus)
            .expect("execute");

        let seen = recorder.0.borrow();
        assert_eq!(seen.len(), 6);
        assert!(matches!(&seen[0], BatchEvent::DecoratorsPhase { start: true, .. }));
        assert!(matches!(&seen[1], BatchEvent::DecoratorExecution { start: true, .. }));
        assert!(matches!(&seen[2], BatchEvent::DecoratorExecution { start: false, .. }));
        assert!(matches!(&seen[5], BatchEvent::DecoratorsPhase { start: false, .. }));
    }
}
