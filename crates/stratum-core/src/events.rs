//! # Batch Events
//!
//! Lifecycle notifications fired by the decorator engine, fanned out to
//! registered `EventHandler`s. Handlers observe only; they cannot stop or
//! alter a pass.

use crate::ports::EventHandler;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::debug;

/// A lifecycle event of the decoration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// Brackets a whole decoration pass over one module.
    DecoratorsPhase { decorators: Vec<String>, start: bool },
    /// Brackets one decorator invocation on one resource.
    DecoratorExecution { decorator: String, start: bool },
}

impl BatchEvent {
    #[must_use]
    pub fn is_start(&self) -> bool {
        match self {
            BatchEvent::DecoratorsPhase { start, .. }
            | BatchEvent::DecoratorExecution { start, .. } => *start,
        }
    }

    #[must_use]
    pub fn is_end(&self) -> bool {
        !self.is_start()
    }
}

/// Fan-out of batch events to handlers, in subscription order.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.subscribe(handler);
        self
    }

    pub fn subscribe(&mut self, handler: impl EventHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn fire_event(&self, event: &BatchEvent) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Logs the pass and each decorator at debug level, with elapsed times.
#[derive(Debug, Default)]
pub struct TracingEventHandler {
    started: RefCell<BTreeMap<String, Instant>>,
}

impl TracingEventHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventHandler for TracingEventHandler {
    fn on_event(&self, event: &BatchEvent) {
        match event {
            BatchEvent::DecoratorsPhase {
                decorators,
                start: true,
            } => {
                debug!(count = decorators.len(), "Decorators: {}", decorators.join(" -> "));
            }
            BatchEvent::DecoratorsPhase { start: false, .. } => {
                debug!("Decorators phase done");
            }
            BatchEvent::DecoratorExecution {
                decorator,
                start: true,
            } => {
                self.started
                    .borrow_mut()
                    .insert(decorator.clone(), Instant::now());
            }
            BatchEvent::DecoratorExecution {
                decorator,
                start: false,
            } => {
                if let Some(started) = self.started.borrow_mut().remove(decorator) {
                    debug!(
                        decorator = decorator.as_str(),
                        elapsed_us = started.elapsed().as_micros() as u64,
                        "Decorator executed"
                    );
                }
            }
        }
    }
}
