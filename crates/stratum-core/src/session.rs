//! # Module Session
//!
//! Explicit per-module state: which module is analyzed, which languages it
//! declares, and which language is active while a decorator runs.
//!
//! Nothing here is global. The batch driver owns the definitions, the
//! executor derives a `ModuleView` for every decorator call.

use crate::types::{Language, Resource};

// =============================================================================
// MODULE LANGUAGES
// =============================================================================

/// Languages declared by a module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleLanguages {
    languages: Vec<Language>,
    multi_language: bool,
}

impl ModuleLanguages {
    /// A module analyzed in exactly one language.
    #[must_use]
    pub fn single(language: Language) -> Self {
        Self {
            languages: vec![language],
            multi_language: false,
        }
    }

    /// A module mixing several languages, in declaration order.
    #[must_use]
    pub fn multi(languages: Vec<Language>) -> Self {
        Self {
            languages,
            multi_language: true,
        }
    }

    #[must_use]
    pub fn is_multi_language(&self) -> bool {
        self.multi_language
    }

    /// Declared languages, in order.
    #[must_use]
    pub fn keys(&self) -> &[Language] {
        &self.languages
    }

    /// The language a single-language module is analyzed in.
    #[must_use]
    pub fn original(&self) -> Option<&Language> {
        if self.multi_language {
            None
        } else {
            self.languages.first()
        }
    }
}

// =============================================================================
// MODULE DEFINITION
// =============================================================================

/// A module of the analyzed project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDefinition {
    pub resource: Resource,
    pub languages: ModuleLanguages,
    /// Glob patterns of excluded directories and files.
    pub exclusions: Vec<String>,
    pub modules: Vec<ModuleDefinition>,
}

impl ModuleDefinition {
    #[must_use]
    pub fn new(resource: Resource, languages: ModuleLanguages) -> Self {
        Self {
            resource,
            languages,
            exclusions: Vec::new(),
            modules: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_module(mut self, module: ModuleDefinition) -> Self {
        self.modules.push(module);
        self
    }

    #[must_use]
    pub fn with_exclusions(mut self, exclusions: Vec<String>) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// This module and all its descendants, children before parents.
    #[must_use]
    pub fn post_order(&self) -> Vec<&ModuleDefinition> {
        let mut out = Vec::new();
        self.collect_post_order(&mut out);
        out
    }

    fn collect_post_order<'a>(&'a self, out: &mut Vec<&'a ModuleDefinition>) {
        for module in &self.modules {
            module.collect_post_order(out);
        }
        out.push(self);
    }

    /// View of this module with `active_language` activated.
    #[must_use]
    pub fn view<'a>(&'a self, active_language: Option<&'a Language>) -> ModuleView<'a> {
        ModuleView {
            module: &self.resource,
            languages: &self.languages,
            active_language,
        }
    }
}

// =============================================================================
// MODULE VIEW
// =============================================================================

/// What a decorator sees of the module it runs on.
#[derive(Debug, Clone, Copy)]
pub struct ModuleView<'a> {
    module: &'a Resource,
    languages: &'a ModuleLanguages,
    active_language: Option<&'a Language>,
}

impl<'a> ModuleView<'a> {
    #[must_use]
    pub fn module(&self) -> &'a Resource {
        self.module
    }

    #[must_use]
    pub fn languages(&self) -> &'a ModuleLanguages {
        self.languages
    }

    /// The language currently activated for decoration.
    #[must_use]
    pub fn active_language(&self) -> Option<&'a Language> {
        self.active_language
    }

    #[must_use]
    pub fn is_multi_language(&self) -> bool {
        self.languages.is_multi_language()
    }
}
