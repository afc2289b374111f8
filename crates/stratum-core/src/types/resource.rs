//! Resources, scopes and qualifiers.

use crate::keys;
use crate::primitives::MULTI_LANGUAGE_KEY;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// SCOPE
// =============================================================================

/// Granularity level of a resource, coarsest first.
///
/// The declaration order is the containment order: a `Project` contains
/// directories, a `Directory` contains files, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Projects, modules and libraries.
    Project,
    /// Directories and packages.
    Directory,
    /// Source and test files.
    File,
    /// Classes and other program units below file level.
    ProgramUnit,
    /// Methods, functions and blocks.
    BlockUnit,
}

impl Scope {
    /// Short code used in keys and logs.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Scope::Project => "PRJ",
            Scope::Directory => "DIR",
            Scope::File => "FIL",
            Scope::ProgramUnit => "PGU",
            Scope::BlockUnit => "BLU",
        }
    }

    /// True when `self` is as coarse as `other` or coarser.
    #[must_use]
    pub fn is_higher_than_or_equals(self, other: Scope) -> bool {
        self <= other
    }
}

// =============================================================================
// QUALIFIER
// =============================================================================

/// The kind of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    /// Root project of an analysis.
    Project,
    /// Sub-module of a project.
    Module,
    Directory,
    File,
    UnitTestFile,
    /// External library. Libraries have no parent in the containment tree.
    Library,
    Class,
    Method,
}

impl Qualifier {
    /// The scope this qualifier lives at.
    #[must_use]
    pub const fn scope(self) -> Scope {
        match self {
            Qualifier::Project | Qualifier::Module | Qualifier::Library => Scope::Project,
            Qualifier::Directory => Scope::Directory,
            Qualifier::File | Qualifier::UnitTestFile => Scope::File,
            Qualifier::Class => Scope::ProgramUnit,
            Qualifier::Method => Scope::BlockUnit,
        }
    }

    /// Short code used in keys and logs.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Qualifier::Project => "TRK",
            Qualifier::Module => "BRC",
            Qualifier::Directory => "DIR",
            Qualifier::File => "FIL",
            Qualifier::UnitTestFile => "UTS",
            Qualifier::Library => "LIB",
            Qualifier::Class => "CLA",
            Qualifier::Method => "MET",
        }
    }
}

// =============================================================================
// LANGUAGE
// =============================================================================

/// A programming language key, e.g. `java` or `py`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(pub String);

impl Language {
    /// Create a new language from its key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The synthetic language carried by resources that mix languages.
    #[must_use]
    pub fn multi() -> Self {
        Self(MULTI_LANGUAGE_KEY.to_string())
    }

    /// Get the language key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the synthetic multi-language marker.
    #[must_use]
    pub fn is_multi_language(&self) -> bool {
        self.0 == MULTI_LANGUAGE_KEY
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// RESOURCE KEY (IDENTITY)
// =============================================================================

/// Identity of a resource inside one analysis: its qualifier and key.
///
/// Two resources with the same identity share a single bucket in the index,
/// whatever their other attributes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub qualifier: Qualifier,
    pub key: String,
}

// =============================================================================
// RESOURCE
// =============================================================================

/// Any analyzable unit: project, module, directory, file, library, ...
///
/// `parent` is the parent the caller *declares*; the index resolves it to a
/// bucket handle and does not keep the box on the stored resource.
/// `effective_key` is computed by the index when the resource is indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub key: String,
    pub qualifier: Qualifier,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub parent: Option<Box<Resource>>,
    #[serde(default)]
    pub effective_key: Option<String>,
}

impl Resource {
    /// Create a resource with the given qualifier and key.
    #[must_use]
    pub fn new(qualifier: Qualifier, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            qualifier,
            name: None,
            language: None,
            path: None,
            parent: None,
            effective_key: None,
        }
    }

    #[must_use]
    pub fn project(key: impl Into<String>) -> Self {
        Self::new(Qualifier::Project, key)
    }

    #[must_use]
    pub fn module(key: impl Into<String>) -> Self {
        Self::new(Qualifier::Module, key)
    }

    /// Create a directory. The key is normalized (see [`keys::parse_directory_key`]).
    #[must_use]
    pub fn directory(key: &str) -> Self {
        let key = keys::parse_directory_key(key);
        let mut resource = Self::new(Qualifier::Directory, key.clone());
        resource.path = Some(key);
        resource
    }

    #[must_use]
    pub fn file(key: impl Into<String>) -> Self {
        let key = key.into();
        let mut resource = Self::new(Qualifier::File, key.clone());
        resource.path = Some(key);
        resource
    }

    #[must_use]
    pub fn unit_test_file(key: impl Into<String>) -> Self {
        let key = key.into();
        let mut resource = Self::new(Qualifier::UnitTestFile, key.clone());
        resource.path = Some(key);
        resource
    }

    #[must_use]
    pub fn library(key: impl Into<String>) -> Self {
        Self::new(Qualifier::Library, key)
    }

    #[must_use]
    pub fn class(key: impl Into<String>) -> Self {
        Self::new(Qualifier::Class, key)
    }

    #[must_use]
    pub fn method(key: impl Into<String>) -> Self {
        Self::new(Qualifier::Method, key)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Declare the parent of this resource.
    #[must_use]
    pub fn with_parent(mut self, parent: Resource) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// The identity used by the index.
    #[must_use]
    pub fn identity(&self) -> ResourceKey {
        ResourceKey {
            qualifier: self.qualifier,
            key: self.key.clone(),
        }
    }

    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.qualifier.scope()
    }

    #[must_use]
    pub fn is_library(&self) -> bool {
        self.qualifier == Qualifier::Library
    }

    /// True for projects and modules.
    #[must_use]
    pub fn is_module(&self) -> bool {
        matches!(self.qualifier, Qualifier::Project | Qualifier::Module)
    }

    /// True for project-scope resources (projects, modules, libraries).
    /// These are the resources that survive a module boundary.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.scope() == Scope::Project
    }

    /// True for resources that get a durable component (file scope or coarser).
    #[must_use]
    pub fn is_persistable(&self) -> bool {
        self.scope().is_higher_than_or_equals(Scope::File)
    }

    #[must_use]
    pub fn is_directory_or_file(&self) -> bool {
        matches!(self.scope(), Scope::Directory | Scope::File)
    }

    /// The effective key when computed, the plain key otherwise.
    #[must_use]
    pub fn effective_key_or_key(&self) -> &str {
        self.effective_key.as_deref().unwrap_or(&self.key)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.qualifier.code(), self.effective_key_or_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_ordering_is_containment_order() {
        assert!(Scope::Project.is_higher_than_or_equals(Scope::File));
        assert!(Scope::File.is_higher_than_or_equals(Scope::File));
        assert!(!Scope::ProgramUnit.is_higher_than_or_equals(Scope::File));
    }

    #[test]
    fn qualifiers_map_to_scopes() {
        assert_eq!(Resource::library("g:a").scope(), Scope::Project);
        assert_eq!(Resource::unit_test_file("t.rs").scope(), Scope::File);
        assert_eq!(Resource::method("f").scope(), Scope::BlockUnit);
        assert!(Resource::library("g:a").is_set());
        assert!(!Resource::library("g:a").is_module());
        assert!(!Resource::class("Foo").is_persistable());
    }

    #[test]
    fn directory_key_is_normalized() {
        let dir = Resource::directory("\\src\\main\\");
        assert_eq!(dir.key, "src/main");
        assert_eq!(dir.path.as_deref(), Some("src/main"));
    }

    #[test]
    fn identity_ignores_language() {
        let a = Resource::file("a.rs").with_language(Language::new("rust"));
        let b = Resource::file("a.rs");
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), Resource::directory("a.rs").identity());
    }

    #[test]
    fn display_prefers_effective_key() {
        let mut file = Resource::file("a.rs");
        assert_eq!(file.to_string(), "FIL[a.rs]");
        file.effective_key = Some("p:a.rs".to_string());
        assert_eq!(file.to_string(), "FIL[p:a.rs]");
    }
}
