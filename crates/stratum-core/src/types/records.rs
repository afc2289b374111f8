//! Dependencies, violations, events and links.

use super::Resource;
use serde::{Deserialize, Serialize};

// =============================================================================
// DEPENDENCY
// =============================================================================

/// A directed dependency between two resources.
///
/// `parent` links a fine-grained dependency (file to file) to the coarser one
/// it contributes to (directory to directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Durable identity, assigned when the edge is persisted.
    #[serde(default)]
    pub id: Option<u64>,
    pub from: Resource,
    pub to: Resource,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub parent: Option<Box<Dependency>>,
}

const fn default_weight() -> u32 {
    1
}

impl Dependency {
    #[must_use]
    pub fn new(from: Resource, to: Resource) -> Self {
        Self {
            id: None,
            from,
            to,
            usage: None,
            weight: default_weight(),
            parent: None,
        }
    }

    #[must_use]
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: Dependency) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }
}

// =============================================================================
// RULES & VIOLATIONS
// =============================================================================

/// A coding rule, identified by repository and key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub repository: String,
    pub key: String,
}

impl Rule {
    #[must_use]
    pub fn new(repository: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
    Blocker,
}

/// A rule violation reported on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Target resource; `None` means the current module.
    #[serde(default)]
    pub resource: Option<Resource>,
    #[serde(default)]
    pub rule: Option<Rule>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub line: Option<u32>,
    /// Cleared by the index; the issue sink assigns it from rule settings.
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub switched_off: bool,
}

impl Violation {
    #[must_use]
    pub fn new(rule: Rule, message: impl Into<String>) -> Self {
        Self {
            resource: None,
            rule: Some(rule),
            message: message.into(),
            line: None,
            severity: None,
            switched_off: false,
        }
    }

    #[must_use]
    pub fn on(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    #[must_use]
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// Which violations to return, by their switched-off state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SwitchMode {
    /// Active violations only.
    #[default]
    On,
    /// Switched-off violations only.
    Off,
    Both,
}

impl SwitchMode {
    #[must_use]
    pub fn accepts(self, violation: &Violation) -> bool {
        match self {
            SwitchMode::On => !violation.switched_off,
            SwitchMode::Off => violation.switched_off,
            SwitchMode::Both => true,
        }
    }
}

// =============================================================================
// EVENTS & LINKS
// =============================================================================

/// A dated annotation on a resource (version, alert, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Assigned by persistence.
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub date: u64,
}

impl Event {
    #[must_use]
    pub fn new(name: impl Into<String>, date: u64) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            category: None,
            date,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A named link attached to a module (homepage, CI, SCM, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectLink {
    pub key: String,
    pub name: String,
    pub href: String,
}

impl ProjectLink {
    #[must_use]
    pub fn new(key: impl Into<String>, name: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            href: href.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_modes() {
        let mut violation = Violation::new(Rule::new("squid", "S100"), "bad name");
        assert!(SwitchMode::On.accepts(&violation));
        assert!(!SwitchMode::Off.accepts(&violation));
        violation.switched_off = true;
        assert!(!SwitchMode::On.accepts(&violation));
        assert!(SwitchMode::Off.accepts(&violation));
        assert!(SwitchMode::Both.accepts(&violation));
    }

    #[test]
    fn dependency_defaults() {
        let dep = Dependency::new(Resource::file("a"), Resource::file("b"));
        assert_eq!(dep.weight, 1);
        assert!(dep.id.is_none());
        assert!(dep.parent.is_none());
    }
}
