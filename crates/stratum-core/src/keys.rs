//! # Keys
//!
//! Effective keys and directory key normalization.

use crate::primitives::{DIRECTORY_SEPARATOR, EFFECTIVE_KEY_SEPARATOR, ROOT_DIRECTORY_KEY};
use crate::types::Resource;

/// Compute the effective key of `resource` inside `module`.
///
/// Project-scope resources keep their own key. Everything else is
/// namespaced by the module: `"<module key>:<resource key>"`.
#[must_use]
pub fn effective_key(module: Option<&Resource>, resource: &Resource) -> String {
    match module {
        Some(module) if !resource.is_set() => {
            let mut key = String::with_capacity(module.key.len() + 1 + resource.key.len());
            key.push_str(&module.key);
            key.push(EFFECTIVE_KEY_SEPARATOR);
            key.push_str(&resource.key);
            key
        }
        _ => resource.key.clone(),
    }
}

/// Normalize a directory key.
///
/// Backslashes become forward slashes, leading and trailing whitespace and
/// separators are removed, and a blank key becomes [`ROOT_DIRECTORY_KEY`].
#[must_use]
pub fn parse_directory_key(key: &str) -> String {
    if key.trim().is_empty() {
        return ROOT_DIRECTORY_KEY.to_string();
    }
    let normalized = key.replace('\\', "/");
    let trimmed =
        normalized.trim_matches(|c: char| c == DIRECTORY_SEPARATOR || c.is_whitespace());
    if trimmed.is_empty() {
        ROOT_DIRECTORY_KEY.to_string()
    } else {
        trimmed.to_string()
    }
}
