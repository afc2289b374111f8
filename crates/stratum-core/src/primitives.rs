//! # Primitives
//!
//! Fixed constants of the Stratum engine.
//!
//! These are compiled into the binary and are immutable at runtime.

/// Language key carried by resources that mix several languages.
///
/// A decorator running over such a resource in a multi-language module is
/// offered each module language in turn.
pub const MULTI_LANGUAGE_KEY: &str = "multi";

/// Key of the root directory once a blank directory key is normalized.
pub const ROOT_DIRECTORY_KEY: &str = "[root]";

/// Separator used when normalizing directory keys.
pub const DIRECTORY_SEPARATOR: char = '/';

/// Separator between the module key and the resource key in an effective key.
pub const EFFECTIVE_KEY_SEPARATOR: char = ':';

// =============================================================================
// STORAGE
// =============================================================================

/// Current on-disk schema version of the redb store.
///
/// Increment this when making breaking changes to the stored records.
pub const SCHEMA_VERSION: u64 = 1;

/// Metadata key holding the schema version.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Metadata key holding the next snapshot identifier.
pub const NEXT_SNAPSHOT_KEY: &str = "next_snapshot_id";

/// Metadata key holding the next dependency identifier.
pub const NEXT_DEPENDENCY_KEY: &str = "next_dependency_id";

/// Metadata key holding the next event identifier.
pub const NEXT_EVENT_KEY: &str = "next_event_id";
