//! # redb-backed Persistence
//!
//! A disk-backed implementation of the `Persistence` port on the redb
//! embedded database. Every call runs in its own ACID transaction.
//!
//! Records are encoded with postcard. Resources are keyed by effective key.
//! Snapshot, dependency and event identifiers are allocated from counters
//! in the metadata table and survive reopening the database.

use crate::ports::Persistence;
use crate::primitives::{
    NEXT_DEPENDENCY_KEY, NEXT_EVENT_KEY, NEXT_SNAPSHOT_KEY, SCHEMA_VERSION, SCHEMA_VERSION_KEY,
};
use crate::types::{
    Dependency, Event, Language, Measure, ProjectLink, Qualifier, Resource, SnapshotId,
    StratumError,
};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Table for snapshots: effective key -> serialized StoredSnapshot
const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Table for components: effective key -> serialized StoredComponent
const COMPONENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("components");

/// Table for measures: (effective key, metric key) -> serialized Measure
const MEASURES: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("measures");

/// Table for dependencies: dependency id -> serialized StoredDependency
const DEPENDENCIES: TableDefinition<u64, &[u8]> = TableDefinition::new("dependencies");

/// Table for links: (module key, link key) -> serialized ProjectLink
const LINKS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("links");

/// Table for events: event id -> serialized StoredEvent
const EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("events");

/// Table for sources: effective key -> source text
const SOURCES: TableDefinition<&str, &str> = TableDefinition::new("sources");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

// =============================================================================
// STORED RECORDS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSnapshot {
    id: SnapshotId,
    qualifier: Qualifier,
    parent: Option<String>,
}

/// A resource registered with the component graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredComponent {
    pub qualifier: Qualifier,
    pub name: Option<String>,
    pub language: Option<Language>,
    pub path: Option<String>,
    pub snapshot: Option<SnapshotId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDependency {
    dependency: Dependency,
    parent: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEvent {
    resource: String,
    event: Event,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub snapshots: u64,
    pub components: u64,
    pub measures: u64,
    pub dependencies: u64,
    pub links: u64,
    pub events: u64,
    pub sources: u64,
}

// =============================================================================
// HELPERS
// =============================================================================

fn io_err(e: impl std::fmt::Display) -> StratumError {
    StratumError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StratumError> {
    postcard::to_allocvec(value).map_err(|e| StratumError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StratumError> {
    postcard::from_bytes(bytes).map_err(|e| StratumError::SerializationError(e.to_string()))
}

/// Take the next value of a metadata counter.
fn allocate(txn: &WriteTransaction, counter: &str) -> Result<u64, StratumError> {
    let mut table = txn.open_table(METADATA).map_err(io_err)?;
    let next = table
        .get(counter)
        .map_err(io_err)?
        .map(|v| v.value())
        .unwrap_or(0);
    table
        .insert(counter, next.saturating_add(1))
        .map_err(io_err)?;
    Ok(next)
}

// =============================================================================
// REDB PERSISTENCE
// =============================================================================

/// Persistence on a redb database file.
pub struct RedbPersistence {
    db: Database,
}

impl std::fmt::Debug for RedbPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbPersistence").finish_non_exhaustive()
    }
}

impl RedbPersistence {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StratumError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(SNAPSHOTS).map_err(io_err)?;
            let _ = write_txn.open_table(COMPONENTS).map_err(io_err)?;
            let _ = write_txn.open_table(MEASURES).map_err(io_err)?;
            let _ = write_txn.open_table(DEPENDENCIES).map_err(io_err)?;
            let _ = write_txn.open_table(LINKS).map_err(io_err)?;
            let _ = write_txn.open_table(EVENTS).map_err(io_err)?;
            let _ = write_txn.open_table(SOURCES).map_err(io_err)?;
            {
                let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
                let version = meta
                    .get(SCHEMA_VERSION_KEY)
                    .map_err(io_err)?
                    .map(|v| v.value());
                match version {
                    None => {
                        meta.insert(SCHEMA_VERSION_KEY, SCHEMA_VERSION)
                            .map_err(io_err)?;
                    }
                    Some(found) if found != SCHEMA_VERSION => {
                        return Err(StratumError::Persistence(format!(
                            "unsupported schema version {} (expected {})",
                            found, SCHEMA_VERSION
                        )));
                    }
                    Some(_) => {}
                }
            }
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Run `f` in a write transaction and commit it.
    fn write<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> Result<T, StratumError>,
    ) -> Result<T, StratumError> {
        let txn = self.db.begin_write().map_err(io_err)?;
        let value = f(&txn)?;
        txn.commit().map_err(io_err)?;
        Ok(value)
    }

    fn snapshot_for(
        &self,
        resource: &Resource,
        parent: Option<&Resource>,
    ) -> Result<SnapshotId, StratumError> {
        let key = resource.effective_key_or_key();
        self.write(|txn| {
            let mut table = txn.open_table(SNAPSHOTS).map_err(io_err)?;
            let existing = match table.get(key).map_err(io_err)? {
                Some(bytes) => Some(decode::<StoredSnapshot>(bytes.value())?),
                None => None,
            };
            if let Some(stored) = existing {
                return Ok(stored.id);
            }
            let id = SnapshotId(allocate(txn, NEXT_SNAPSHOT_KEY)?);
            let stored = StoredSnapshot {
                id,
                qualifier: resource.qualifier,
                parent: parent.map(|p| p.effective_key_or_key().to_string()),
            };
            table.insert(key, encode(&stored)?.as_slice()).map_err(io_err)?;
            Ok(id)
        })
    }

    // =========================================================================
    // READ API
    // =========================================================================

    /// Snapshot saved for the resource with this effective key.
    pub fn snapshot(&self, effective_key: &str) -> Result<Option<SnapshotId>, StratumError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(SNAPSHOTS).map_err(io_err)?;
        match table.get(effective_key).map_err(io_err)? {
            Some(bytes) => Ok(Some(decode::<StoredSnapshot>(bytes.value())?.id)),
            None => Ok(None),
        }
    }

    /// Effective key of the parent the resource was saved under.
    pub fn snapshot_parent(&self, effective_key: &str) -> Result<Option<String>, StratumError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(SNAPSHOTS).map_err(io_err)?;
        match table.get(effective_key).map_err(io_err)? {
            Some(bytes) => Ok(decode::<StoredSnapshot>(bytes.value())?.parent),
            None => Ok(None),
        }
    }

    pub fn component(&self, effective_key: &str) -> Result<Option<StoredComponent>, StratumError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(COMPONENTS).map_err(io_err)?;
        match table.get(effective_key).map_err(io_err)? {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    /// Every registered component, ordered by effective key.
    pub fn components(&self) -> Result<Vec<(String, StoredComponent)>, StratumError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(COMPONENTS).map_err(io_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            out.push((key.value().to_string(), decode(value.value())?));
        }
        Ok(out)
    }

    /// Measures stored for the resource with this effective key,
    /// ordered by metric key.
    pub fn measures(&self, effective_key: &str) -> Result<Vec<Measure>, StratumError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(MEASURES).map_err(io_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let (resource, _metric) = key.value();
            if resource == effective_key {
                out.push(decode(value.value())?);
            }
        }
        Ok(out)
    }

    /// Stored dependencies with the id of their parent edge, by id.
    pub fn dependencies(&self) -> Result<Vec<(Dependency, Option<u64>)>, StratumError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(DEPENDENCIES).map_err(io_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            let stored: StoredDependency = decode(value.value())?;
            out.push((stored.dependency, stored.parent));
        }
        Ok(out)
    }

    pub fn links(&self, module_key: &str) -> Result<Vec<ProjectLink>, StratumError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(LINKS).map_err(io_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let (module, _) = key.value();
            if module == module_key {
                out.push(decode(value.value())?);
            }
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<StoreStats, StratumError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        Ok(StoreStats {
            snapshots: txn.open_table(SNAPSHOTS).map_err(io_err)?.len().map_err(io_err)?,
            components: txn.open_table(COMPONENTS).map_err(io_err)?.len().map_err(io_err)?,
            measures: txn.open_table(MEASURES).map_err(io_err)?.len().map_err(io_err)?,
            dependencies: txn
                .open_table(DEPENDENCIES)
                .map_err(io_err)?
                .len()
                .map_err(io_err)?,
            links: txn.open_table(LINKS).map_err(io_err)?.len().map_err(io_err)?,
            events: txn.open_table(EVENTS).map_err(io_err)?.len().map_err(io_err)?,
            sources: txn.open_table(SOURCES).map_err(io_err)?.len().map_err(io_err)?,
        })
    }
}

impl Persistence for RedbPersistence {
    fn save_project(
        &mut self,
        project: &Resource,
        parent: Option<&Resource>,
    ) -> Result<SnapshotId, StratumError> {
        self.snapshot_for(project, parent)
    }

    fn save_resource(
        &mut self,
        _module: Option<&Resource>,
        resource: &Resource,
        parent: Option<&Resource>,
    ) -> Result<Option<SnapshotId>, StratumError> {
        if !resource.is_persistable() {
            return Ok(None);
        }
        self.snapshot_for(resource, parent).map(Some)
    }

    fn register_component(
        &mut self,
        resource: &Resource,
        snapshot: Option<SnapshotId>,
    ) -> Result<(), StratumError> {
        let component = StoredComponent {
            qualifier: resource.qualifier,
            name: resource.name.clone(),
            language: resource.language.clone(),
            path: resource.path.clone(),
            snapshot,
        };
        let bytes = encode(&component)?;
        self.write(|txn| {
            let mut table = txn.open_table(COMPONENTS).map_err(io_err)?;
            table
                .insert(resource.effective_key_or_key(), bytes.as_slice())
                .map_err(io_err)?;
            Ok(())
        })
    }

    fn save_measure(&mut self, resource: &Resource, measure: &Measure) -> Result<(), StratumError> {
        let bytes = encode(measure)?;
        self.write(|txn| {
            let mut table = txn.open_table(MEASURES).map_err(io_err)?;
            table
                .insert(
                    (resource.effective_key_or_key(), measure.metric_key.as_str()),
                    bytes.as_slice(),
                )
                .map_err(io_err)?;
            Ok(())
        })
    }

    fn reload_measure(
        &self,
        resource: &Resource,
        measure: &Measure,
    ) -> Result<Measure, StratumError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(MEASURES).map_err(io_err)?;
        let key = (resource.effective_key_or_key(), measure.metric_key.as_str());
        match table.get(key).map_err(io_err)? {
            Some(bytes) => decode(bytes.value()),
            None => Ok(measure.clone()),
        }
    }

    fn save_dependency(
        &mut self,
        _module: Option<&Resource>,
        dependency: &Dependency,
        parent: Option<&Dependency>,
    ) -> Result<u64, StratumError> {
        let mut flat = dependency.clone();
        flat.parent = None;
        self.write(|txn| {
            let id = allocate(txn, NEXT_DEPENDENCY_KEY)?;
            flat.id = Some(id);
            let stored = StoredDependency {
                dependency: flat,
                parent: parent.and_then(|p| p.id),
            };
            let mut table = txn.open_table(DEPENDENCIES).map_err(io_err)?;
            table.insert(id, encode(&stored)?.as_slice()).map_err(io_err)?;
            Ok(id)
        })
    }

    fn save_link(&mut self, module: &Resource, link: &ProjectLink) -> Result<(), StratumError> {
        let bytes = encode(link)?;
        self.write(|txn| {
            let mut table = txn.open_table(LINKS).map_err(io_err)?;
            table
                .insert(
                    (module.effective_key_or_key(), link.key.as_str()),
                    bytes.as_slice(),
                )
                .map_err(io_err)?;
            Ok(())
        })
    }

    fn delete_link(&mut self, module: &Resource, key: &str) -> Result<(), StratumError> {
        self.write(|txn| {
            let mut table = txn.open_table(LINKS).map_err(io_err)?;
            table
                .remove((module.effective_key_or_key(), key))
                .map_err(io_err)?;
            Ok(())
        })
    }

    fn save_event(&mut self, resource: &Resource, event: &Event) -> Result<Event, StratumError> {
        self.write(|txn| {
            let id = allocate(txn, NEXT_EVENT_KEY)?;
            let mut saved = event.clone();
            saved.id = Some(id);
            let stored = StoredEvent {
                resource: resource.effective_key_or_key().to_string(),
                event: saved.clone(),
            };
            let mut table = txn.open_table(EVENTS).map_err(io_err)?;
            table.insert(id, encode(&stored)?.as_slice()).map_err(io_err)?;
            Ok(saved)
        })
    }

    fn events(&self, resource: &Resource) -> Result<Vec<Event>, StratumError> {
        let key = resource.effective_key_or_key();
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(EVENTS).map_err(io_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            let stored: StoredEvent = decode(value.value())?;
            if stored.resource == key {
                out.push(stored.event);
            }
        }
        Ok(out)
    }

    fn delete_event(&mut self, event: &Event) -> Result<(), StratumError> {
        let Some(id) = event.id else {
            return Ok(());
        };
        self.write(|txn| {
            let mut table = txn.open_table(EVENTS).map_err(io_err)?;
            table.remove(id).map_err(io_err)?;
            Ok(())
        })
    }

    fn set_source(&mut self, resource: &Resource, source: &str) -> Result<(), StratumError> {
        self.write(|txn| {
            let mut table = txn.open_table(SOURCES).map_err(io_err)?;
            table
                .insert(resource.effective_key_or_key(), source)
                .map_err(io_err)?;
            Ok(())
        })
    }

    fn source(&self, resource: &Resource) -> Result<Option<String>, StratumError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(SOURCES).map_err(io_err)?;
        Ok(table
            .get(resource.effective_key_or_key())
            .map_err(io_err)?
            .map(|v| v.value().to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn indexed(resource: Resource, key: &str) -> Resource {
        let mut resource = resource;
        resource.effective_key = Some(key.to_string());
        resource
    }

    #[test]
    fn snapshots_survive_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("stratum.redb");
        let project = indexed(Resource::project("p"), "p");
        let file = indexed(Resource::file("a.rs"), "p:a.rs");

        let (project_snapshot, file_snapshot) = {
            let mut store = RedbPersistence::open(&db_path).expect("open db");
            let p = store.save_project(&project, None).expect("save project");
            let f = store
                .save_resource(Some(&project), &file, Some(&project))
                .expect("save file")
                .expect("snapshot");
            (p, f)
        };
        assert_ne!(project_snapshot, file_snapshot);

        let mut store = RedbPersistence::open(&db_path).expect("reopen db");
        assert_eq!(store.snapshot("p:a.rs").expect("read"), Some(file_snapshot));
        assert_eq!(
            store.snapshot_parent("p:a.rs").expect("read").as_deref(),
            Some("p")
        );
        // saving again reuses the snapshot
        let again = store
            .save_resource(Some(&project), &file, Some(&project))
            .expect("save file");
        assert_eq!(again, Some(file_snapshot));
        // a new resource continues the counter
        let other = indexed(Resource::file("b.rs"), "p:b.rs");
        let next = store
            .save_resource(Some(&project), &other, Some(&project))
            .expect("save")
            .expect("snapshot");
        assert!(next > file_snapshot);
    }

    #[test]
    fn components_and_measures() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbPersistence::open(temp.path().join("s.redb")).expect("open db");
        let file = indexed(Resource::file("src/a.rs"), "p:src/a.rs");
        let snapshot = store.save_resource(None, &file, None).expect("save");
        store.register_component(&file, snapshot).expect("register");
        store
            .save_measure(&file, &Measure::new("lines", 12.0))
            .expect("measure");
        store
            .save_measure(&file, &Measure::new("lines", 14.0))
            .expect("measure");
        store
            .save_measure(&file, &Measure::data("authors", "ann,bob"))
            .expect("measure");

        let component = store.component("p:src/a.rs").expect("read").expect("component");
        assert_eq!(component.qualifier, Qualifier::File);
        assert_eq!(component.snapshot, snapshot);
        assert_eq!(store.components().expect("read").len(), 1);

        let measures = store.measures("p:src/a.rs").expect("read");
        assert_eq!(measures.len(), 2);
        let reloaded = store
            .reload_measure(&file, &Measure::new("lines", 0.0))
            .expect("reload");
        assert_eq!(reloaded.value, Some(14.0));
    }

    #[test]
    fn dependencies_keep_parent_ids() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbPersistence::open(temp.path().join("s.redb")).expect("open db");
        let mut parent = Dependency::new(
            indexed(Resource::directory("a"), "p:a"),
            indexed(Resource::directory("b"), "p:b"),
        );
        let parent_id = store.save_dependency(None, &parent, None).expect("save");
        parent.id = Some(parent_id);
        let child = Dependency::new(
            indexed(Resource::file("a/x.rs"), "p:a/x.rs"),
            indexed(Resource::file("b/y.rs"), "p:b/y.rs"),
        )
        .with_parent(parent.clone());
        let child_id = store
            .save_dependency(None, &child, Some(&parent))
            .expect("save");
        assert_ne!(parent_id, child_id);

        let stored = store.dependencies().expect("read");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].1, Some(parent_id));
        assert!(stored[1].0.parent.is_none());
    }

    #[test]
    fn links_events_and_sources() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbPersistence::open(temp.path().join("s.redb")).expect("open db");
        let project = indexed(Resource::project("p"), "p");
        let file = indexed(Resource::file("a.rs"), "p:a.rs");

        store
            .save_link(&project, &ProjectLink::new("ci", "CI", "https://ci.example"))
            .expect("link");
        assert_eq!(store.links("p").expect("read").len(), 1);
        store.delete_link(&project, "ci").expect("delete");
        assert!(store.links("p").expect("read").is_empty());

        let event = store
            .save_event(&project, &Event::new("1.0", 42).with_category("Version"))
            .expect("event");
        assert_eq!(store.events(&project).expect("read"), vec![event.clone()]);
        store.delete_event(&event).expect("delete");
        assert!(store.events(&project).expect("read").is_empty());

        store.set_source(&file, "fn main() {}").expect("source");
        assert_eq!(
            store.source(&file).expect("read").as_deref(),
            Some("fn main() {}")
        );

        let stats = store.stats().expect("stats");
        assert_eq!(stats.sources, 1);
        assert_eq!(stats.events, 0);
    }
}
