//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::ProjectConfig;
use crate::report::{ReportScanner, ScanReport};
use std::path::{Path, PathBuf};
use stratum_core::{
    CreationLock, EventBus, MemoryPersistence, ModuleBatch, ModuleReport, Persistence,
    RedbPersistence, ScanIndex, StratumError, TracingEventHandler,
};

/// Validate an input path: it must resolve to a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, StratumError> {
    let canonical = path.canonicalize().map_err(|e| {
        StratumError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(StratumError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Open the store, which must already exist.
fn open_existing(db_path: &Path) -> Result<RedbPersistence, StratumError> {
    if !db_path.exists() {
        return Err(StratumError::IoError(format!(
            "No store at '{}'. Run `stratum init` first.",
            db_path.display()
        )));
    }
    RedbPersistence::open(db_path)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), StratumError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| StratumError::SerializationError(format!("JSON output: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

// =============================================================================
// ANALYZE COMMAND
// =============================================================================

/// Run the batch over every module of the descriptor.
pub fn cmd_analyze(
    db_path: &Path,
    json_mode: bool,
    verbose: bool,
    config_path: &Path,
    report_path: &Path,
    dry_run: bool,
) -> Result<(), StratumError> {
    let config = ProjectConfig::load(&validate_file_path(config_path)?)?;
    let report = ScanReport::load(&validate_file_path(report_path)?)?;

    tracing::info!(
        "Analyzing {} ({} modules reported, dry run: {})",
        config.project.key,
        report.modules.len(),
        dry_run
    );

    let persistence: Box<dyn Persistence> = if dry_run {
        Box::new(MemoryPersistence::new())
    } else {
        Box::new(RedbPersistence::open(db_path)?)
    };
    let mut index = ScanIndex::new(
        persistence,
        Box::new(config.metric_registry()),
        CreationLock::new(config.fail_when_locked),
    );

    let root = config.module_definition();
    let decorators = config.decorators();
    let events = EventBus::new().with(TracingEventHandler::new());
    let mut scanner = ReportScanner::new(report);
    let reports = ModuleBatch::new(&decorators, &events).run(&mut index, &root, &mut scanner)?;

    if json_mode {
        print_json(&serde_json::json!({
            "project": config.project.key,
            "database": if dry_run { None } else { Some(db_path.to_string_lossy()) },
            "modules": reports,
        }))?;
        return Ok(());
    }

    println!("Stratum Analysis");
    println!("================");
    println!("Project:  {}", config.project.key);
    if dry_run {
        println!("Store:    (dry run, nothing written)");
    } else {
        println!("Store:    {}", db_path.display());
    }
    println!("Modules:  {}", reports.len());
    println!();
    if verbose {
        print_module_table(&reports);
    }
    let total: usize = reports.iter().map(|r| r.measures).sum();
    println!("Measures: {}", total);

    Ok(())
}

fn print_module_table(reports: &[ModuleReport]) {
    println!(
        "{:<32} {:>9} {:>8} {:>8} {:>12} {:>10}",
        "MODULE", "RESOURCES", "EXCLUDED", "MEASURES", "DEPENDENCIES", "VIOLATIONS"
    );
    for report in reports {
        println!(
            "{:<32} {:>9} {:>8} {:>8} {:>12} {:>10}",
            report.module,
            report.resources,
            report.excluded,
            report.measures,
            report.dependencies,
            report.violations
        );
    }
    println!();
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Show what the store holds for one effective key.
pub fn cmd_show(db_path: &Path, json_mode: bool, key: &str) -> Result<(), StratumError> {
    let store = open_existing(db_path)?;
    let snapshot = store.snapshot(key)?;
    let parent = store.snapshot_parent(key)?;
    let component = store.component(key)?;
    let measures = store.measures(key)?;

    if snapshot.is_none() && component.is_none() {
        return Err(StratumError::ResourceNotIndexed(key.to_string()));
    }

    if json_mode {
        print_json(&serde_json::json!({
            "key": key,
            "snapshot": snapshot.map(|s| s.0),
            "parent": parent,
            "component": component,
            "measures": measures,
        }))?;
        return Ok(());
    }

    println!("Resource: {}", key);
    if let Some(snapshot) = snapshot {
        println!("Snapshot: {}", snapshot.0);
    }
    if let Some(parent) = &parent {
        println!("Parent:   {}", parent);
    }
    if let Some(component) = &component {
        println!("Kind:     {:?}", component.qualifier);
        if let Some(language) = &component.language {
            println!("Language: {}", language);
        }
        if let Some(path) = &component.path {
            println!("Path:     {}", path);
        }
    }
    if !measures.is_empty() {
        println!();
        println!("Measures:");
        for measure in &measures {
            match (&measure.value, &measure.data) {
                (Some(value), _) => println!("  {:<24} {}", measure.metric_key, value),
                (None, Some(data)) => println!("  {:<24} {}", measure.metric_key, data),
                (None, None) => println!("  {:<24} -", measure.metric_key),
            }
        }
    }

    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store statistics.
pub fn cmd_status(db_path: &Path, json_mode: bool) -> Result<(), StratumError> {
    let store = open_existing(db_path)?;
    let stats = store.stats()?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": db_path.to_string_lossy(),
            "stats": stats,
        }))?;
        return Ok(());
    }

    println!("Stratum Store Status");
    println!("====================");
    println!("Database:     {}", db_path.display());
    println!();
    println!("Snapshots:    {}", stats.snapshots);
    println!("Components:   {}", stats.components);
    println!("Measures:     {}", stats.measures);
    println!("Dependencies: {}", stats.dependencies);
    println!("Links:        {}", stats.links);
    println!("Events:       {}", stats.events);
    println!("Sources:      {}", stats.sources);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty store.
pub fn cmd_init(db_path: &Path, force: bool) -> Result<(), StratumError> {
    if db_path.exists() {
        if !force {
            return Err(StratumError::IoError(
                "Store already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| StratumError::IoError(format!("Remove store: {}", e)))?;
    }

    let _store = RedbPersistence::open(db_path)?;
    println!("Initialized new store at {}", db_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"
[project]
key = "p"

[[metrics]]
key = "ncloc"

[[aggregate]]
metric = "ncloc"
"#;

    const REPORT: &str = r#"{
  "modules": {
    "p": {
      "measures": [
        { "resource": { "qualifier": "file", "key": "src/a.rs",
                        "parent": { "qualifier": "directory", "key": "src" } },
          "measure": { "metric_key": "ncloc", "value": 7 } }
      ]
    }
  }
}"#;

    #[test]
    fn unserializable_output_is_an_error() {
        let keyed_by_pair = std::collections::BTreeMap::from([((1u8, 2u8), 3u8)]);
        assert!(matches!(
            print_json(&keyed_by_pair),
            Err(StratumError::SerializationError(_))
        ));
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("stratum.redb");

        cmd_init(&db, false).expect("init");
        assert!(db.exists());
        assert!(cmd_init(&db, false).is_err());
        cmd_init(&db, true).expect("forced init");
    }

    #[test]
    fn status_needs_an_existing_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(cmd_status(&dir.path().join("missing.redb"), false).is_err());
    }

    #[test]
    fn analyze_writes_aggregates_to_the_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("stratum.redb");
        let config = dir.path().join("stratum.toml");
        let report = dir.path().join("scan.json");
        std::fs::write(&config, DESCRIPTOR).expect("write config");
        std::fs::write(&report, REPORT).expect("write report");

        cmd_analyze(&db, true, false, &config, &report, false).expect("analyze");

        let store = RedbPersistence::open(&db).expect("open");
        let ncloc = |key: &str| {
            store
                .measures(key)
                .expect("measures")
                .into_iter()
                .find(|m| m.metric_key == "ncloc")
                .and_then(|m| m.value)
        };
        assert_eq!(ncloc("p:src/a.rs"), Some(7.0));
        assert_eq!(ncloc("p:src"), Some(7.0));
        assert_eq!(ncloc("p"), Some(7.0));
        drop(store);
        cmd_show(&db, false, "p:src").expect("show");
    }

    #[test]
    fn dry_run_leaves_no_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("stratum.redb");
        let config = dir.path().join("stratum.toml");
        let report = dir.path().join("scan.json");
        std::fs::write(&config, DESCRIPTOR).expect("write config");
        std::fs::write(&report, REPORT).expect("write report");

        cmd_analyze(&db, false, true, &config, &report, true).expect("analyze");
        assert!(!db.exists());
    }
}
