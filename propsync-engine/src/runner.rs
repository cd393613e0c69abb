//! Bounded-concurrency run orchestration.
//!
//! A run dispatches one unit of work per resource (update, delete) or per
//! legacy file (migrate) onto a fixed-size pool of scoped worker threads.
//! Each worker completes a unit's whole pipeline — inspect → load →
//! reconcile/migrate → persist — before pulling the next one off a shared
//! cursor. Units touch disjoint paths, so there is no cross-unit locking;
//! outcomes flow back over an mpsc channel and are aggregated after every
//! unit has run. A failing unit is recorded and never aborts the run.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use propsync_core::store;
use propsync_core::types::{DocumentFile, ResourceDescriptor, ResourceName};

use crate::error::EngineError;
use crate::inspect::ColumnInspector;
use crate::migrate;
use crate::reconcile::{reconcile, Action};

// ---------------------------------------------------------------------------
// Config and report
// ---------------------------------------------------------------------------

/// Per-invocation run configuration. No process-wide state is consulted.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Maximum number of in-flight units. `None` means one worker per unit.
    pub threads: Option<NonZeroUsize>,
}

impl RunConfig {
    pub fn with_threads(threads: Option<NonZeroUsize>) -> Self {
        Self { threads }
    }
}

/// Aggregated outcome of a run, sorted by resource name.
#[derive(Debug)]
pub struct RunReport {
    pub succeeded: Vec<(ResourceName, Action)>,
    pub failed: Vec<(ResourceName, EngineError)>,
}

impl RunReport {
    /// True when every resource completed without error.
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of resources whose action actually changed the filesystem.
    pub fn changed_count(&self) -> usize {
        self.succeeded
            .iter()
            .filter(|(_, action)| !matches!(action, Action::Unchanged))
            .count()
    }

    fn from_outcomes(outcomes: Vec<Outcome>) -> Self {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (name, result) in outcomes {
            match result {
                Ok(action) => succeeded.push((name, action)),
                Err(err) => failed.push((name, err)),
            }
        }
        succeeded.sort_by(|a, b| a.0.cmp(&b.0));
        failed.sort_by(|a, b| a.0.cmp(&b.0));
        Self { succeeded, failed }
    }
}

type Outcome = (ResourceName, Result<Action, EngineError>);

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

/// Run `worker` over `units` on a pool of at most `config.threads` threads.
///
/// Workers pull unit indices off a shared atomic cursor, so a slow unit never
/// holds up the rest of the pool. The returned outcomes are unordered.
fn run_units<U, F>(units: &[U], config: &RunConfig, worker: F) -> Vec<Outcome>
where
    U: Sync,
    F: Fn(&U) -> Vec<Outcome> + Sync,
{
    if units.is_empty() {
        return Vec::new();
    }
    let worker_count = config
        .threads
        .map(NonZeroUsize::get)
        .unwrap_or(units.len())
        .min(units.len());

    let cursor = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<Outcome>();
    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let tx = tx.clone();
            let cursor = &cursor;
            let worker = &worker;
            scope.spawn(move || loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(unit) = units.get(index) else { break };
                for outcome in worker(unit) {
                    if tx.send(outcome).is_err() {
                        return;
                    }
                }
            });
        }
        drop(tx);
        rx.into_iter().collect()
    })
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Create or update the property document of every resource.
///
/// Pipeline per resource: inspect columns → load existing document →
/// reconcile → save unless unchanged.
pub fn update_all(
    inspector: &dyn ColumnInspector,
    resources: &[ResourceDescriptor],
    config: &RunConfig,
) -> RunReport {
    let outcomes = run_units(resources, config, |resource| {
        vec![update_unit(inspector, resource)]
    });
    RunReport::from_outcomes(outcomes)
}

fn update_unit(inspector: &dyn ColumnInspector, resource: &ResourceDescriptor) -> Outcome {
    let path = resource.property_path();
    let result = (|| {
        let columns = inspector.columns(resource)?;
        let existing = store::load(&path)?;
        let (document, action) = reconcile(resource, &columns, existing)?;
        if !matches!(action, Action::Unchanged) {
            store::save(&path, &document)?;
        }
        Ok(action)
    })();
    match &result {
        Ok(action) => tracing::info!("{}: {} ({})", resource.name, action.label(), path.display()),
        Err(err) => tracing::error!("{}: {err}", resource.name),
    }
    (resource.name.clone(), result)
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// Remove the property document of every resource. Deleting a resource with
/// no document is a no-op reported as [`Action::Unchanged`].
pub fn delete_all(resources: &[ResourceDescriptor], config: &RunConfig) -> RunReport {
    let outcomes = run_units(resources, config, |resource| {
        let path = resource.property_path();
        let result = match store::delete(&path) {
            Ok(true) => {
                tracing::info!("{}: deleted ({})", resource.name, path.display());
                Ok(Action::Deleted)
            }
            Ok(false) => Ok(Action::Unchanged),
            Err(err) => Err(err.into()),
        };
        vec![(resource.name.clone(), result)]
    });
    RunReport::from_outcomes(outcomes)
}

// ---------------------------------------------------------------------------
// Migrate
// ---------------------------------------------------------------------------

/// One legacy file and the selected resources documented in it. The group is
/// a single unit of work: extractions against the same file must not run in
/// parallel with each other.
struct MigrateGroup {
    legacy_path: PathBuf,
    targets: Vec<ResourceDescriptor>,
}

/// Split legacy multi-resource documents into one document per resource.
///
/// Resources whose document already lives at the canonical per-resource path
/// (or that have no document at all) report [`Action::Unchanged`]. The legacy
/// file is rewritten with the remaining entries, or deleted outright when
/// only the format marker would remain.
pub fn migrate_all(resources: &[ResourceDescriptor], config: &RunConfig) -> RunReport {
    let mut in_place: Vec<Outcome> = Vec::new();
    let mut by_legacy: BTreeMap<PathBuf, Vec<ResourceDescriptor>> = BTreeMap::new();
    for resource in resources {
        match &resource.patch_path {
            Some(patch) if *patch != resource.property_path() => {
                by_legacy
                    .entry(patch.clone())
                    .or_default()
                    .push(resource.clone());
            }
            _ => in_place.push((resource.name.clone(), Ok(Action::Unchanged))),
        }
    }

    let groups: Vec<MigrateGroup> = by_legacy
        .into_iter()
        .map(|(legacy_path, targets)| MigrateGroup {
            legacy_path,
            targets,
        })
        .collect();

    let mut outcomes = run_units(&groups, config, migrate_group);
    outcomes.append(&mut in_place);
    RunReport::from_outcomes(outcomes)
}

fn migrate_group(group: &MigrateGroup) -> Vec<Outcome> {
    let mut residual = match store::load(&group.legacy_path) {
        Ok(Some(document)) => document,
        Ok(None) => {
            return group
                .targets
                .iter()
                .map(|resource| {
                    (
                        resource.name.clone(),
                        Err(EngineError::MissingDocument {
                            path: group.legacy_path.clone(),
                        }),
                    )
                })
                .collect();
        }
        Err(err) => {
            let message = err.to_string();
            return group
                .targets
                .iter()
                .map(|resource| {
                    (
                        resource.name.clone(),
                        Err(EngineError::Legacy {
                            path: group.legacy_path.clone(),
                            message: message.clone(),
                        }),
                    )
                })
                .collect();
        }
    };

    let mut outcomes: Vec<Outcome> = Vec::new();
    let mut extracted: Vec<(PathBuf, DocumentFile, ResourceName)> = Vec::new();
    for resource in &group.targets {
        match migrate::extract(
            residual.clone(),
            resource.kind,
            &resource.name,
            &group.legacy_path,
        ) {
            Ok((document, rest)) => {
                extracted.push((resource.property_path(), document, resource.name.clone()));
                residual = rest;
            }
            Err(err) => {
                tracing::error!("{}: {err}", resource.name);
                outcomes.push((resource.name.clone(), Err(err)));
            }
        }
    }

    // Nothing was extracted: leave the legacy file untouched.
    if extracted.is_empty() {
        return outcomes;
    }

    for (path, document, name) in extracted {
        match store::save(&path, &document) {
            Ok(()) => {
                tracing::info!("{name}: migrated ({})", path.display());
                outcomes.push((name, Ok(Action::Migrated)));
            }
            Err(err) => outcomes.push((name, Err(err.into()))),
        }
    }

    let persisted = if residual.is_empty_shell() {
        tracing::info!("removing emptied legacy document {}", group.legacy_path.display());
        store::delete(&group.legacy_path).map(|_| ())
    } else {
        store::save(&group.legacy_path, &residual)
    };
    if let Err(err) = persisted {
        // The extracted documents are on disk but the legacy file still
        // holds their entries; fail the whole group so the duplication is
        // surfaced.
        let message = err.to_string();
        outcomes = outcomes
            .into_iter()
            .map(|(name, result)| match result {
                Ok(Action::Migrated) => (
                    name,
                    Err(EngineError::Residual {
                        path: group.legacy_path.clone(),
                        message: message.clone(),
                    }),
                ),
                other => (name, other),
            })
            .collect();
    }
    outcomes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use propsync_core::types::ResourceKind;
    use tempfile::TempDir;

    use crate::inspect::InspectError;

    struct StubInspector {
        columns: HashMap<String, Vec<String>>,
    }

    impl StubInspector {
        fn new(entries: &[(&str, &[&str])]) -> Self {
            let columns = entries
                .iter()
                .map(|(name, cols)| {
                    (
                        name.to_string(),
                        cols.iter().map(|c| c.to_string()).collect(),
                    )
                })
                .collect();
            Self { columns }
        }
    }

    impl ColumnInspector for StubInspector {
        fn columns(&self, resource: &ResourceDescriptor) -> Result<Vec<String>, InspectError> {
            self.columns
                .get(&resource.name.0)
                .cloned()
                .ok_or_else(|| InspectError::Connection {
                    message: format!("no relation for '{}'", resource.name),
                })
        }
    }

    /// Inspector that records how many calls are in flight at once.
    struct ConcurrencyProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ColumnInspector for ConcurrencyProbe {
        fn columns(&self, _resource: &ResourceDescriptor) -> Result<Vec<String>, InspectError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec!["a".to_string()])
        }
    }

    fn model(dir: &Path, name: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(
            ResourceKind::Model,
            name,
            dir.join("models").join(format!("{name}.sql")),
        )
    }

    #[test]
    fn update_creates_documents_for_new_resources() {
        let dir = TempDir::new().expect("tempdir");
        let inspector = StubInspector::new(&[
            ("users", &["user_id", "created_at"]),
            ("orders", &["order_id"]),
        ]);
        let resources = vec![model(dir.path(), "users"), model(dir.path(), "orders")];

        let report = update_all(&inspector, &resources, &RunConfig::default());

        assert!(report.all_succeeded());
        assert_eq!(report.changed_count(), 2);
        // Sorted by name.
        assert_eq!(report.succeeded[0].0 .0, "orders");
        assert_eq!(report.succeeded[1].0 .0, "users");
        assert!(resources[0].property_path().exists());
        assert!(resources[1].property_path().exists());

        let doc = store::load(&resources[0].property_path())
            .expect("load")
            .expect("document");
        let names: Vec<_> = doc.models[0].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["user_id", "created_at"]);
    }

    #[test]
    fn second_update_run_is_unchanged() {
        let dir = TempDir::new().expect("tempdir");
        let inspector = StubInspector::new(&[("users", &["user_id"])]);
        let resources = vec![model(dir.path(), "users")];

        let first = update_all(&inspector, &resources, &RunConfig::default());
        assert_eq!(first.succeeded[0].1, Action::Created);
        let on_disk = std::fs::read_to_string(resources[0].property_path()).expect("read");

        let second = update_all(&inspector, &resources, &RunConfig::default());
        assert_eq!(second.succeeded[0].1, Action::Unchanged);
        let after = std::fs::read_to_string(resources[0].property_path()).expect("read");
        assert_eq!(after, on_disk, "no rewrite on unchanged run");
    }

    #[test]
    fn one_failing_inspection_does_not_block_the_others() {
        let dir = TempDir::new().expect("tempdir");
        // "broken" is missing from the stub, so its inspection fails.
        let inspector = StubInspector::new(&[("users", &["a"]), ("orders", &["b"])]);
        let resources = vec![
            model(dir.path(), "broken"),
            model(dir.path(), "users"),
            model(dir.path(), "orders"),
        ];

        let report = update_all(&inspector, &resources, &RunConfig::default());

        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0 .0, "broken");
        assert!(matches!(report.failed[0].1, EngineError::Inspect(_)));
        assert!(resources[1].property_path().exists());
        assert!(resources[2].property_path().exists());
        assert!(!resources[0].property_path().exists());
    }

    #[test]
    fn thread_cap_bounds_in_flight_units() {
        let dir = TempDir::new().expect("tempdir");
        let probe = ConcurrencyProbe {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let resources: Vec<_> = (0..6)
            .map(|i| model(dir.path(), &format!("m{i}")))
            .collect();

        let config = RunConfig::with_threads(NonZeroUsize::new(2));
        let report = update_all(&probe, &resources, &config);

        assert!(report.all_succeeded());
        assert!(
            probe.peak.load(Ordering::SeqCst) <= 2,
            "at most 2 units in flight, saw {}",
            probe.peak.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn delete_removes_existing_and_skips_missing() {
        let dir = TempDir::new().expect("tempdir");
        let inspector = StubInspector::new(&[("users", &["a"])]);
        let users = model(dir.path(), "users");
        let ghosts = model(dir.path(), "ghosts");

        update_all(&inspector, &[users.clone()], &RunConfig::default());
        assert!(users.property_path().exists());

        let report = delete_all(&[users.clone(), ghosts], &RunConfig::default());

        assert!(report.all_succeeded());
        assert_eq!(report.succeeded[0], ("ghosts".into(), Action::Unchanged));
        assert_eq!(report.succeeded[1], ("users".into(), Action::Deleted));
        assert!(!users.property_path().exists());
    }

    fn write_legacy(path: &Path, yaml: &str) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, yaml).expect("write legacy");
    }

    #[test]
    fn migrate_splits_legacy_file_and_removes_empty_shell() {
        let dir = TempDir::new().expect("tempdir");
        let legacy = dir.path().join("models").join("schema.yml");
        write_legacy(
            &legacy,
            "\
version: 2
models:
- name: users
  description: Users.
  columns:
  - name: user_id
    tests:
    - unique
- name: orders
  description: Orders.
",
        );

        let mut users = model(dir.path(), "users");
        users.patch_path = Some(legacy.clone());
        let mut orders = model(dir.path(), "orders");
        orders.patch_path = Some(legacy.clone());

        let report = migrate_all(&[users.clone(), orders.clone()], &RunConfig::default());

        assert!(report.all_succeeded());
        assert!(report
            .succeeded
            .iter()
            .all(|(_, action)| *action == Action::Migrated));
        assert!(!legacy.exists(), "emptied legacy file must be deleted");

        let users_doc = store::load(&users.property_path())
            .expect("load")
            .expect("document");
        assert_eq!(users_doc.models[0].description, "Users.");
        assert!(users_doc.models[0].columns[0].extra.contains_key("tests"));
        assert!(orders.property_path().exists());
    }

    #[test]
    fn migrate_rewrites_residual_when_entries_remain() {
        let dir = TempDir::new().expect("tempdir");
        let legacy = dir.path().join("models").join("schema.yml");
        write_legacy(
            &legacy,
            "version: 2\nmodels:\n- name: users\n- name: orders\n",
        );

        let mut users = model(dir.path(), "users");
        users.patch_path = Some(legacy.clone());

        let report = migrate_all(&[users], &RunConfig::default());

        assert!(report.all_succeeded());
        let residual = store::load(&legacy).expect("load").expect("document");
        assert_eq!(residual.models.len(), 1);
        assert_eq!(residual.models[0].name, "orders");
    }

    #[test]
    fn migrate_malformed_legacy_file_fails_every_target() {
        let dir = TempDir::new().expect("tempdir");
        let legacy = dir.path().join("models").join("schema.yml");
        let original = "version: 2\nmodels: [not, {a: entry";
        write_legacy(&legacy, original);

        let mut users = model(dir.path(), "users");
        users.patch_path = Some(legacy.clone());
        let mut orders = model(dir.path(), "orders");
        orders.patch_path = Some(legacy.clone());

        let report = migrate_all(&[users.clone(), orders.clone()], &RunConfig::default());

        assert_eq!(report.failed.len(), 2);
        assert!(report
            .failed
            .iter()
            .all(|(_, err)| matches!(err, EngineError::Legacy { .. })));
        assert!(!users.property_path().exists());
        assert!(!orders.property_path().exists());
        let on_disk = std::fs::read_to_string(&legacy).expect("read");
        assert_eq!(on_disk, original, "unloadable legacy file must not be touched");
    }

    #[test]
    fn migrate_residual_write_failure_flips_migrated_outcomes() {
        let dir = TempDir::new().expect("tempdir");
        let legacy = dir.path().join("models").join("schema.yml");
        let original = "version: 2\nmodels:\n- name: users\n- name: orders\n";
        write_legacy(&legacy, original);
        // A directory squatting on the tmp sibling makes the residual rewrite
        // fail after the extracted document has already been saved.
        let tmp = PathBuf::from(format!("{}.propsync.tmp", legacy.display()));
        std::fs::create_dir_all(&tmp).expect("block tmp path");

        let mut users = model(dir.path(), "users");
        users.patch_path = Some(legacy.clone());

        let report = migrate_all(&[users.clone()], &RunConfig::default());

        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, EngineError::Residual { .. }));
        // The extracted document landed before the rewrite failed; the legacy
        // file still holds both entries.
        assert!(users.property_path().exists());
        let on_disk = std::fs::read_to_string(&legacy).expect("read");
        assert_eq!(on_disk, original);
    }

    #[test]
    fn migrate_missing_target_leaves_legacy_untouched() {
        let dir = TempDir::new().expect("tempdir");
        let legacy = dir.path().join("models").join("schema.yml");
        let original = "version: 2\nmodels:\n- name: orders\n";
        write_legacy(&legacy, original);

        let mut users = model(dir.path(), "users");
        users.patch_path = Some(legacy.clone());

        let report = migrate_all(&[users], &RunConfig::default());

        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, EngineError::NotInDocument { .. }));
        let on_disk = std::fs::read_to_string(&legacy).expect("read");
        assert_eq!(on_disk, original, "failed migration must not rewrite");
    }

    #[test]
    fn migrate_reports_unchanged_for_already_canonical_documents() {
        let dir = TempDir::new().expect("tempdir");
        let mut users = model(dir.path(), "users");
        users.patch_path = Some(users.property_path());
        let orders = model(dir.path(), "orders"); // no patch path at all

        let report = migrate_all(&[users, orders], &RunConfig::default());

        assert!(report.all_succeeded());
        assert!(report
            .succeeded
            .iter()
            .all(|(_, action)| *action == Action::Unchanged));
    }

    #[test]
    fn migrate_missing_legacy_file_fails_each_target() {
        let dir = TempDir::new().expect("tempdir");
        let legacy = dir.path().join("models").join("schema.yml");

        let mut users = model(dir.path(), "users");
        users.patch_path = Some(legacy.clone());
        let mut orders = model(dir.path(), "orders");
        orders.patch_path = Some(legacy);

        let report = migrate_all(&[users, orders], &RunConfig::default());

        assert_eq!(report.failed.len(), 2);
        assert!(report
            .failed
            .iter()
            .all(|(_, err)| matches!(err, EngineError::MissingDocument { .. })));
    }

    #[test]
    fn empty_resource_list_yields_empty_report() {
        let inspector = StubInspector::new(&[]);
        let report = update_all(&inspector, &[], &RunConfig::default());
        assert!(report.all_succeeded());
        assert!(report.succeeded.is_empty());
    }
}
