//! Branch sync scenarios against a fixture "repository".
//!
//! Layout per test:
//!
//! ```text
//! <tmp>/branches/master/   unit files that only exist on master
//! <tmp>/migrations/        working tree (currently the feature branch)
//! ```
//!
//! `FixtureGit::checkout` copies a file from `branches/<branch>/` into the
//! working tree, the way `git checkout <branch> <file>` would.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use waypoint_core::{history, Config, FileLedger, History, LedgerStore, PlanItem};
use waypoint_engine::{
    CompiledSource, Done, EngineError, Event, FnUnit, Migrator, SyncStep, VcsError, VersionControl,
};

const A: &str = "1700000000001_create_users.js";
const B: &str = "1700000000002_create_orders.js";
const C: &str = "1700000000003_create_audit.js";
const D: &str = "1700000000004_create_invoices.js";

const ENV: &str = "test";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

type Tables = Arc<Mutex<BTreeSet<String>>>;

#[derive(Clone, Default)]
struct FixtureGit {
    branches: PathBuf,
    commits: BTreeMap<String, String>,
    calls: Arc<Mutex<Vec<String>>>,
    fail_reset: bool,
}

impl VersionControl for FixtureGit {
    fn checkout(&self, branch: &str, path: &Path) -> Result<(), VcsError> {
        let name = path.file_name().expect("file name");
        self.calls
            .lock()
            .unwrap()
            .push(format!("checkout {branch} {}", name.to_string_lossy()));
        let source = self.branches.join(branch).join(name);
        let contents = fs::read_to_string(&source).map_err(|e| VcsError::Failed {
            command: format!("checkout {branch} {}", path.display()),
            message: e.to_string(),
        })?;
        fs::write(path, contents).map_err(|source| VcsError::Spawn {
            command: "write".into(),
            source,
        })
    }

    fn reset_head(&self, path: &Path) -> Result<(), VcsError> {
        let name = path.file_name().expect("file name");
        self.calls
            .lock()
            .unwrap()
            .push(format!("reset {}", name.to_string_lossy()));
        if self.fail_reset {
            return Err(VcsError::Failed {
                command: format!("reset HEAD {}", path.display()),
                message: "index.lock exists".into(),
            });
        }
        Ok(())
    }

    fn branch_from_commit(&self, hash: &str) -> Result<String, VcsError> {
        self.commits.get(hash).cloned().ok_or_else(|| VcsError::Failed {
            command: format!("name-rev --name-only {hash}"),
            message: "Could not get sha1 for unknown commit".into(),
        })
    }
}

/// Unit that creates `table` on up and drops it on down.
fn table_unit(
    tables: &Tables,
    table: &str,
) -> FnUnit<impl Fn(Done) + Send + Sync, impl Fn(Done) + Send + Sync> {
    let (up_tables, down_tables) = (tables.clone(), tables.clone());
    let (up_name, down_name) = (table.to_owned(), table.to_owned());
    FnUnit::new(
        move |done: Done| {
            up_tables.lock().unwrap().insert(up_name.clone());
            done.ok();
        },
        move |done: Done| {
            down_tables.lock().unwrap().remove(&down_name);
            done.ok();
        },
    )
}

struct Scenario {
    tmp: TempDir,
    tables: Tables,
    git: FixtureGit,
}

impl Scenario {
    /// master applied A and C; we are now on feature, which has B and D.
    fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let master = tmp.path().join("branches").join("master");
        let migrations = tmp.path().join("migrations");
        fs::create_dir_all(&master).unwrap();
        fs::create_dir_all(&migrations).unwrap();
        for unit in [A, C] {
            fs::write(master.join(unit), "// master unit\n").unwrap();
        }
        for unit in [B, D] {
            fs::write(migrations.join(unit), "// feature unit\n").unwrap();
        }

        let mut history = History::default();
        history.record(ENV, &PlanItem::up(A));
        history.record(ENV, &PlanItem::up(C));
        history::save_at(&migrations, &history).unwrap();

        let tables: Tables = Arc::new(Mutex::new(
            ["users", "audit"].into_iter().map(String::from).collect(),
        ));
        let git = FixtureGit {
            branches: tmp.path().join("branches"),
            commits: BTreeMap::from([("aaa111".to_string(), "master".to_string())]),
            calls: Arc::default(),
            fail_reset: false,
        };
        Self { tmp, tables, git }
    }

    fn migrations(&self) -> PathBuf {
        self.tmp.path().join("migrations")
    }

    fn source(&self) -> CompiledSource {
        CompiledSource::new()
            .with(A, table_unit(&self.tables, "users"))
            .with(B, table_unit(&self.tables, "orders"))
            .with(C, table_unit(&self.tables, "audit"))
            .with(D, table_unit(&self.tables, "invoices"))
    }

    fn migrator(&self) -> Migrator {
        let mut config = Config::new(self.tmp.path());
        config.set_env(ENV).unwrap();
        Migrator::new(config)
            .with_source(self.source())
            .with_vcs(self.git.clone())
    }

    fn tables(&self) -> Vec<String> {
        self.tables.lock().unwrap().iter().cloned().collect()
    }

    fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.migrations())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    fn applied(&self) -> Vec<String> {
        FileLedger::new(self.migrations(), ENV)
            .load()
            .env(ENV)
            .keys()
            .map(|u| u.to_string())
            .collect()
    }
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Diff ordering
// ---------------------------------------------------------------------------

#[test]
fn diff_orders_downs_newest_first_then_ups_oldest_first() {
    let scenario = Scenario::new();
    let plan = scenario.migrator().diff().expect("diff").plan;
    assert_eq!(
        plan,
        vec![
            PlanItem::down(C),
            PlanItem::down(A),
            PlanItem::up(B),
            PlanItem::up(D),
        ]
    );
}

// ---------------------------------------------------------------------------
// Post-checkout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn post_checkout_reconciles_with_previous_branch() {
    let scenario = Scenario::new();
    let migrator = scenario.migrator();

    let outcome = migrator
        .post_checkout(&args(&["aaa111", "bbb222", "1"]))
        .await
        .expect("post-checkout");
    assert!(outcome.is_success(), "{:?}", outcome.error);

    // Reported ascending by id, regardless of execution order.
    assert_eq!(
        outcome.applied,
        vec![
            PlanItem::down(A),
            PlanItem::up(B),
            PlanItem::down(C),
            PlanItem::up(D),
        ]
    );
    assert_eq!(scenario.tables(), vec!["invoices", "orders"]);
    assert_eq!(scenario.applied(), vec![B, D]);
    assert_eq!(scenario.files(), vec![B, D], "retrieved files must be removed");

    assert_eq!(
        *scenario.git.calls.lock().unwrap(),
        vec![
            format!("checkout master {C}"),
            format!("reset {C}"),
            format!("checkout master {A}"),
            format!("reset {A}"),
        ]
    );

    // Converged: nothing left to reconcile.
    assert!(migrator.diff().expect("diff").plan.is_empty());
}

#[tokio::test]
async fn post_checkout_with_identical_hashes_is_a_no_op() {
    let scenario = Scenario::new();
    let outcome = scenario
        .migrator()
        .post_checkout(&args(&["aaa111", "aaa111", "1"]))
        .await
        .expect("post-checkout");
    assert!(outcome.is_success());
    assert!(outcome.applied.is_empty());
    assert!(scenario.git.calls.lock().unwrap().is_empty());
    assert_eq!(scenario.applied(), vec![A, C]);
}

#[tokio::test]
async fn post_checkout_of_a_file_is_a_no_op() {
    let scenario = Scenario::new();
    let outcome = scenario
        .migrator()
        .post_checkout(&args(&["aaa111", "bbb222", "0"]))
        .await
        .expect("post-checkout");
    assert!(outcome.applied.is_empty());
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn post_checkout_requires_three_arguments() {
    let scenario = Scenario::new();
    let err = scenario
        .migrator()
        .post_checkout(&args(&["aaa111", "bbb222"]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}

#[tokio::test]
async fn post_checkout_surfaces_branch_lookup_failure() {
    let scenario = Scenario::new();
    let err = scenario
        .migrator()
        .post_checkout(&args(&["unknown", "bbb222", "1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::VersionControl(_)));
    assert_eq!(scenario.applied(), vec![A, C]);
}

// ---------------------------------------------------------------------------
// Manual sync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_requires_a_branch() {
    let scenario = Scenario::new();
    let migrator = scenario.migrator();
    for branch in [None, Some(""), Some("   ")] {
        let err = migrator.sync(branch).await.unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)), "{branch:?}");
    }
}

#[tokio::test]
async fn sync_with_named_branch() {
    let scenario = Scenario::new();
    let outcome = scenario.migrator().sync(Some("master")).await.expect("sync");
    assert!(outcome.is_success());
    assert_eq!(outcome.applied.len(), 4);
    assert_eq!(scenario.applied(), vec![B, D]);
}

#[tokio::test]
async fn failing_down_leaves_retrieved_file_and_stops() {
    let scenario = Scenario::new();
    let mut config = Config::new(scenario.tmp.path());
    config.set_env(ENV).unwrap();
    let source = scenario.source().with(
        C,
        FnUnit::new(|done: Done| done.ok(), |done: Done| done.fail("audit table is locked")),
    );
    let migrator = Migrator::new(config)
        .with_source(source)
        .with_vcs(scenario.git.clone());

    let outcome = migrator.sync(Some("master")).await.expect("sync");
    assert!(outcome.applied.is_empty());
    let err = outcome.error.expect("failure");
    assert!(err.to_string().contains("audit table is locked"));

    assert_eq!(scenario.files(), vec![B, C, D], "C stays checked out");
    assert_eq!(scenario.applied(), vec![A, C]);
    assert_eq!(
        *scenario.git.calls.lock().unwrap(),
        vec![format!("checkout master {C}")]
    );
}

#[tokio::test]
async fn missing_file_on_reference_branch_aborts() {
    let scenario = Scenario::new();
    fs::remove_file(scenario.tmp.path().join("branches/master").join(C)).unwrap();

    let outcome = scenario.migrator().sync(Some("master")).await.expect("sync");
    assert!(matches!(outcome.error, Some(EngineError::VersionControl(_))));
    assert!(outcome.applied.is_empty());
    assert_eq!(scenario.tables(), vec!["audit", "users"]);
}

#[tokio::test]
async fn unreadable_directory_is_an_error_for_sync() {
    let scenario = Scenario::new();
    let mut config = Config::new(scenario.tmp.path());
    config.set_env(ENV).unwrap();
    config.set_directory("does-not-exist").unwrap();
    let err = Migrator::new(config)
        .with_source(scenario.source())
        .with_vcs(scenario.git.clone())
        .sync(Some("master"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Registry(_)));
}

#[tokio::test]
async fn unstage_failure_after_down_is_reported_as_a_step() {
    let mut scenario = Scenario::new();
    scenario.git.fail_reset = true;
    let log: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = log.clone();

    let outcome = scenario
        .migrator()
        .with_observer(move |event: &Event<'_>| {
            let line = match event {
                Event::ItemStarted { item } => format!("start {item}"),
                Event::ItemSucceeded { item } => format!("ok {item}"),
                Event::ItemFailed { item, .. } => format!("failed {item}"),
                Event::StepFailed { item, step, .. } => format!("{step} failed {item}"),
                _ => return,
            };
            sink.lock().unwrap().push(line);
        })
        .sync(Some("master"))
        .await
        .expect("sync");

    assert!(matches!(outcome.error, Some(EngineError::VersionControl(_))));
    // The down itself ran and was recorded.
    assert_eq!(outcome.applied, vec![PlanItem::down(C)]);
    assert_eq!(scenario.applied(), vec![A]);
    assert_eq!(SyncStep::Unstage.to_string(), "unstage");
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            format!("start {C} (down)"),
            format!("ok {C} (down)"),
            format!("unstage failed {C} (down)"),
        ]
    );
}
