//! The engine instance for one command invocation.
//!
//! A [`Migrator`] owns the [`Config`] and the injected ports (unit source,
//! ledger, version control, observer). The ledger is loaded fresh at the start
//! of every command and saved after every successful unit.

use std::path::PathBuf;

use chrono::Utc;

use waypoint_core::{registry, Config, EnvHistory, FileLedger, History, LedgerStore, Plan, UnitId};

use crate::branch::BranchSync;
use crate::diff::diff;
use crate::error::EngineError;
use crate::events::{Command, Event, NoopObserver, Observer};
use crate::runner::{RunOutcome, Runner};
use crate::selector::select;
use crate::unit::{ScriptSource, UnitSource};
use crate::vcs::{NoVcs, VersionControl};

/// What a command would do, without doing it.
#[derive(Debug, Clone, Default)]
pub struct Preview {
    pub plan: Plan,
    /// Units currently applied in the active environment.
    pub applied: EnvHistory,
}

pub struct Migrator {
    config: Config,
    source: Box<dyn UnitSource>,
    ledger: Box<dyn LedgerStore>,
    vcs: Box<dyn VersionControl>,
    observer: Box<dyn Observer>,
}

impl Migrator {
    /// Engine with script units, the file ledger, no VCS and no observer.
    pub fn new(config: Config) -> Self {
        let source = ScriptSource::new(config.script_kind());
        let ledger = FileLedger::new(config.directory(), config.env());
        Self {
            config,
            source: Box::new(source),
            ledger: Box::new(ledger),
            vcs: Box::new(NoVcs),
            observer: Box::new(NoopObserver),
        }
    }

    pub fn with_source(mut self, source: impl UnitSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_ledger(mut self, ledger: impl LedgerStore + 'static) -> Self {
        self.ledger = Box::new(ledger);
        self
    }

    pub fn with_vcs(mut self, vcs: impl VersionControl + 'static) -> Self {
        self.vcs = Box::new(vcs);
        self
    }

    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn emit(&self, event: Event<'_>) {
        self.observer.on_event(&event);
    }

    fn directory(&self) -> PathBuf {
        self.config.directory()
    }

    fn runner(&self) -> Runner<'_> {
        Runner::new(
            self.directory(),
            self.config.env(),
            self.config.timeout(),
            self.source.as_ref(),
            self.ledger.as_ref(),
            self.observer.as_ref(),
        )
    }

    /// Units on disk; an unreadable directory counts as no units.
    fn units_or_empty(&self) -> Vec<UnitId> {
        registry::list_units(&self.directory(), self.config.script_kind()).unwrap_or_else(|e| {
            tracing::debug!("treating migrations directory as empty: {e}");
            Vec::new()
        })
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Scaffold a new unit from the configured template.
    pub fn create(&self) -> Result<UnitId, EngineError> {
        self.emit(Event::Init {
            command: Command::Create,
        });
        let kind = self.config.script_kind();
        let template = registry::load_template(self.config.template(), kind)?;
        let dir = self.directory();
        let unit = registry::create_unit(
            &dir,
            Utc::now().timestamp_millis(),
            self.config.args(),
            kind,
            &template,
        )?;
        self.emit(Event::Created {
            unit: &unit,
            dir: &dir,
        });
        Ok(unit)
    }

    /// Plan for the configured direction / limit / name, without running it.
    pub fn dry(&self) -> Preview {
        self.emit(Event::Init {
            command: Command::Dry,
        });
        let preview = self.selection(&self.ledger.load());
        self.emit(Event::Ready {
            command: Command::Dry,
            plan: &preview.plan,
            applied: &preview.applied,
        });
        self.emit(Event::Done {
            command: Command::Dry,
            applied: &[],
            error: None,
        });
        preview
    }

    fn selection(&self, history: &History) -> Preview {
        let applied = history.env(&self.config.env());
        let name = self.config.name_filter();
        let plan = select(
            &self.units_or_empty(),
            &applied,
            self.config.direction(),
            self.config.limit(),
            name.as_deref(),
        );
        Preview { plan, applied }
    }

    /// Select and run units in the configured direction.
    pub async fn run(&self) -> RunOutcome {
        self.emit(Event::Init {
            command: Command::Run,
        });
        let mut history = self.ledger.load();
        let Preview { plan, applied } = self.selection(&history);
        self.emit(Event::Ready {
            command: Command::Run,
            plan: &plan,
            applied: &applied,
        });

        let outcome = self.runner().run(&plan, &mut history).await;
        self.emit(Event::Done {
            command: Command::Run,
            applied: &outcome.applied,
            error: outcome.error.as_ref(),
        });
        outcome
    }

    /// Reconciliation plan between the directory and the ledger.
    ///
    /// Unlike [`dry`](Self::dry), an unreadable directory is an error here.
    pub fn diff(&self) -> Result<Preview, EngineError> {
        self.emit(Event::Init {
            command: Command::Diff,
        });
        let preview = self.reconciliation(&self.ledger.load())?;
        self.emit(Event::Ready {
            command: Command::Diff,
            plan: &preview.plan,
            applied: &preview.applied,
        });
        self.emit(Event::Done {
            command: Command::Diff,
            applied: &[],
            error: None,
        });
        Ok(preview)
    }

    fn reconciliation(&self, history: &History) -> Result<Preview, EngineError> {
        let units = registry::list_units(&self.directory(), self.config.script_kind())?;
        let applied = history.env(&self.config.env());
        let plan = diff(&units, &applied);
        Ok(Preview { plan, applied })
    }

    /// Reconcile with the migrations of `branch`.
    pub async fn sync(&self, branch: Option<&str>) -> Result<RunOutcome, EngineError> {
        let branch = branch
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| EngineError::Configuration("missing branch to sync with".to_owned()))?;
        self.sync_with(Command::Sync, branch).await
    }

    /// Git `post-checkout` hook entry: `<from-hash> <to-hash> <is-branch-checkout>`.
    ///
    /// Does nothing for file checkouts or when the hashes are equal.
    pub async fn post_checkout(&self, args: &[String]) -> Result<RunOutcome, EngineError> {
        let [from, to, flag, ..] = args else {
            return Err(EngineError::Configuration(format!(
                "post-checkout expects <from> <to> <is-branch-checkout>, got {} argument(s)",
                args.len()
            )));
        };
        if from == to || flag != "1" {
            // Runs on every checkout, so stay quiet.
            tracing::debug!("post-checkout: nothing to reconcile ({from} -> {to}, flag {flag})");
            return Ok(RunOutcome::default());
        }

        let branch = self.vcs.branch_from_commit(from)?;
        self.sync_with(Command::PostCheckout, &branch).await
    }

    async fn sync_with(&self, command: Command, branch: &str) -> Result<RunOutcome, EngineError> {
        self.emit(Event::Init { command });
        self.emit(Event::Branch { branch });

        let mut history = self.ledger.load();
        let Preview { plan, applied } = self.reconciliation(&history)?;
        self.emit(Event::Ready {
            command,
            plan: &plan,
            applied: &applied,
        });

        let runner = self.runner();
        let outcome = BranchSync::new(&runner, self.vcs.as_ref())
            .do_sync(branch, plan, &mut history)
            .await;
        self.emit(Event::Done {
            command,
            applied: &outcome.applied,
            error: outcome.error.as_ref(),
        });
        Ok(outcome)
    }
}
