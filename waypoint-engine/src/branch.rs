//! Branch sync protocol.
//!
//! Applies a [`diff`](crate::diff::diff) plan after switching branches:
//!
//! - `down` items were applied on the branch we came from, so their files are
//!   missing here. Each one is checked out from the reference branch, run
//!   down, unstaged again and deleted.
//! - `up` items arrived with the checkout and are run directly.
//!
//! Items run strictly in plan order and the first error stops the sync with
//! no rollback. Failures of the version-control steps around a `down` item
//! are reported as [`Event::StepFailed`], separate from the unit's own result.
//! A failure before the delete step leaves the retrieved file in the working
//! tree.

use waypoint_core::{registry, Direction, History, Plan, PlanItem};

use crate::error::{io_err, EngineError};
use crate::events::{Event, SyncStep};
use crate::runner::{RunOutcome, Runner};
use crate::vcs::VersionControl;

/// State of one sync call.
#[derive(Debug)]
pub struct SyncSession {
    pub reference_branch: String,
    pub plan: Plan,
    /// Items whose unit completed, in execution order.
    pub applied: Vec<PlanItem>,
}

impl SyncSession {
    pub fn new(reference_branch: impl Into<String>, plan: Plan) -> Self {
        Self {
            reference_branch: reference_branch.into(),
            plan,
            applied: Vec::new(),
        }
    }

    /// Applied items sorted ascending by id, for reporting.
    pub fn into_outcome(self, error: Option<EngineError>) -> RunOutcome {
        let mut applied = self.applied;
        applied.sort_by(|a, b| a.unit.cmp(&b.unit));
        RunOutcome { applied, error }
    }
}

pub struct BranchSync<'r, 'a> {
    runner: &'r Runner<'a>,
    vcs: &'r dyn VersionControl,
}

impl<'r, 'a> BranchSync<'r, 'a> {
    pub fn new(runner: &'r Runner<'a>, vcs: &'r dyn VersionControl) -> Self {
        Self { runner, vcs }
    }

    /// Run `plan` against `reference_branch`, recording progress in `history`.
    pub async fn do_sync(
        &self,
        reference_branch: &str,
        plan: Plan,
        history: &mut History,
    ) -> RunOutcome {
        let mut session = SyncSession::new(reference_branch, plan);
        let items = session.plan.clone();

        for item in &items {
            // Both the runner and `step` report their own failures.
            if let Err(error) = self.sync_item(&mut session, item, history).await {
                return session.into_outcome(Some(error));
            }
        }
        session.into_outcome(None)
    }

    async fn sync_item(
        &self,
        session: &mut SyncSession,
        item: &PlanItem,
        history: &mut History,
    ) -> Result<(), EngineError> {
        match item.direction {
            Direction::Up => {
                self.runner
                    .apply_into(item, history, &mut session.applied)
                    .await
            }
            Direction::Down => {
                let path = registry::unit_path(self.runner.directory(), &item.unit);
                tracing::debug!(
                    "retrieving {} from {}",
                    item.unit,
                    session.reference_branch
                );
                let retrieved = self
                    .vcs
                    .checkout(&session.reference_branch, &path)
                    .map_err(EngineError::from);
                self.step(item, SyncStep::Retrieve, retrieved)?;
                self.runner
                    .apply_into(item, history, &mut session.applied)
                    .await?;
                let unstaged = self.vcs.reset_head(&path).map_err(EngineError::from);
                self.step(item, SyncStep::Unstage, unstaged)?;
                let removed = std::fs::remove_file(&path).map_err(|e| io_err(&path, e));
                self.step(item, SyncStep::Remove, removed)
            }
        }
    }

    fn step<T>(
        &self,
        item: &PlanItem,
        step: SyncStep,
        result: Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        result.map_err(|error| {
            self.runner.observer().on_event(&Event::StepFailed {
                item,
                step,
                error: &error,
            });
            error
        })
    }
}
