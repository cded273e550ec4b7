//! Sequential plan execution.
//!
//! ## Per-item protocol
//!
//! 1. Fix the deadline (`now + timeout`).
//! 2. Load the unit from the [`UnitSource`].
//! 3. Invoke its entry point with a fresh [`Done`] handle; a panic here is a
//!    failure of the unit.
//! 4. Wait for the handle or the deadline, whichever comes first. A handle
//!    finished after the deadline goes nowhere.
//! 5. On success, record the step in the ledger and save it before moving on.
//!
//! The first failure stops the plan. Nothing is retried or rolled back.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{self, Instant};

use waypoint_core::{History, LedgerStore, PlanItem};

use crate::error::EngineError;
use crate::events::{Event, Observer};
use crate::unit::{Done, UnitSource};

/// Items that completed, plus the error that stopped the plan, if any.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub applied: Vec<PlanItem>,
    pub error: Option<EngineError>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Vec<PlanItem>, EngineError> {
        match self.error {
            None => Ok(self.applied),
            Some(e) => Err(e),
        }
    }
}

pub struct Runner<'a> {
    directory: PathBuf,
    env: String,
    timeout: Duration,
    source: &'a dyn UnitSource,
    ledger: &'a dyn LedgerStore,
    observer: &'a dyn Observer,
}

impl<'a> Runner<'a> {
    pub fn new(
        directory: impl Into<PathBuf>,
        env: impl Into<String>,
        timeout: Duration,
        source: &'a dyn UnitSource,
        ledger: &'a dyn LedgerStore,
        observer: &'a dyn Observer,
    ) -> Self {
        Self {
            directory: directory.into(),
            env: env.into(),
            timeout,
            source,
            ledger,
            observer,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn observer(&self) -> &dyn Observer {
        self.observer
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Run one unit in the item's direction without touching the ledger.
    pub async fn execute(&self, item: &PlanItem) -> Result<(), EngineError> {
        let deadline = Instant::now() + self.timeout;
        let unit = self.source.load(&self.directory, &item.unit)?;
        let (done, completion) = Done::channel();

        tracing::debug!("invoking {item}");
        let invoked = panic::catch_unwind(AssertUnwindSafe(|| unit.invoke(item.direction, done)));
        if let Err(payload) = invoked {
            return Err(EngineError::Execution {
                unit: item.unit.clone(),
                source: panic_message(payload).into(),
            });
        }

        match time::timeout_at(deadline, completion).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(source))) => Err(EngineError::Execution {
                unit: item.unit.clone(),
                source,
            }),
            Ok(Err(_closed)) => Err(EngineError::Execution {
                unit: item.unit.clone(),
                source: "completion handle dropped without being called".into(),
            }),
            Err(_elapsed) => {
                tracing::warn!("{} timed out after {} ms", item.unit, self.timeout_ms());
                Err(EngineError::Timeout {
                    unit: item.unit.clone(),
                    timeout_ms: self.timeout_ms(),
                })
            }
        }
    }

    /// Execute `item`, then record and persist it in `history`.
    pub async fn apply(&self, item: &PlanItem, history: &mut History) -> Result<(), EngineError> {
        self.observer.on_event(&Event::ItemStarted { item });
        let result = self.execute_and_record(item, history).await;
        match &result {
            Ok(()) => self.observer.on_event(&Event::ItemSucceeded { item }),
            Err(error) => self.observer.on_event(&Event::ItemFailed { item, error }),
        }
        result
    }

    async fn execute_and_record(
        &self,
        item: &PlanItem,
        history: &mut History,
    ) -> Result<(), EngineError> {
        self.execute(item).await?;
        history.record(&self.env, item);
        self.ledger
            .save(history)
            .map_err(|source| EngineError::History {
                unit: item.unit.clone(),
                source,
            })?;
        tracing::info!("migrated {item}");
        Ok(())
    }

    /// [`apply`](Self::apply), pushing `item` onto `applied` whenever the unit
    /// itself succeeded (including when only the ledger write failed).
    pub async fn apply_into(
        &self,
        item: &PlanItem,
        history: &mut History,
        applied: &mut Vec<PlanItem>,
    ) -> Result<(), EngineError> {
        let result = self.apply(item, history).await;
        if matches!(result, Ok(()) | Err(EngineError::History { .. })) {
            applied.push(item.clone());
        }
        result
    }

    /// Run `plan` in order, stopping at the first error.
    pub async fn run(&self, plan: &[PlanItem], history: &mut History) -> RunOutcome {
        let mut outcome = RunOutcome::default();
        for item in plan {
            if let Err(error) = self.apply_into(item, history, &mut outcome.applied).await {
                outcome.error = Some(error);
                break;
            }
        }
        outcome
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_owned()
    }
}
