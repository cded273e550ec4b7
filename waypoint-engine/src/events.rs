//! Lifecycle events for reporting layers.
//!
//! The engine never prints; it emits [`Event`]s to an [`Observer`] and the
//! CLI renders them.

use std::fmt;
use std::path::Path;

use waypoint_core::{EnvHistory, Plan, PlanItem, UnitId};

use crate::error::EngineError;

/// Which engine command an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Create,
    Dry,
    Run,
    Diff,
    Sync,
    PostCheckout,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Create => write!(f, "create"),
            Command::Dry => write!(f, "dry"),
            Command::Run => write!(f, "run"),
            Command::Diff => write!(f, "diff"),
            Command::Sync => write!(f, "sync"),
            Command::PostCheckout => write!(f, "post-checkout"),
        }
    }
}

/// Version-control bookkeeping around a `down` item during a branch sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    /// Check the unit file out of the reference branch.
    Retrieve,
    /// Unstage the retrieved file after the unit ran.
    Unstage,
    /// Delete the retrieved file from the working tree.
    Remove,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStep::Retrieve => write!(f, "retrieve"),
            SyncStep::Unstage => write!(f, "unstage"),
            SyncStep::Remove => write!(f, "remove"),
        }
    }
}

#[derive(Debug)]
pub enum Event<'a> {
    /// A command started.
    Init { command: Command },
    /// The plan is known; nothing has run yet.
    Ready {
        command: Command,
        plan: &'a Plan,
        applied: &'a EnvHistory,
    },
    /// A sync is about to work against `branch`.
    Branch { branch: &'a str },
    ItemStarted { item: &'a PlanItem },
    ItemSucceeded { item: &'a PlanItem },
    ItemFailed {
        item: &'a PlanItem,
        error: &'a EngineError,
    },
    /// A sync step outside the unit itself failed. A `Remove` or `Unstage`
    /// failure follows the item's `ItemSucceeded`.
    StepFailed {
        item: &'a PlanItem,
        step: SyncStep,
        error: &'a EngineError,
    },
    /// The command finished; `applied` lists what completed.
    Done {
        command: Command,
        applied: &'a [PlanItem],
        error: Option<&'a EngineError>,
    },
    Created { unit: &'a UnitId, dir: &'a Path },
}

pub trait Observer {
    fn on_event(&self, event: &Event<'_>);
}

impl<F> Observer for F
where
    F: Fn(&Event<'_>),
{
    fn on_event(&self, event: &Event<'_>) {
        self(event)
    }
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_event(&self, _event: &Event<'_>) {}
}
