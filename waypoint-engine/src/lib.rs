//! # waypoint-engine
//!
//! Selection, execution and branch reconciliation of migration units.
//!
//! Build a [`Migrator`] from a [`waypoint_core::Config`], inject the ports you
//! need ([`UnitSource`], [`waypoint_core::LedgerStore`], [`VersionControl`],
//! [`Observer`]) and call one command per instance:
//! [`Migrator::run`], [`Migrator::dry`], [`Migrator::diff`],
//! [`Migrator::sync`] or [`Migrator::post_checkout`].

pub mod branch;
pub mod diff;
pub mod error;
pub mod events;
pub mod migrator;
pub mod runner;
pub mod selector;
pub mod unit;
pub mod vcs;

pub use error::EngineError;
pub use events::{Command, Event, NoopObserver, Observer, SyncStep};
pub use migrator::{Migrator, Preview};
pub use runner::{RunOutcome, Runner};
pub use unit::{CompiledSource, Done, FnUnit, ScriptSource, Unit, UnitFailure, UnitSource};
pub use vcs::{NoVcs, VcsError, VersionControl};
