//! Waypoint core library: domain types, configuration, unit discovery and the
//! history ledger.
//!
//! - [`types`]: unit ids, directions, plans, ledger entries
//! - [`config`]: per-invocation [`Config`] and the `waypoint.yaml` project file
//! - [`registry`]: list and scaffold unit files
//! - [`history`]: load / save the `.migrated.json` ledger
//! - [`error`]: [`ConfigError`], [`RegistryError`], [`HistoryError`]

pub mod config;
pub mod error;
pub mod history;
pub mod registry;
pub mod types;

pub use config::{Config, ProjectFile};
pub use error::{ConfigError, HistoryError, RegistryError};
pub use history::{FileLedger, History, LedgerStore};
pub use types::{AppliedEntry, Direction, EnvHistory, Plan, PlanItem, ScriptKind, UnitId};
