//! Error types for waypoint-engine.

use std::path::PathBuf;

use thiserror::Error;

use waypoint_core::{ConfigError, HistoryError, RegistryError, UnitId};

use crate::unit::UnitFailure;
use crate::vcs::VcsError;

/// All errors that can arise while planning or executing migrations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The unit did not signal completion before the configured timeout.
    #[error("Timeout of {timeout_ms} ms exceeded for migration: \"{unit}\"")]
    Timeout { unit: UnitId, timeout_ms: u64 },

    /// The unit reported a failure, panicked, or dropped its completion handle.
    #[error("migration \"{unit}\" failed: {source}")]
    Execution {
        unit: UnitId,
        #[source]
        source: UnitFailure,
    },

    /// The unit source could not produce a runnable unit.
    #[error("cannot load migration \"{unit}\": {reason}")]
    UnitLoad { unit: UnitId, reason: String },

    /// The unit succeeded but the ledger write that should record it failed.
    #[error("migration \"{unit}\" succeeded but history could not be saved: {source}")]
    History {
        unit: UnitId,
        #[source]
        source: HistoryError,
    },

    /// A version-control operation failed.
    #[error("version control error: {0}")]
    VersionControl(#[from] VcsError),

    /// A required argument for sync / post-checkout is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Unit the error is attached to, if it came from executing one.
    pub fn unit(&self) -> Option<&UnitId> {
        match self {
            EngineError::Timeout { unit, .. }
            | EngineError::Execution { unit, .. }
            | EngineError::UnitLoad { unit, .. }
            | EngineError::History { unit, .. } => Some(unit),
            _ => None,
        }
    }
}

/// Convenience constructor for [`EngineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}
