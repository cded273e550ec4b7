//! Error types for waypoint-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting or loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Direction other than `up` or `down`.
    #[error("Unknown direction: \"{0}\"")]
    InvalidDirection(String),

    /// Migrations directory override that cannot be used as a path.
    #[error("Bad directory, expected a non-empty path but was: {0:?}")]
    InvalidDirectory(PathBuf),

    /// Any other rejected configuration value.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// `std::env::current_dir()` failed and no cwd was set explicitly.
    #[error("cannot determine current working directory: {0}")]
    Cwd(#[source] std::io::Error),

    /// Project file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Project file exists but is not valid YAML for [`crate::config::ProjectFile`].
    #[error("failed to parse project file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors from the migration registry (directory listing and scaffolding).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The migrations directory could not be listed.
    #[error("cannot read migrations directory {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configured template path does not exist.
    #[error("Could not find template: \"{}\"", path.display())]
    TemplateNotFound { path: PathBuf },

    /// Any other I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from persisting the history ledger.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised by in-memory ledgers that refuse writes (tests, read-only mode).
    #[error("history store is read-only")]
    ReadOnly,
}

pub(crate) fn registry_io(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn history_io(path: impl Into<PathBuf>, source: std::io::Error) -> HistoryError {
    HistoryError::Io {
        path: path.into(),
        source,
    }
}
