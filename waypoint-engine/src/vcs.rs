//! Version-control port used by the branch sync protocol.
//!
//! The engine never runs a VCS binary itself; the CLI injects a git adapter
//! and tests inject a fake that copies files out of fixture directories.

use std::path::Path;

use thiserror::Error;

/// Failure reported by a [`VersionControl`] implementation.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The command ran and reported failure (non-zero exit, stderr captured).
    #[error("`{command}` failed: {message}")]
    Failed { command: String, message: String },

    /// The command could not be started or its output could not be read.
    #[error("could not run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// The three version-control operations the sync protocol needs.
pub trait VersionControl {
    /// Materialise `path` as it exists on `branch` in the working tree.
    fn checkout(&self, branch: &str, path: &Path) -> Result<(), VcsError>;

    /// Unstage `path` again after [`checkout`](Self::checkout) staged it.
    fn reset_head(&self, path: &Path) -> Result<(), VcsError>;

    /// Symbolic branch name reachable from commit `hash`.
    fn branch_from_commit(&self, hash: &str) -> Result<String, VcsError>;
}

/// Stand-in for commands that never touch version control (`run`, `dry`).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVcs;

impl VersionControl for NoVcs {
    fn checkout(&self, branch: &str, path: &Path) -> Result<(), VcsError> {
        Err(unavailable(format!("checkout {branch} {}", path.display())))
    }

    fn reset_head(&self, path: &Path) -> Result<(), VcsError> {
        Err(unavailable(format!("reset HEAD {}", path.display())))
    }

    fn branch_from_commit(&self, hash: &str) -> Result<String, VcsError> {
        Err(unavailable(format!("name-rev {hash}")))
    }
}

fn unavailable(command: String) -> VcsError {
    VcsError::Failed {
        command,
        message: "no version control configured".to_owned(),
    }
}
