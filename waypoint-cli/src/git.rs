//! `git` adapter for the branch sync protocol.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use waypoint_engine::{VcsError, VersionControl};

/// Runs the `git` binary in a working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    cwd: PathBuf,
}

impl GitCli {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    fn run(&self, args: &[&OsStr]) -> Result<String, VcsError> {
        let command = describe(args);
        tracing::debug!("running {command}");
        let output = Command::new("git")
            .current_dir(&self.cwd)
            .args(args)
            .output()
            .map_err(|source| VcsError::Spawn {
                command: command.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("exited with {}", output.status)
        } else {
            stderr
        };
        Err(VcsError::Failed { command, message })
    }
}

impl VersionControl for GitCli {
    fn checkout(&self, branch: &str, path: &Path) -> Result<(), VcsError> {
        self.run(&[OsStr::new("checkout"), OsStr::new(branch), path.as_os_str()])
            .map(drop)
    }

    fn reset_head(&self, path: &Path) -> Result<(), VcsError> {
        self.run(&[OsStr::new("reset"), OsStr::new("HEAD"), path.as_os_str()])
            .map(drop)
    }

    fn branch_from_commit(&self, hash: &str) -> Result<String, VcsError> {
        let name = self.run(&[OsStr::new("name-rev"), OsStr::new("--name-only"), OsStr::new(hash)])?;
        if name.is_empty() || name == "undefined" {
            return Err(VcsError::Failed {
                command: format!("git name-rev --name-only {hash}"),
                message: "no branch name reachable from commit".to_string(),
            });
        }
        Ok(name)
    }
}

fn describe(args: &[&OsStr]) -> String {
    let mut parts = vec!["git".to_string()];
    parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_joins_arguments() {
        let args: [&OsStr; 3] = [OsStr::new("reset"), OsStr::new("HEAD"), OsStr::new("m/1_a.js")];
        assert_eq!(describe(&args), "git reset HEAD m/1_a.js");
    }

    #[test]
    fn failure_outside_a_repository_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let git = GitCli::new(tmp.path());
        assert!(git.branch_from_commit("deadbeef").is_err());
        assert!(git
            .checkout("master", &tmp.path().join("1700000000001_a.js"))
            .is_err());
    }
}
