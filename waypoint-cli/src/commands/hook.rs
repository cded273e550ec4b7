//! `waypoint install-hook`: register the git post-checkout hook.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use super::GlobalArgs;

const HOOK_MARKER: &str = "# installed by waypoint";

/// Arguments for `waypoint install-hook`.
#[derive(Args, Debug)]
pub struct InstallHookArgs {
    /// Replace an existing post-checkout hook not installed by waypoint.
    #[arg(long)]
    pub force: bool,
}

impl InstallHookArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.config()?;
        let hooks = hooks_dir(config.cwd())?;
        let path = hooks.join("post-checkout");

        if path.exists() && !self.force {
            let existing = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if !existing.contains(HOOK_MARKER) {
                bail!(
                    "{} already exists; rerun with --force to replace it",
                    path.display()
                );
            }
        }

        fs::create_dir_all(&hooks)
            .with_context(|| format!("failed to create {}", hooks.display()))?;
        fs::write(&path, hook_script())
            .with_context(|| format!("failed to write {}", path.display()))?;
        make_executable(&path)?;

        println!("{} {}", "✓".green(), path.display().to_string().bright_black());
        Ok(())
    }
}

fn hooks_dir(cwd: &Path) -> Result<PathBuf> {
    let git_dir = cwd.join(".git");
    if !git_dir.is_dir() {
        bail!("{} is not the root of a git repository", cwd.display());
    }
    Ok(git_dir.join("hooks"))
}

fn hook_script() -> String {
    format!("#!/bin/sh\n{HOOK_MARKER}\nexec waypoint post-checkout \"$@\"\n")
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
