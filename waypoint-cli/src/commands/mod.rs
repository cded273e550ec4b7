//! Subcommands and the options they share.

pub mod create;
pub mod diff;
pub mod dry;
pub mod hook;
pub mod run;
pub mod sync;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use waypoint_core::{Config, Direction, ProjectFile, ScriptKind};
use waypoint_engine::Migrator;

use crate::git::GitCli;
use crate::reporter::Reporter;

/// Options accepted by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Working directory (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Environment whose history is used.
    #[arg(short, long, global = true, env = "WAYPOINT_ENV")]
    pub env: Option<String>,

    /// Migrations directory, relative to the working directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Use CoffeeScript migrations (`.coffee`).
    #[arg(long, global = true)]
    pub coffee: bool,

    /// Template file for `create`.
    #[arg(long, global = true, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Log engine activity to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Defaults, then `waypoint.yaml`, then command-line flags.
    pub fn config(&self) -> Result<Config> {
        let mut config = match &self.cwd {
            Some(cwd) => Config::new(cwd),
            None => Config::from_current_dir()?,
        };

        if let Some(file) = ProjectFile::load_at(config.cwd())? {
            tracing::debug!("applying {}", ProjectFile::path_at(config.cwd()).display());
            config.apply_project_file(&file)?;
        }

        if let Some(env) = &self.env {
            config.set_env(env.clone())?;
        }
        if let Some(dir) = &self.directory {
            config.set_directory(dir)?;
        }
        if let Some(template) = &self.template {
            config.set_template(template);
        }
        if self.coffee {
            config.set_script_kind(ScriptKind::Coffee);
        }
        Ok(config)
    }

    /// Engine wired with the console reporter and git.
    pub fn migrator(&self, config: Config) -> Migrator {
        let reporter = Reporter::new(config.direction());
        let git = GitCli::new(config.cwd());
        Migrator::new(config).with_observer(reporter).with_vcs(git)
    }
}

/// Direction, limit and name filter for `run` and `dry`.
#[derive(Args, Debug, Default)]
pub struct SelectArgs {
    /// Migrate down. Ignored when `--up` is also given.
    #[arg(short, long)]
    pub down: bool,

    /// Migrate up (the default).
    #[arg(short, long)]
    pub up: bool,

    /// Maximum number of migrations (0 means no limit).
    #[arg(short, long, allow_negative_numbers = true, conflicts_with = "one")]
    pub limit: Option<i64>,

    /// Shorthand for `--limit 1`.
    #[arg(long)]
    pub one: bool,

    /// Migration to stop at; exact match together with `--one`.
    #[arg(value_name = "NAME")]
    pub name: Vec<String>,
}

impl SelectArgs {
    pub fn apply(&self, config: &mut Config) {
        if self.down && !self.up {
            config.set_direction(Direction::Down);
        }
        if self.one {
            config.set_limit(1);
        } else if let Some(limit) = self.limit {
            config.set_limit(limit);
        }
        config.set_args(self.name.clone());
    }
}

/// Drive an engine future on a current-thread runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(down: bool, limit: Option<i64>, one: bool) -> Config {
        let mut config = Config::new("/work");
        SelectArgs {
            down,
            limit,
            one,
            name: vec!["add".into(), "users".into()],
            ..Default::default()
        }
        .apply(&mut config);
        config
    }

    #[test]
    fn select_args_map_onto_config() {
        let config = select(true, Some(3), false);
        assert_eq!(config.direction(), Direction::Down);
        assert_eq!(config.limit(), 3);
        assert_eq!(config.name_filter().as_deref(), Some("add users"));
    }

    #[test]
    fn up_wins_over_down() {
        let mut config = Config::new("/work");
        SelectArgs {
            down: true,
            up: true,
            ..Default::default()
        }
        .apply(&mut config);
        assert_eq!(config.direction(), Direction::Up);
    }

    #[test]
    fn one_means_limit_one() {
        assert_eq!(select(false, None, true).limit(), 1);
    }

    #[test]
    fn negative_limit_is_unlimited() {
        assert_eq!(select(false, Some(-4), false).limit(), 0);
    }
}
