//! `waypoint sync` and `waypoint post-checkout`: branch reconciliation.

use anyhow::{Context, Result};
use clap::Args;

use super::{block_on, GlobalArgs};

/// Arguments for `waypoint sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Branch whose migrations are currently applied.
    pub branch: Option<String>,
}

impl SyncArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let migrator = global.migrator(global.config()?);
        let outcome = block_on(migrator.sync(self.branch.as_deref()))?
            .context("sync could not start")?;
        outcome.into_result().context("sync aborted")?;
        Ok(())
    }
}

/// Arguments git passes to a post-checkout hook.
#[derive(Args, Debug)]
pub struct PostCheckoutArgs {
    /// `<previous HEAD> <new HEAD> <1 for branch checkout, 0 for file checkout>`
    #[arg(value_name = "ARG", allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl PostCheckoutArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let migrator = global.migrator(global.config()?);
        let outcome = block_on(migrator.post_checkout(&self.args))?
            .context("post-checkout sync could not start")?;
        outcome.into_result().context("post-checkout sync aborted")?;
        Ok(())
    }
}
