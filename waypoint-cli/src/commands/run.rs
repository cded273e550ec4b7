//! `waypoint run`: apply migrations up or down.

use anyhow::{Context, Result};
use clap::Args;

use super::{block_on, GlobalArgs, SelectArgs};

/// Arguments for `waypoint run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Per-migration timeout in seconds.
    #[arg(short, long, value_name = "SECS", allow_negative_numbers = true)]
    pub timeout: Option<i64>,
}

impl RunArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let mut config = global.config()?;
        self.select.apply(&mut config);
        if let Some(secs) = self.timeout {
            config.set_timeout_ms(secs.saturating_mul(1000));
        }

        let migrator = global.migrator(config);
        let outcome = block_on(migrator.run())?;
        outcome.into_result().context("migration run aborted")?;
        Ok(())
    }
}
