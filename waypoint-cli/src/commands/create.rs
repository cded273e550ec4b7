//! `waypoint create`: scaffold a new migration file.

use anyhow::{Context, Result};
use clap::Args;

use super::GlobalArgs;

/// Arguments for `waypoint create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Words of the migration name, e.g. `add users table`.
    #[arg(value_name = "NAME")]
    pub name: Vec<String>,
}

impl CreateArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let mut config = global.config()?;
        config.set_args(self.name);
        global
            .migrator(config)
            .create()
            .context("failed to create migration")?;
        Ok(())
    }
}
