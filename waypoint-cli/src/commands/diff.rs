//! `waypoint diff`: show the reconciliation plan between disk and history.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::dry::{plan_table, PlanItemJson};
use super::GlobalArgs;

/// Arguments for `waypoint diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct DiffReportJson {
    env: String,
    plan: Vec<PlanItemJson>,
}

impl DiffArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.config()?;
        let env = config.env();
        let dir = config.directory();
        let preview = global
            .migrator(config)
            .diff()
            .with_context(|| format!("diff failed for '{}'", dir.display()))?;

        if self.json {
            let payload = DiffReportJson {
                env,
                plan: preview.plan.iter().map(PlanItemJson::from).collect(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize diff JSON")?
            );
            return Ok(());
        }

        if preview.plan.is_empty() {
            println!("{}", format!("History for '{env}' matches the migrations on disk.").green());
            return Ok(());
        }

        let downs = preview.plan.iter().filter(|i| i.direction.is_down()).count();
        println!(
            "{} to roll back, {} to apply in '{env}':",
            downs,
            preview.plan.len() - downs
        );
        println!("{}", plan_table(&preview.plan));
        Ok(())
    }
}
