//! `waypoint dry`: list what a `run` with the same options would do.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use waypoint_core::{Direction, PlanItem};

use super::{GlobalArgs, SelectArgs};
use crate::reporter::sign;

/// Arguments for `waypoint dry`.
#[derive(Args, Debug)]
pub struct DryArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct DryReportJson {
    env: String,
    direction: Direction,
    migratable: Vec<PlanItemJson>,
    migrated: usize,
}

#[derive(Serialize)]
pub(crate) struct PlanItemJson {
    unit: String,
    direction: Direction,
    created_at: Option<String>,
}

impl From<&PlanItem> for PlanItemJson {
    fn from(item: &PlanItem) -> Self {
        Self {
            unit: item.unit.to_string(),
            direction: item.direction,
            created_at: item.unit.created_at().map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Tabled)]
pub(crate) struct PlanTableRow {
    #[tabled(rename = "")]
    sign: String,
    #[tabled(rename = "migration")]
    unit: String,
    #[tabled(rename = "created")]
    created: String,
}

impl From<&PlanItem> for PlanTableRow {
    fn from(item: &PlanItem) -> Self {
        Self {
            sign: sign(item.direction).yellow().to_string(),
            unit: item.unit.to_string(),
            created: item
                .unit
                .created_at()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub(crate) fn plan_table(plan: &[PlanItem]) -> Table {
    let mut table = Table::new(plan.iter().map(PlanTableRow::from));
    table.with(Style::rounded());
    table
}

impl DryArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let mut config = global.config()?;
        self.select.apply(&mut config);
        let env = config.env();
        let direction = config.direction();
        let preview = global.migrator(config).dry();

        if self.json {
            let payload = DryReportJson {
                env,
                direction,
                migratable: preview.plan.iter().map(PlanItemJson::from).collect(),
                migrated: preview.applied.len(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
            );
            return Ok(());
        }

        if preview.plan.is_empty() {
            println!("{}", "There is nothing to migrate!".green());
        } else {
            println!("{}", plan_table(&preview.plan));
        }
        println!(
            "\n{} {}",
            preview.applied.len().to_string().green(),
            format!("migrations have been migrated in '{env}'").bright_black()
        );
        Ok(())
    }
}
