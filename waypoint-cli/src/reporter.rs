//! Console reporter for engine lifecycle events.
//!
//! Output modelled on a test-runner reporter: one line per migration,
//! `✓` for success, `✖` for the failure, and the remaining items listed as
//! skipped.

use std::cell::RefCell;

use colored::Colorize;

use waypoint_core::{Direction, PlanItem};
use waypoint_engine::{Command, Event, Observer};

const SUCCESS: &str = "✓";
const FAIL: &str = "✖";

pub fn sign(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "↑",
        Direction::Down => "↓",
    }
}

/// Prints `create`, `run` and sync progress. `dry` and `diff` render their
/// own output.
pub struct Reporter {
    direction: Direction,
    /// Items of the current plan that have not finished yet.
    pending: RefCell<Vec<PlanItem>>,
}

impl Reporter {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            pending: RefCell::new(Vec::new()),
        }
    }

    fn finish(&self, item: &PlanItem) {
        let mut pending = self.pending.borrow_mut();
        if let Some(pos) = pending.iter().position(|p| p == item) {
            pending.remove(pos);
        }
    }

    fn print_skipped(&self) {
        for left in self.pending.borrow().iter() {
            println!("{}", format!("  - {} (skipped)", left.unit).yellow());
        }
    }
}

fn is_reported(command: Command) -> bool {
    !matches!(command, Command::Dry | Command::Diff)
}

impl Observer for Reporter {
    fn on_event(&self, event: &Event<'_>) {
        match event {
            Event::Init { command } if is_reported(*command) => match command {
                Command::Create => println!("\nCreating migration\n"),
                Command::Run => {
                    println!("\nRunning migrations {}\n", sign(self.direction).yellow())
                }
                _ => println!("\nSyncing migrations\n"),
            },
            Event::Branch { branch } => {
                println!("  {}\n", format!("against branch '{branch}'").bright_black());
            }
            Event::Ready { command, plan, .. } if is_reported(*command) => {
                *self.pending.borrow_mut() = plan.to_vec();
                if plan.is_empty() {
                    println!("{}", "No migrations found, nothing to do...\n".green());
                }
            }
            Event::ItemSucceeded { item } => {
                self.finish(item);
                println!(
                    "  {} {} {}",
                    SUCCESS.green(),
                    sign(item.direction).yellow(),
                    item.unit.as_str().bright_black()
                );
            }
            Event::ItemFailed { item, error } => {
                self.finish(item);
                println!(
                    "  {} {} {}",
                    FAIL.red(),
                    sign(item.direction).yellow(),
                    item.unit.as_str().red()
                );
                println!("    {}", error.to_string().red());
                self.print_skipped();
            }
            Event::StepFailed { item, step, error } => {
                self.finish(item);
                println!(
                    "  {} {} {}",
                    FAIL.red(),
                    format!("could not {step}").red(),
                    item.unit.as_str().red()
                );
                println!("    {}", error.to_string().red());
                self.print_skipped();
            }
            Event::Done {
                command,
                applied,
                error: None,
            } if is_reported(*command) && !applied.is_empty() => {
                println!("{}", "\nEverything went fine!\n".green());
            }
            Event::Created { unit, .. } => {
                println!("  {} {}", SUCCESS.green(), unit.as_str().bright_black());
                println!("{}", "\nMigration created!\n".green());
            }
            _ => {}
        }
    }
}
