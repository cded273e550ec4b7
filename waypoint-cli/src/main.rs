//! Waypoint: timestamped, reversible migrations with per-environment history
//! and git branch reconciliation.
//!
//! # Usage
//!
//! ```text
//! waypoint run [--down|--up] [--limit N|--one] [--timeout SECS] [NAME...]
//! waypoint create [NAME...]
//! waypoint dry [--down|--up] [--limit N|--one] [--json] [NAME...]
//! waypoint diff [--json]
//! waypoint sync <BRANCH>
//! waypoint post-checkout <FROM> <TO> <FLAG>
//! waypoint install-hook [--force]
//! ```

mod commands;
mod git;
mod reporter;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    create::CreateArgs, diff::DiffArgs, dry::DryArgs, hook::InstallHookArgs, run::RunArgs,
    sync::{PostCheckoutArgs, SyncArgs},
    GlobalArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "waypoint",
    version,
    about = "Run and track reversible migrations across environments and git branches",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run migrations in the selected direction.
    Run(RunArgs),

    /// Create a new migration (optional name as arguments).
    #[command(visible_alias = "new")]
    Create(CreateArgs),

    /// List what is able to migrate, according to direction and limit.
    #[command(visible_alias = "status")]
    Dry(DryArgs),

    /// Show what it takes to reconcile the history with the migrations on disk.
    Diff(DiffArgs),

    /// Reconcile with the migrations of another branch.
    Sync(SyncArgs),

    /// Entry point for git's post-checkout hook.
    #[command(name = "post-checkout", hide = true)]
    PostCheckout(PostCheckoutArgs),

    /// Install the git post-checkout hook in the current repository.
    #[command(name = "install-hook")]
    InstallHook(InstallHookArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match cli.command {
        Commands::Run(args) => args.run(&cli.global),
        Commands::Create(args) => args.run(&cli.global),
        Commands::Dry(args) => args.run(&cli.global),
        Commands::Diff(args) => args.run(&cli.global),
        Commands::Sync(args) => args.run(&cli.global),
        Commands::PostCheckout(args) => args.run(&cli.global),
        Commands::InstallHook(args) => args.run(&cli.global),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
