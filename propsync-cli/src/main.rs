//! propsync — keep dbt property (YAML) files in step with the warehouse.
//!
//! # Usage
//!
//! ```text
//! propsync update [--select ...] [--models ...] [--exclude ...] [--threads N]
//! propsync delete [--select ...] [--yes]
//! propsync migrate [--select ...] [--threads N]
//! propsync echo-macro
//! ```

mod commands;
mod dbt;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{delete::DeleteArgs, migrate::MigrateArgs, update::UpdateArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "propsync",
    version,
    about = "Create, update, and migrate dbt property files from warehouse metadata",
    long_about = None,
)]
struct Cli {
    /// Log verbosity (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or update property files for the selected resources.
    Update(UpdateArgs),

    /// Delete property files for the selected resources.
    Delete(DeleteArgs),

    /// Split legacy multi-resource property files into per-resource files.
    Migrate(MigrateArgs),

    /// Print the helper macro to paste into your dbt project.
    EchoMacro,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .parse_filters(&cli.log_level)
        .format_timestamp_secs()
        .init();

    match cli.command {
        Commands::Update(args) => args.run(),
        Commands::Delete(args) => args.run(),
        Commands::Migrate(args) => args.run(),
        Commands::EchoMacro => commands::echo_macro::run(),
    }
}
