//! `propsync delete` — remove property documents.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use propsync_engine::{delete_all, RunConfig};

use crate::commands::{finish, print_report};
use crate::dbt::{ConnectionArgs, DbtCli, SelectionArgs};

/// Arguments for `propsync delete`.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Delete without asking for confirmation.
    #[arg(long)]
    pub yes: bool,
}

impl DeleteArgs {
    pub fn run(self) -> Result<()> {
        let cli = DbtCli::new(self.connection)?;
        let listing = cli.list_resources(&self.selection)?;

        let existing: Vec<PathBuf> = listing
            .resources
            .iter()
            .map(|resource| resource.property_path())
            .filter(|path| path.exists())
            .collect();
        println!(
            "{} of {} selected resources have existing property files",
            existing.len(),
            listing.resources.len(),
        );
        if existing.is_empty() {
            println!("There are no files to delete.");
            return Ok(());
        }

        if !self.yes && !confirm_deletion(&existing)? {
            println!("Deletion aborted.");
            return Ok(());
        }

        let report = delete_all(&listing.resources, &RunConfig::default());
        print_report(&report);
        finish(&report)
    }
}

fn confirm_deletion(paths: &[PathBuf]) -> Result<bool> {
    println!("\nThe following files will be deleted:\n");
    for path in paths {
        println!("  {}", path.display());
    }
    print!(
        "\nAre you sure you want to delete these {} file(s) (answer: y/n)? ",
        paths.len()
    );
    std::io::stdout().flush().context("failed to flush stdout")?;

    loop {
        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .context("failed to read confirmation")?;
        match answer.trim().to_lowercase().as_str() {
            "y" => return Ok(true),
            "n" => return Ok(false),
            _ => {
                print!("Please enter \"y\" to confirm deletion or \"n\" to abort: ");
                std::io::stdout().flush().context("failed to flush stdout")?;
            }
        }
    }
}
