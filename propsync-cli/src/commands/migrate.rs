//! `propsync migrate` — split legacy multi-resource documents into
//! one-resource-per-document form.

use std::num::NonZeroUsize;

use anyhow::Result;
use clap::Args;

use propsync_engine::{migrate_all, RunConfig};

use crate::commands::{finish, print_report};
use crate::dbt::{ConnectionArgs, DbtCli, SelectionArgs};

/// Arguments for `propsync migrate`.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Maximum number of concurrent workers (default: one per legacy file).
    #[arg(long)]
    pub threads: Option<NonZeroUsize>,
}

impl MigrateArgs {
    pub fn run(self) -> Result<()> {
        let cli = DbtCli::new(self.connection)?;
        let listing = cli.list_resources(&self.selection)?;

        let config = RunConfig::with_threads(self.threads);
        let report = migrate_all(&listing.resources, &config);

        print_report(&report);
        finish(&report)
    }
}
