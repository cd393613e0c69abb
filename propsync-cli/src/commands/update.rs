//! `propsync update` — create or update property documents.

use std::num::NonZeroUsize;

use anyhow::Result;
use clap::Args;

use propsync_engine::{update_all, RunConfig};

use crate::commands::{finish, print_report};
use crate::dbt::{ConnectionArgs, DbtCli, DbtInspector, SelectionArgs};

/// Arguments for `propsync update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Maximum number of concurrent workers collecting column information
    /// and writing property files (default: one per resource).
    #[arg(long)]
    pub threads: Option<NonZeroUsize>,
}

impl UpdateArgs {
    pub fn run(self) -> Result<()> {
        let cli = DbtCli::new(self.connection)?;
        let listing = cli.list_resources(&self.selection)?;
        let inspector = DbtInspector::new(&cli, listing.compiled_sql);

        let config = RunConfig::with_threads(self.threads);
        let report = update_all(&inspector, &listing.resources, &config);

        print_report(&report);
        finish(&report)
    }
}
