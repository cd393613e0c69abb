//! Subcommand implementations and shared run reporting.

pub mod delete;
pub mod echo_macro;
pub mod migrate;
pub mod update;

use anyhow::{bail, Result};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use propsync_engine::{Action, RunReport};

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "resource")]
    resource: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "detail")]
    detail: String,
}

fn action_label(action: Action) -> String {
    match action {
        Action::Created => action.label().green().to_string(),
        Action::Updated | Action::Migrated => action.label().cyan().to_string(),
        Action::Deleted => action.label().yellow().to_string(),
        Action::Unchanged => action.label().bright_black().to_string(),
    }
}

/// Print the per-resource outcome table and a one-line summary.
pub(crate) fn print_report(report: &RunReport) {
    let mut rows: Vec<ReportRow> = report
        .succeeded
        .iter()
        .map(|(name, action)| ReportRow {
            resource: name.0.clone(),
            outcome: action_label(*action),
            detail: String::new(),
        })
        .collect();
    rows.extend(report.failed.iter().map(|(name, err)| ReportRow {
        resource: name.0.clone(),
        outcome: "failed".red().bold().to_string(),
        detail: err.to_string(),
    }));

    if rows.is_empty() {
        println!("No matching resources.");
        return;
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{} succeeded ({} changed), {} failed",
        report.succeeded.len(),
        report.changed_count(),
        report.failed.len(),
    );
}

/// Non-zero exit when any resource failed, after the whole run completed.
pub(crate) fn finish(report: &RunReport) -> Result<()> {
    if report.all_succeeded() {
        return Ok(());
    }
    bail!(
        "{} of {} resources failed",
        report.failed.len(),
        report.succeeded.len() + report.failed.len(),
    );
}
