//! dbt subprocess adapters: resource listing and column inspection.
//!
//! The engine only consumes traits and descriptors; everything that actually
//! shells out to `dbt` lives here. Listing runs `dbt ls` twice (path output
//! and JSON output, zipped line by line); inspection runs the
//! `_log_columns_list` macro through `dbt run-operation` and parses the
//! column list it logs.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Deserialize;

use propsync_core::types::{ResourceDescriptor, ResourceKind, ResourceName};
use propsync_engine::{ColumnInspector, InspectError};

/// Name of the helper macro the inspector runs.
pub const MACRO_NAME: &str = "_log_columns_list";

/// The helper macro itself, printed by `propsync echo-macro` for the user to
/// paste into their project's macro paths.
pub const MACRO_SQL: &str = "\
{# This macro is intended for use by propsync #}
{% macro _log_columns_list(sql=none, resource_name=none) %}
    {% if sql is none %}
        {% set sql = 'select * from ' ~ ref(resource_name) %}
    {% endif %}
    {% if execute %}
        {{ log(get_columns_in_query(sql), info=True) }}
    {% endif %}
{% endmacro %}
";

// ---------------------------------------------------------------------------
// CLI argument groups shared by update / delete / migrate
// ---------------------------------------------------------------------------

/// Resource selection arguments, passed through verbatim to `dbt ls`.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Restrict to one resource type (model, seed, snapshot, analysis).
    #[arg(long)]
    pub resource_type: Option<String>,

    /// dbt node selection syntax (run "dbt ls --help" for details).
    #[arg(long)]
    pub select: Option<String>,

    /// dbt model selection syntax (run "dbt ls --help" for details).
    #[arg(long)]
    pub models: Option<String>,

    /// dbt node exclusion syntax (run "dbt ls --help" for details).
    #[arg(long)]
    pub exclude: Option<String>,

    /// Named selector from selectors.yml.
    #[arg(long)]
    pub selector: Option<String>,

    /// dbt state directory for state-based selection.
    #[arg(long)]
    pub state: Option<String>,
}

impl SelectionArgs {
    /// True when no selection argument was given; the default selection (the
    /// whole project, every supported type) applies. `state` alone does not
    /// count as a selection.
    fn is_default(&self) -> bool {
        self.resource_type.is_none()
            && self.select.is_none()
            && self.models.is_none()
            && self.exclude.is_none()
            && self.selector.is_none()
    }
}

/// dbt project/profile connection arguments.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Directory of the dbt project (defaults to the nearest dbt_project.yml).
    #[arg(long)]
    pub project_dir: Option<PathBuf>,

    /// Directory holding profiles.yml.
    #[arg(long)]
    pub profiles_dir: Option<PathBuf>,

    /// Profile to use.
    #[arg(long)]
    pub profile: Option<String>,

    /// Target within the profile.
    #[arg(long)]
    pub target: Option<String>,

    /// YAML string of dbt variables.
    #[arg(long)]
    pub vars: Option<String>,
}

// ---------------------------------------------------------------------------
// Project discovery
// ---------------------------------------------------------------------------

/// A located dbt project: root directory plus the configuration propsync
/// needs from dbt_project.yml.
#[derive(Debug, Clone)]
pub struct DbtProject {
    pub root: PathBuf,
    pub name: String,
    /// `<target-path>/compiled/<name>` — where dbt writes compiled SQL.
    pub compiled_path: PathBuf,
}

#[derive(Deserialize)]
struct ProjectYml {
    name: String,
    #[serde(default, rename = "target-path")]
    target_path: Option<String>,
}

impl DbtProject {
    /// Walk up from `start` to the nearest directory containing
    /// dbt_project.yml.
    pub fn locate(start: &Path) -> Result<Self> {
        let start = if start.is_absolute() {
            start.to_path_buf()
        } else {
            std::env::current_dir()
                .context("could not determine current directory")?
                .join(start)
        };
        let mut dir: &Path = &start;
        loop {
            let candidate = dir.join("dbt_project.yml");
            if candidate.is_file() {
                return Self::from_project_yml(dir, &candidate);
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => bail!(
                    "no dbt_project.yml found in {} or any parent directory",
                    start.display()
                ),
            }
        }
    }

    fn from_project_yml(root: &Path, path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed: ProjectYml = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let target_path = parsed.target_path.unwrap_or_else(|| "target".to_string());
        let compiled_path = root.join(target_path).join("compiled").join(&parsed.name);
        Ok(Self {
            root: root.to_path_buf(),
            name: parsed.name,
            compiled_path,
        })
    }
}

// ---------------------------------------------------------------------------
// dbt ls
// ---------------------------------------------------------------------------

/// Result of resource listing: engine descriptors plus the resources whose
/// columns must be inspected via their compiled SQL (analyses and ephemeral
/// models have no relation in the warehouse to `select * from`).
#[derive(Debug)]
pub struct Listing {
    pub resources: Vec<ResourceDescriptor>,
    pub compiled_sql: HashMap<ResourceName, PathBuf>,
}

#[derive(Deserialize)]
struct LsNode {
    name: String,
    resource_type: String,
    #[serde(default)]
    patch_path: Option<String>,
    #[serde(default)]
    config: LsNodeConfig,
}

#[derive(Deserialize, Default)]
struct LsNodeConfig {
    #[serde(default)]
    materialized: Option<String>,
}

/// Wrapper around the `dbt` executable for one project.
#[derive(Debug)]
pub struct DbtCli {
    pub project: DbtProject,
    connection: ConnectionArgs,
}

impl DbtCli {
    pub fn new(connection: ConnectionArgs) -> Result<Self> {
        let start = connection
            .project_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let project = DbtProject::locate(&start)?;
        Ok(Self {
            project,
            connection,
        })
    }

    fn connection_args(&self) -> Vec<String> {
        let mut args = vec![
            "--project-dir".to_string(),
            self.project.root.display().to_string(),
        ];
        if let Some(profiles_dir) = &self.connection.profiles_dir {
            args.push("--profiles-dir".to_string());
            args.push(profiles_dir.display().to_string());
        }
        for (flag, value) in [
            ("--profile", &self.connection.profile),
            ("--target", &self.connection.target),
            ("--vars", &self.connection.vars),
        ] {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value.clone());
            }
        }
        args
    }

    fn run(&self, args: &[String]) -> std::io::Result<Output> {
        log::debug!("running command: dbt {}", args.join(" "));
        Command::new("dbt").args(args).output()
    }

    fn ls_lines(&self, selection: &SelectionArgs, output: &str) -> Result<Vec<String>> {
        let mut args = vec!["ls".to_string()];
        args.extend(self.connection_args());

        if selection.is_default() {
            args.push("--select".to_string());
            args.push(self.project.name.clone());
            for kind in ResourceKind::ALL {
                args.push("--resource-type".to_string());
                args.push(kind.to_string());
            }
        }
        for (flag, value) in [
            ("--resource-type", &selection.resource_type),
            ("--select", &selection.select),
            ("--models", &selection.models),
            ("--exclude", &selection.exclude),
            ("--selector", &selection.selector),
            ("--state", &selection.state),
        ] {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value.clone());
            }
        }
        args.push("--output".to_string());
        args.push(output.to_string());

        let result = self.run(&args).context("failed to execute `dbt ls`")?;
        if !result.status.success() {
            bail!(
                "`dbt ls` failed:\n{}{}",
                String::from_utf8_lossy(&result.stdout),
                String::from_utf8_lossy(&result.stderr),
            );
        }
        Ok(String::from_utf8_lossy(&result.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// List the selected resources: their kinds, names, source paths and
    /// current property documents. Unsupported resource types and resources
    /// whose source file does not exist are filtered out, mirroring `dbt ls`
    /// quirks around ephemeral packages.
    pub fn list_resources(&self, selection: &SelectionArgs) -> Result<Listing> {
        if let Some(resource_type) = &selection.resource_type {
            resource_type.parse::<ResourceKind>().map_err(|e| {
                anyhow::anyhow!(e).context("unsupported value for --resource-type")
            })?;
        }

        log::info!("searching for matching resources...");
        let path_lines = self.ls_lines(selection, "path")?;
        let json_lines: Vec<String> = self
            .ls_lines(selection, "json")?
            .into_iter()
            .filter(|line| line.starts_with('{'))
            .collect();

        let mut resources = Vec::new();
        let mut compiled_sql = HashMap::new();
        let mut seen: HashSet<(ResourceKind, String)> = HashSet::new();
        for (path_line, json_line) in path_lines.iter().zip(json_lines.iter()) {
            let node: LsNode = serde_json::from_str(json_line)
                .with_context(|| format!("unexpected `dbt ls` JSON line: {json_line}"))?;
            let Ok(kind) = node.resource_type.parse::<ResourceKind>() else {
                continue;
            };
            let source_path = self.project.root.join(path_line);
            if !source_path.exists() {
                continue;
            }
            if !seen.insert((kind, node.name.clone())) {
                continue;
            }

            let name = ResourceName::from(node.name.clone());
            if kind == ResourceKind::Analysis || node.config.materialized.as_deref() == Some("ephemeral")
            {
                compiled_sql.insert(name.clone(), self.project.compiled_path.join(path_line));
            }

            let mut descriptor = ResourceDescriptor::new(kind, name, source_path);
            descriptor.patch_path = node
                .patch_path
                .as_deref()
                .map(|patch| self.resolve_patch_path(patch));
            resources.push(descriptor);
        }

        log::info!(
            "found {} matching resources in dbt project \"{}\"",
            resources.len(),
            self.project.name
        );
        Ok(Listing {
            resources,
            compiled_sql,
        })
    }

    /// dbt patch paths look like `my_project://models/schema.yml`; the part
    /// after the scheme is relative to the project root.
    fn resolve_patch_path(&self, patch: &str) -> PathBuf {
        let relative = patch.split_once("://").map(|(_, rest)| rest).unwrap_or(patch);
        self.project.root.join(relative)
    }
}

// ---------------------------------------------------------------------------
// Column inspection
// ---------------------------------------------------------------------------

/// [`ColumnInspector`] backed by `dbt run-operation _log_columns_list`.
pub struct DbtInspector<'a> {
    cli: &'a DbtCli,
    compiled_sql: HashMap<ResourceName, PathBuf>,
}

impl<'a> DbtInspector<'a> {
    pub fn new(cli: &'a DbtCli, compiled_sql: HashMap<ResourceName, PathBuf>) -> Self {
        Self { cli, compiled_sql }
    }

    fn macro_args(&self, resource: &ResourceDescriptor) -> Result<String, InspectError> {
        let args = match self.compiled_sql.get(&resource.name) {
            Some(compiled) => {
                let sql = std::fs::read_to_string(compiled).map_err(|e| InspectError::Query {
                    message: format!(
                        "missing compiled SQL at {} (run `dbt compile` first): {e}",
                        compiled.display()
                    ),
                })?;
                // Blank lines confuse dbt's arg parsing inside --args.
                let sql: Vec<&str> = sql
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .collect();
                serde_json::json!({ "sql": sql.join("\n") })
            }
            None => serde_json::json!({ "resource_name": resource.name.0 }),
        };
        serde_json::to_string(&args).map_err(|e| InspectError::Output {
            message: e.to_string(),
        })
    }
}

impl ColumnInspector for DbtInspector<'_> {
    fn columns(&self, resource: &ResourceDescriptor) -> Result<Vec<String>, InspectError> {
        let mut args = vec!["run-operation".to_string()];
        args.extend(self.cli.connection_args());
        args.push(MACRO_NAME.to_string());
        args.push("--args".to_string());
        args.push(self.macro_args(resource)?);

        let output = self.cli.run(&args).map_err(|e| InspectError::Connection {
            message: format!("failed to execute dbt: {e}"),
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let lowered = stdout.to_lowercase();
            if ["runtime error", "not", "find", MACRO_NAME]
                .iter()
                .all(|marker| lowered.contains(marker))
            {
                return Err(InspectError::Query {
                    message: format!(
                        "the {MACRO_NAME} macro is missing from the project; \
                         run `propsync echo-macro` and add it to your macro paths"
                    ),
                });
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InspectError::Query {
                message: format!("{}{}", stdout.trim(), stderr.trim()),
            });
        }

        parse_columns_output(&stdout).ok_or_else(|| InspectError::Output {
            message: format!("no column list in dbt output:\n{}", stdout.trim()),
        })
    }
}

/// The macro logs a Python-style list (`['a', 'b']`). Take the last line of
/// that shape in case dbt emitted extra output, split on `, `, strip quotes.
fn parse_columns_output(stdout: &str) -> Option<Vec<String>> {
    let list_line = stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('[') && line.ends_with(']'))
        .next_back()?;
    let inner = &list_line[1..list_line.len() - 1];
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    Some(
        inner
            .split(", ")
            .map(|column| column.trim_matches('\'').trim_matches('"').to_string())
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
