use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn propsync_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("propsync"))
}

#[test]
fn help_lists_subcommands() {
    propsync_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("update"))
        .stdout(contains("delete"))
        .stdout(contains("migrate"))
        .stdout(contains("echo-macro"));
}

#[test]
fn echo_macro_prints_the_helper_macro() {
    propsync_cmd()
        .arg("echo-macro")
        .assert()
        .success()
        .stdout(contains("macro _log_columns_list"))
        .stdout(contains("endmacro"));
}

#[test]
fn update_outside_a_dbt_project_fails_with_a_clear_message() {
    let dir = TempDir::new().expect("tempdir");
    propsync_cmd()
        .current_dir(dir.path())
        .args(["update", "--project-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("dbt_project.yml"));
}

#[test]
fn delete_outside_a_dbt_project_fails_before_prompting() {
    let dir = TempDir::new().expect("tempdir");
    propsync_cmd()
        .current_dir(dir.path())
        .args(["delete", "--yes", "--project-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("dbt_project.yml"));
}

#[test]
fn invalid_resource_type_is_rejected_without_running_dbt() {
    // The project file exists but the flag is validated before `dbt ls` runs.
    let dir = TempDir::new().expect("tempdir");
    write_project_file(dir.path());
    propsync_cmd()
        .current_dir(dir.path())
        .args(["update", "--resource-type", "exposure", "--project-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("resource-type"));
}

fn write_project_file(dir: &Path) {
    std::fs::write(dir.join("dbt_project.yml"), "name: shop\n").expect("write dbt_project.yml");
}
