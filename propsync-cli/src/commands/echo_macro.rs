//! `propsync echo-macro` — print the helper macro for the user to paste
//! into their dbt project.

use anyhow::Result;

use crate::dbt::MACRO_SQL;

pub fn run() -> Result<()> {
    println!("Copy and paste the following macro into your dbt project:\n");
    println!("{MACRO_SQL}");
    Ok(())
}
