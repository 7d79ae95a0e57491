use anyhow::{Context, Result};
use colored::*;
use ewe_data::formulas::{build_formulas, FormulaReport};
use ewe_data::loader::load_table;
use ewe_data::Config;
use std::path::Path;

use super::write_json;

/// Load both tables and build the formula report
pub async fn report(config: &Config) -> Result<FormulaReport> {
  let client = config.http_client()?;
  let plants = load_table(&client, &config.plants, &config.bounds)
    .await
    .context("Failed to load plants table")?;
  let recipes = load_table(&client, &config.recipes, &config.bounds)
    .await
    .context("Failed to load recipes table")?;

  Ok(build_formulas(&recipes, &plants))
}

pub async fn execute(config: &Config, out: Option<&Path>) -> Result<()> {
  let report = report(config).await?;
  write_json(&report.formulas, out)?;

  eprintln!("{} Created {} formulas", "✔".green().bold(), report.formulas.len());
  if !report.unmapped.is_empty() {
    eprintln!(
      "{} {} plant names have no botanical mapping",
      "⚠".yellow().bold(),
      report.unmapped.len()
    );
  }
  Ok(())
}
