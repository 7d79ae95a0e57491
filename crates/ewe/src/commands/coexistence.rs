use anyhow::{Context, Result};
use colored::*;
use ewe_data::coexistence::CoexistenceAnalyzer;
use ewe_data::formulas::Formula;
use ewe_data::gbif::GbifClient;
use ewe_data::Config;
use std::path::{Path, PathBuf};

use super::write_json;

#[derive(Debug, Default)]
pub struct CoexistenceOptions {
  pub formulas: Option<PathBuf>,
  pub cell_size: Option<f64>,
  pub min_relaxed: Option<usize>,
  pub out: Option<PathBuf>,
}

impl CoexistenceOptions {
  pub fn apply(&self, mut config: Config) -> Config {
    if let Some(cell_size) = self.cell_size {
      config.coexistence.cell_size = cell_size;
    }
    if let Some(min_relaxed) = self.min_relaxed {
      config.coexistence.min_relaxed = min_relaxed;
    }
    config
  }
}

pub fn read_formulas(path: &Path) -> Result<Vec<Formula>> {
  let content =
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
  serde_json::from_str(&content).with_context(|| format!("Invalid formulas file {}", path.display()))
}

pub async fn execute(config: Config, options: CoexistenceOptions) -> Result<()> {
  let config = options.apply(config);
  if config.coexistence.cell_size <= 0.0 {
    anyhow::bail!("Cell size must be positive, got {}", config.coexistence.cell_size);
  }

  let formulas = match &options.formulas {
    Some(path) => read_formulas(path)?,
    None => super::formulas::report(&config).await?.formulas,
  };

  let client = config.http_client()?;
  let analyzer = CoexistenceAnalyzer::new(
    GbifClient::new(client, &config.gbif.api_base),
    config.cache.resolve_dir(),
    config.coexistence.clone(),
  );

  let results = analyzer.analyze_all(&formulas).await;
  write_json(&results, options.out.as_deref())?;

  let with_strict = results.iter().filter(|result| !result.strict_cells.is_empty()).count();
  eprintln!(
    "{} Analyzed {} formulas, {} with strict coexistence",
    "✔".green().bold(),
    results.len(),
    with_strict
  );
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_options_override_config() {
    let options =
      CoexistenceOptions { cell_size: Some(1.0), min_relaxed: Some(3), ..Default::default() };
    let config = options.apply(Config::default());
    assert_eq!(config.coexistence.cell_size, 1.0);
    assert_eq!(config.coexistence.min_relaxed, 3);
  }

  #[test]
  fn test_read_formulas_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("formulas.json");
    std::fs::write(&path, r#"[{"name": "Agbo", "plants": ["Afzelia africana"]}]"#)?;

    let formulas = read_formulas(&path)?;
    assert_eq!(formulas.len(), 1);
    assert_eq!(formulas[0].plants, vec!["Afzelia africana".to_string()]);
    Ok(())
  }

  #[tokio::test]
  async fn test_non_positive_cell_size_is_rejected() {
    let options = CoexistenceOptions { cell_size: Some(0.0), ..Default::default() };
    let result = execute(Config::default(), options).await;
    assert!(result.unwrap_err().to_string().contains("Cell size"));
  }

  #[tokio::test]
  async fn test_empty_formula_list_needs_no_network() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let formulas = temp_dir.path().join("formulas.json");
    let out = temp_dir.path().join("coexistence.json");
    std::fs::write(&formulas, "[]")?;

    let mut config = Config::default();
    config.cache.dir = Some(temp_dir.path().to_path_buf());
    let options =
      CoexistenceOptions { formulas: Some(formulas), out: Some(out.clone()), ..Default::default() };

    execute(config, options).await?;
    assert_eq!(std::fs::read_to_string(&out)?, "[]");
    Ok(())
  }
}
