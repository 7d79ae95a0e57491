use anyhow::{Context, Result};
use colored::*;
use ewe_data::{load_dataset, Config};
use std::path::PathBuf;

use super::write_json;

#[derive(Debug, Default)]
pub struct LoadOptions {
  pub plants: Option<String>,
  pub recipes: Option<String>,
  pub concurrency: Option<usize>,
  pub out: Option<PathBuf>,
}

impl LoadOptions {
  /// Command line values take precedence over the config file
  pub fn apply(&self, mut config: Config) -> Config {
    if let Some(plants) = &self.plants {
      config.plants = plants.clone();
    }
    if let Some(recipes) = &self.recipes {
      config.recipes = recipes.clone();
    }
    if let Some(concurrency) = self.concurrency {
      config.enrich_concurrency = concurrency;
    }
    config
  }
}

pub async fn execute(config: Config, options: LoadOptions) -> Result<()> {
  let config = options.apply(config);

  let dataset = load_dataset(&config).await.context("Failed to load dataset")?;
  write_json(&dataset, options.out.as_deref())?;

  eprintln!(
    "{} {} plants ({} with images), {} recipes",
    "✔".green().bold(),
    dataset.plants.len(),
    dataset.images_found(),
    dataset.recipes.len()
  );
  Ok(())
}
