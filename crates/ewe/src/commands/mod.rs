pub mod coexistence;
pub mod formulas;
pub mod load;

use anyhow::{Context, Result};
use ewe_data::Config;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Explicit config file, else the default search; `cache_dir` overrides the file
pub fn resolve_config(config_path: Option<&Path>, cache_dir: Option<&Path>) -> Result<Config> {
  let mut config = match config_path {
    Some(path) => Config::load_from_file(path)
      .with_context(|| format!("Failed to load config from {}", path.display()))?,
    None => Config::load().context("Failed to load config")?,
  };

  if let Some(dir) = cache_dir {
    config.cache.dir = Some(dir.to_path_buf());
  }
  debug!("Cache directory: {}", config.cache.resolve_dir().display());

  Ok(config)
}

/// Pretty JSON to `out`, or to stdout when no file is given
pub fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
  match out {
    Some(path) => {
      std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?
    }
    None => println!("{json}"),
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_cache_dir_overrides_config_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("ewe.json");
    std::fs::write(&config_path, r#"{"plants": "p.tsv", "cache": {"dir": "/from/file"}}"#)?;

    let config = resolve_config(Some(config_path.as_path()), Some(Path::new("/from/flag")))?;
    assert_eq!(config.plants, "p.tsv");
    assert_eq!(config.cache.dir.as_deref(), Some(Path::new("/from/flag")));
    Ok(())
  }

  #[test]
  fn test_missing_config_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = resolve_config(Some(temp_dir.path().join("absent.json").as_path()), None);
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("absent.json"));
  }

  #[test]
  fn test_write_json_to_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let out = temp_dir.path().join("out.json");

    write_json(&vec!["a", "b"], Some(out.as_path()))?;
    let written: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&out)?)?;
    assert_eq!(written, vec!["a".to_string(), "b".to_string()]);
    Ok(())
  }
}
