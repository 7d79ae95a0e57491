//! Configuration management for ewe
//!
//! Dataset locations, map bounds, GBIF endpoints and cache settings. Loaded
//! from a JSON file when one is present, otherwise defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coords::Bounds;
use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
  /// Location of the plants table (URL or path)
  #[serde(default = "default_plants")]
  pub plants: String,
  /// Location of the recipes table (URL or path)
  #[serde(default = "default_recipes")]
  pub recipes: String,
  /// Tile bounds the [-500, 500] grid is mapped onto
  #[serde(default)]
  pub bounds: Bounds,
  #[serde(default)]
  pub gbif: GbifConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub coexistence: CoexistenceConfig,
  /// Timeout applied to every HTTP request
  #[serde(default = "default_http_timeout_secs")]
  pub http_timeout_secs: u64,
  /// Number of image lookups in flight at once (1 = sequential)
  #[serde(default = "default_enrich_concurrency")]
  pub enrich_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbifConfig {
  #[serde(default = "default_api_base")]
  pub api_base: String,
  /// Results requested per occurrence search
  #[serde(default = "default_search_limit")]
  pub search_limit: u32,
  /// Image resizing proxy the display URL is routed through
  #[serde(default = "default_image_proxy")]
  pub image_proxy: String,
  /// Width and height of the resized image, in pixels
  #[serde(default = "default_image_size")]
  pub image_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
  /// Cache directory; the platform cache dir when unset
  #[serde(default)]
  pub dir: Option<PathBuf>,
  #[serde(default = "default_ttl_days")]
  pub ttl_days: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoexistenceConfig {
  /// Grid cell size in degrees
  #[serde(default = "default_cell_size")]
  pub cell_size: f64,
  /// Species required for a relaxed coexistence cell
  #[serde(default = "default_min_relaxed")]
  pub min_relaxed: usize,
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  #[serde(default = "default_max_occurrences")]
  pub max_occurrences: u32,
  /// Pause between occurrence pages, in milliseconds
  #[serde(default = "default_page_delay_ms")]
  pub page_delay_ms: u64,
}

fn default_plants() -> String {
  "plants.tsv".to_string()
}
fn default_recipes() -> String {
  "recipe.tsv".to_string()
}
fn default_http_timeout_secs() -> u64 {
  30
}
fn default_enrich_concurrency() -> usize {
  1
}
fn default_api_base() -> String {
  "https://api.gbif.org/v1".to_string()
}
fn default_search_limit() -> u32 {
  10
}
fn default_image_proxy() -> String {
  "https://images.weserv.nl/".to_string()
}
fn default_image_size() -> u32 {
  400
}
fn default_ttl_days() -> u64 {
  7
}
fn default_cell_size() -> f64 {
  0.5
}
fn default_min_relaxed() -> usize {
  2
}
fn default_page_size() -> u32 {
  300
}
fn default_max_occurrences() -> u32 {
  3000
}
fn default_page_delay_ms() -> u64 {
  200
}

impl Default for GbifConfig {
  fn default() -> Self {
    Self {
      api_base: default_api_base(),
      search_limit: default_search_limit(),
      image_proxy: default_image_proxy(),
      image_size: default_image_size(),
    }
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self { dir: None, ttl_days: default_ttl_days() }
  }
}

impl Default for CoexistenceConfig {
  fn default() -> Self {
    Self {
      cell_size: default_cell_size(),
      min_relaxed: default_min_relaxed(),
      page_size: default_page_size(),
      max_occurrences: default_max_occurrences(),
      page_delay_ms: default_page_delay_ms(),
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      plants: default_plants(),
      recipes: default_recipes(),
      bounds: Bounds::default(),
      gbif: GbifConfig::default(),
      cache: CacheConfig::default(),
      coexistence: CoexistenceConfig::default(),
      http_timeout_secs: default_http_timeout_secs(),
      enrich_concurrency: default_enrich_concurrency(),
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_days.saturating_mul(24 * 60 * 60))
  }

  /// Configured directory, else `<platform cache dir>/ewe`
  pub fn resolve_dir(&self) -> PathBuf {
    match &self.dir {
      Some(dir) => dir.clone(),
      None => dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")).join("ewe"),
    }
  }
}

impl Config {
  /// Load configuration from a file
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
  }

  /// Load configuration from current directory or defaults
  pub fn load() -> Result<Self> {
    let config_paths = [".ewe.json", "ewe.json", ".ewe/config.json"];

    for path in &config_paths {
      if Path::new(path).exists() {
        return Self::load_from_file(path);
      }
    }

    Ok(Config::default())
  }

  /// Save configuration to a file
  pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(self)?;
    std::fs::write(path, content)?;
    Ok(())
  }

  pub fn http_timeout(&self) -> Duration {
    Duration::from_secs(self.http_timeout_secs)
  }

  /// Shared HTTP client honoring the configured timeout
  pub fn http_client(&self) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
      .timeout(self.http_timeout())
      .user_agent(concat!("ewe/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(client)
  }
}
