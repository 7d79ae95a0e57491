//! Geographic coexistence of the species in each formula.
//!
//! Botanical names are resolved to GBIF taxon keys, their georeferenced
//! occurrences are binned into a lon/lat grid, and each formula gets the
//! cells where all of its species occur (strict) and the cells shared by at
//! least `min_relaxed` species (relaxed).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::CoexistenceConfig;
use crate::error::Result;
use crate::formulas::Formula;
use crate::gbif::{OccurrenceQuery, OccurrenceSource, TaxonSource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoexistenceResult {
  pub name: String,
  pub strict_cells: Vec<String>,
  pub relaxed_cells: Vec<String>,
  pub species_layers: BTreeMap<String, Vec<String>>,
}

fn capitalize(word: &str) -> String {
  let mut chars = word.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
    None => String::new(),
  }
}

fn is_unspecified_epithet(word: &str) -> bool {
  matches!(word.to_lowercase().as_str(), "sp" | "sp." | "spp" | "spp.")
}

/// Normalize a botanical name to "Genus epithet" form.
///
/// Names with an unspecified epithet (`sp.`) reduce to the genus.
pub fn clean_name(name: &str) -> Option<String> {
  let words: Vec<&str> = name.split_whitespace().collect();
  match words.as_slice() {
    [] => None,
    [genus, rest @ ..] if rest.iter().any(|word| is_unspecified_epithet(word)) => {
      Some(capitalize(genus))
    }
    [genus, epithet, ..] => Some(format!("{} {}", capitalize(genus), epithet.to_lowercase())),
    [single] => Some(capitalize(single)),
  }
}

/// Grid cell containing a point, as `"x:y"` cell indices
pub fn cell_id(lon: f64, lat: f64, size: f64) -> String {
  format!("{}:{}", (lon / size).floor() as i64, (lat / size).floor() as i64)
}

pub struct CoexistenceAnalyzer<G>
where
  G: TaxonSource + OccurrenceSource,
{
  gbif: G,
  cache_dir: PathBuf,
  options: CoexistenceConfig,
}

impl<G> CoexistenceAnalyzer<G>
where
  G: TaxonSource + OccurrenceSource,
{
  /// Occurrences are cached under `<cache_dir>/occ_cache`
  pub fn new(gbif: G, cache_dir: impl AsRef<Path>, options: CoexistenceConfig) -> Self {
    Self { gbif, cache_dir: cache_dir.as_ref().join("occ_cache"), options }
  }

  pub fn gbif(&self) -> &G {
    &self.gbif
  }

  /// Backbone match first, then the first suggestion
  pub async fn resolve_taxon(&self, name: &str) -> Result<Option<u64>> {
    let Some(cleaned) = clean_name(name) else {
      return Ok(None);
    };

    if let Some(key) = self.gbif.match_name(&cleaned).await? {
      return Ok(Some(key));
    }
    self.gbif.suggest(&cleaned).await
  }

  fn cache_file(&self, taxon_key: u64) -> PathBuf {
    self.cache_dir.join(format!("{taxon_key}.json"))
  }

  /// `[lon, lat]` pairs for a taxon, from the cache or paged from GBIF
  pub async fn occurrences(&self, taxon_key: u64) -> Result<Vec<[f64; 2]>> {
    let cache_file = self.cache_file(taxon_key);
    if cache_file.exists() {
      let content = tokio::fs::read_to_string(&cache_file).await?;
      return Ok(serde_json::from_str(&content)?);
    }

    info!("Fetching occurrences for {}", taxon_key);
    let key = taxon_key.to_string();
    let page_size = self.options.page_size.max(1);
    let mut points = Vec::new();
    let mut offset = 0;

    while offset < self.options.max_occurrences {
      let page =
        self.gbif.search_occurrences(&OccurrenceQuery::coordinates(&key, page_size, offset)).await?;

      points.extend(
        page
          .results
          .iter()
          .filter_map(|occurrence| Some([occurrence.decimal_longitude?, occurrence.decimal_latitude?])),
      );

      if (page.results.len() as u32) < page_size {
        break;
      }
      offset += page_size;
      if self.options.page_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(self.options.page_delay_ms)).await;
      }
    }

    tokio::fs::create_dir_all(&self.cache_dir).await?;
    tokio::fs::write(&cache_file, serde_json::to_string(&points)?).await?;
    Ok(points)
  }

  /// Cells occupied by one species; `None` when it cannot be resolved
  async fn species_cells(&self, species: &str) -> Option<BTreeSet<String>> {
    let key = match self.resolve_taxon(species).await {
      Ok(Some(key)) => key,
      Ok(None) => {
        warn!("No taxonKey for {}", species);
        return None;
      }
      Err(e) => {
        warn!("Taxon lookup failed for {}: {}", species, e);
        return None;
      }
    };
    info!("{} → taxonKey {}", species, key);

    match self.occurrences(key).await {
      Ok(points) => Some(
        points.iter().map(|[lon, lat]| cell_id(*lon, *lat, self.options.cell_size)).collect(),
      ),
      Err(e) => {
        warn!("Occurrence download failed for {}: {}", species, e);
        None
      }
    }
  }

  pub async fn analyze(&self, formula: &Formula) -> CoexistenceResult {
    info!("Analyzing formula {}", formula.name);

    let mut layers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for species in &formula.plants {
      if let Some(cells) = self.species_cells(species).await {
        if !cells.is_empty() {
          layers.insert(species.clone(), cells);
        }
      }
    }

    coexistence(&formula.name, layers, self.options.min_relaxed)
  }

  pub async fn analyze_all(&self, formulas: &[Formula]) -> Vec<CoexistenceResult> {
    let mut results = Vec::with_capacity(formulas.len());
    for formula in formulas {
      results.push(self.analyze(formula).await);
    }
    results
  }
}

/// Strict and relaxed coexistence over per-species cell sets
pub fn coexistence(
  name: &str,
  layers: BTreeMap<String, BTreeSet<String>>,
  min_relaxed: usize,
) -> CoexistenceResult {
  let strict: BTreeSet<String> = layers
    .values()
    .cloned()
    .reduce(|shared, cells| shared.intersection(&cells).cloned().collect())
    .unwrap_or_default();

  let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
  for cells in layers.values() {
    for cell in cells {
      *counts.entry(cell.as_str()).or_default() += 1;
    }
  }
  let relaxed = counts
    .into_iter()
    .filter(|(_, count)| *count >= min_relaxed)
    .map(|(cell, _)| cell.to_string())
    .collect();

  CoexistenceResult {
    name: name.to_string(),
    strict_cells: strict.into_iter().collect(),
    relaxed_cells: relaxed,
    species_layers: layers
      .into_iter()
      .map(|(species, cells)| (species, cells.into_iter().collect()))
      .collect(),
  }
}
