//! Full dataset load: tables, join, image enrichment.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::info;

use crate::cache::{Clock, EnrichmentCache, FileStore, KeyValueStore};
use crate::config::Config;
use crate::error::Result;
use crate::gbif::{GbifClient, OccurrenceSource};
use crate::images::{ImageOptions, ImageResolver, ImageResult};
use crate::loader::load_table;
use crate::merge::{merge_recipes, MergedRecipe};
use crate::row::Row;

/// Plant column holding the GBIF reference URL
pub const REFERENCE_COLUMN: &str = "gbif";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedPlant {
  #[serde(flatten)]
  pub row: Row,
  #[serde(rename = "gbifImage")]
  pub gbif_image: Option<ImageResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
  pub plants: Vec<EnrichedPlant>,
  pub recipes: Vec<MergedRecipe>,
}

impl Dataset {
  pub fn images_found(&self) -> usize {
    self.plants.iter().filter(|plant| plant.gbif_image.is_some()).count()
  }
}

/// Attach an image to every plant with a species reference.
///
/// `concurrency <= 1` resolves one plant at a time; larger values keep that
/// many lookups in flight. Output order always matches input order.
pub async fn enrich_plants<O, S, C>(
  resolver: &ImageResolver<O, S, C>,
  plants: Vec<Row>,
  concurrency: usize,
) -> Vec<EnrichedPlant>
where
  O: OccurrenceSource,
  S: KeyValueStore,
  C: Clock,
{
  if concurrency <= 1 {
    let mut enriched = Vec::with_capacity(plants.len());
    for row in plants {
      enriched.push(enrich_one(resolver, row).await);
    }
    return enriched;
  }

  stream::iter(plants).map(|row| enrich_one(resolver, row)).buffered(concurrency).collect().await
}

async fn enrich_one<O, S, C>(resolver: &ImageResolver<O, S, C>, row: Row) -> EnrichedPlant
where
  O: OccurrenceSource,
  S: KeyValueStore,
  C: Clock,
{
  let gbif_image = match row.text(REFERENCE_COLUMN) {
    Some(reference) => resolver.resolve_url(reference).await,
    None => None,
  };
  EnrichedPlant { row, gbif_image }
}

/// Load both tables with `client`, join them and enrich plants through `resolver`
pub async fn load_dataset_with<O, S, C>(
  client: &reqwest::Client,
  config: &Config,
  resolver: &ImageResolver<O, S, C>,
) -> Result<Dataset>
where
  O: OccurrenceSource,
  S: KeyValueStore,
  C: Clock,
{
  let plant_rows = load_table(client, &config.plants, &config.bounds).await?;
  let recipe_rows = load_table(client, &config.recipes, &config.bounds).await?;

  let recipes = merge_recipes(&recipe_rows, &plant_rows);
  info!("Merged {} recipes from {} recipe rows", recipes.len(), recipe_rows.len());

  let plants = enrich_plants(resolver, plant_rows, config.enrich_concurrency).await;
  let dataset = Dataset { plants, recipes };
  info!("Enriched {} plants, {} with images", dataset.plants.len(), dataset.images_found());

  Ok(dataset)
}

/// Full load against GBIF with the on-disk cache
pub async fn load_dataset(config: &Config) -> Result<Dataset> {
  let client = config.http_client()?;
  let resolver = default_resolver(client.clone(), config);
  load_dataset_with(&client, config, &resolver).await
}

pub fn default_resolver(client: reqwest::Client, config: &Config) -> ImageResolver<GbifClient, FileStore> {
  let source = GbifClient::new(client, &config.gbif.api_base);
  let cache = EnrichmentCache::new(FileStore::new(config.cache.resolve_dir()), config.cache.ttl());
  ImageResolver::new(source, cache, ImageOptions::from(&config.gbif))
}
