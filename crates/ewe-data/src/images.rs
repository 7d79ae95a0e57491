//! Representative plant images from GBIF occurrences.
//!
//! Herbarium specimens are preferred; any still image is the fallback. Every
//! outcome, including "no image", is cached so repeat lookups stay offline
//! until the entry expires.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{Clock, EnrichmentCache, KeyValueStore, SystemClock};
use crate::config::GbifConfig;
use crate::error::Result;
use crate::gbif::{Media, Occurrence, OccurrenceQuery, OccurrenceSource};

pub const CACHE_PREFIX: &str = "gbif_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
  Herbarium,
  Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
  /// Resized image served through the proxy
  pub url: String,
  pub original: String,
  pub source: ImageSource,
  pub license: Option<String>,
  pub rights_holder: Option<String>,
  pub institution: Option<String>,
}

fn species_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"species/(\d+)").expect("species pattern is valid"))
}

/// Numeric GBIF species key following `species/` in a reference URL
pub fn species_key_from_url(reference: &str) -> Option<String> {
  species_pattern().captures(reference).map(|captures| captures[1].to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
  pub search_limit: u32,
  pub image_proxy: String,
  pub image_size: u32,
}

impl From<&GbifConfig> for ImageOptions {
  fn from(config: &GbifConfig) -> Self {
    Self {
      search_limit: config.search_limit,
      image_proxy: config.image_proxy.clone(),
      image_size: config.image_size,
    }
  }
}

impl Default for ImageOptions {
  fn default() -> Self {
    Self::from(&GbifConfig::default())
  }
}

impl ImageOptions {
  /// Route `original` through the resizing proxy, fitted inside a square
  pub fn display_url(&self, original: &str) -> String {
    match Url::parse(&self.image_proxy) {
      Ok(mut url) => {
        let size = self.image_size.to_string();
        url
          .query_pairs_mut()
          .append_pair("url", original)
          .append_pair("w", &size)
          .append_pair("h", &size)
          .append_pair("fit", "contain");
        url.to_string()
      }
      Err(e) => {
        warn!("Invalid image proxy {}: {}", self.image_proxy, e);
        original.to_string()
      }
    }
  }
}

pub struct ImageResolver<O, S, C = SystemClock>
where
  O: OccurrenceSource,
  S: KeyValueStore,
  C: Clock,
{
  source: O,
  cache: EnrichmentCache<S, C>,
  options: ImageOptions,
}

impl<O, S, C> ImageResolver<O, S, C>
where
  O: OccurrenceSource,
  S: KeyValueStore,
  C: Clock,
{
  pub fn new(source: O, cache: EnrichmentCache<S, C>, options: ImageOptions) -> Self {
    Self { source, cache, options }
  }

  pub fn cache(&self) -> &EnrichmentCache<S, C> {
    &self.cache
  }

  pub fn source(&self) -> &O {
    &self.source
  }

  /// Resolve the image for the species referenced by `reference`; no network
  /// call is made when the URL carries no species key
  pub async fn resolve_url(&self, reference: &str) -> Option<ImageResult> {
    let species_key = species_key_from_url(reference)?;
    self.resolve(&species_key).await
  }

  pub async fn resolve(&self, species_key: &str) -> Option<ImageResult> {
    let cache_key = format!("{CACHE_PREFIX}{species_key}");

    if let Some(cached) = self.cache.get::<ImageResult>(&cache_key).await {
      debug!("Image cache hit for {}", cache_key);
      return cached;
    }

    let result = match self.search(species_key).await {
      Ok(result) => result,
      Err(e) => {
        warn!("Image lookup failed for species {}: {}", species_key, e);
        None
      }
    };

    self.cache.set(&cache_key, result.as_ref()).await;
    result
  }

  async fn search(&self, species_key: &str) -> Result<Option<ImageResult>> {
    let limit = self.options.search_limit;

    let specimens =
      self.source.search_occurrences(&OccurrenceQuery::specimen_images(species_key, limit)).await?;
    if let Some((occurrence, media)) = first_with_media(&specimens.results) {
      return Ok(Some(self.build(occurrence, media, ImageSource::Herbarium)));
    }

    let any = self.source.search_occurrences(&OccurrenceQuery::images(species_key, limit)).await?;
    if let Some((occurrence, media)) = first_with_media(&any.results) {
      return Ok(Some(self.build(occurrence, media, ImageSource::Other)));
    }

    debug!("No image found for species {}", species_key);
    Ok(None)
  }

  fn build(&self, occurrence: &Occurrence, media: &Media, source: ImageSource) -> ImageResult {
    let original = media.identifier.clone().unwrap_or_default();
    ImageResult {
      url: self.options.display_url(&original),
      original,
      source,
      license: media.license.clone(),
      rights_holder: media.rights_holder.clone(),
      institution: occurrence.institution_code.clone(),
    }
  }
}

/// First occurrence with a media entry that carries an image identifier
fn first_with_media(results: &[Occurrence]) -> Option<(&Occurrence, &Media)> {
  results.iter().find_map(|occurrence| {
    occurrence
      .media
      .iter()
      .find(|media| media.identifier.as_deref().is_some_and(|id| !id.is_empty()))
      .map(|media| (occurrence, media))
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{ManualClock, MemoryStore};
  use crate::error::DataError;
  use crate::gbif::OccurrenceSearchResponse;
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use std::time::Duration;

  const TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

  /// Scripted occurrence source answering specimen and open queries separately
  #[derive(Default)]
  struct ScriptedSource {
    specimens: Vec<Occurrence>,
    others: Vec<Occurrence>,
    fail: bool,
    calls: AtomicUsize,
    queries: Mutex<Vec<OccurrenceQuery>>,
  }

  impl ScriptedSource {
    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl OccurrenceSource for ScriptedSource {
    async fn search_occurrences(&self, query: &OccurrenceQuery) -> Result<OccurrenceSearchResponse> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.queries.lock().unwrap().push(query.clone());
      if self.fail {
        return Err(DataError::fetch("https://api.gbif.org/v1/occurrence/search", "HTTP 500"));
      }
      let results = if query.basis_of_record.is_some() {
        self.specimens.clone()
      } else {
        self.others.clone()
      };
      Ok(OccurrenceSearchResponse { results, end_of_records: true })
    }
  }

  fn occurrence(identifier: &str, institution: &str) -> Occurrence {
    Occurrence {
      media: vec![Media {
        identifier: Some(identifier.to_string()),
        license: Some("CC-BY-4.0".to_string()),
        rights_holder: Some("Herbarium".to_string()),
      }],
      institution_code: Some(institution.to_string()),
      ..Default::default()
    }
  }

  fn resolver(source: ScriptedSource) -> ImageResolver<ScriptedSource, MemoryStore, ManualClock> {
    let cache = EnrichmentCache::with_clock(MemoryStore::new(), ManualClock::at(0), TTL);
    ImageResolver::new(source, cache, ImageOptions::default())
  }

  #[test]
  fn test_species_key_from_url() {
    assert_eq!(species_key_from_url("https://www.gbif.org/species/2927303"), Some("2927303".into()));
    assert_eq!(species_key_from_url("https://gbif.org/species/12/metrics"), Some("12".into()));
    assert_eq!(species_key_from_url("https://gbif.org/species/abc"), None);
    assert_eq!(species_key_from_url("https://example.org/plant/5"), None);
  }

  #[test]
  fn test_display_url_goes_through_proxy() {
    let url = ImageOptions::default().display_url("https://img.example.org/a b.jpg");
    let parsed = Url::parse(&url).unwrap();
    assert_eq!(parsed.host_str(), Some("images.weserv.nl"));
    let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    assert_eq!(
      pairs,
      vec![
        ("url".to_string(), "https://img.example.org/a b.jpg".to_string()),
        ("w".to_string(), "400".to_string()),
        ("h".to_string(), "400".to_string()),
        ("fit".to_string(), "contain".to_string()),
      ]
    );
  }

  #[tokio::test]
  async fn test_herbarium_preferred() {
    let source = ScriptedSource {
      specimens: vec![Occurrence::default(), occurrence("https://img/specimen.jpg", "K")],
      others: vec![occurrence("https://img/other.jpg", "iNat")],
      ..Default::default()
    };
    let resolver = resolver(source);

    let image = resolver.resolve("2927303").await.unwrap();
    assert_eq!(image.source, ImageSource::Herbarium);
    assert_eq!(image.original, "https://img/specimen.jpg");
    assert_eq!(image.institution.as_deref(), Some("K"));
    assert_eq!(resolver.source().calls(), 1);
  }

  #[tokio::test]
  async fn test_falls_back_to_any_image() {
    let source =
      ScriptedSource { others: vec![occurrence("https://img/other.jpg", "iNat")], ..Default::default() };
    let resolver = resolver(source);

    let image = resolver.resolve("5").await.unwrap();
    assert_eq!(image.source, ImageSource::Other);
    assert_eq!(resolver.source().calls(), 2);

    let queries = resolver.source().queries.lock().unwrap().clone();
    assert_eq!(queries[0].basis_of_record.as_deref(), Some("PRESERVED_SPECIMEN"));
    assert_eq!(queries[1].basis_of_record, None);
  }

  #[tokio::test]
  async fn test_no_image_is_cached() {
    let resolver = resolver(ScriptedSource::default());

    assert_eq!(resolver.resolve("7").await, None);
    assert_eq!(resolver.source().calls(), 2);

    assert_eq!(resolver.resolve("7").await, None);
    assert_eq!(resolver.source().calls(), 2);
  }

  #[tokio::test]
  async fn test_cached_hit_skips_network() {
    let source = ScriptedSource {
      specimens: vec![occurrence("https://img/specimen.jpg", "K")],
      ..Default::default()
    };
    let resolver = resolver(source);

    let first = resolver.resolve("9").await;
    let second = resolver.resolve("9").await;
    assert_eq!(first, second);
    assert_eq!(resolver.source().calls(), 1);
  }

  #[tokio::test]
  async fn test_expired_entry_refetches() {
    let source = ScriptedSource {
      specimens: vec![occurrence("https://img/specimen.jpg", "K")],
      ..Default::default()
    };
    let resolver = resolver(source);

    resolver.resolve("9").await;
    resolver.cache().clock().advance(TTL + Duration::from_millis(1));
    resolver.resolve("9").await;
    assert_eq!(resolver.source().calls(), 2);
  }

  #[tokio::test]
  async fn test_provider_failure_degrades_to_none() {
    let resolver = resolver(ScriptedSource { fail: true, ..Default::default() });
    assert_eq!(resolver.resolve("11").await, None);
    assert_eq!(resolver.cache().get::<ImageResult>("gbif_11").await, Some(None));
  }

  #[tokio::test]
  async fn test_url_without_species_key_makes_no_call() {
    let resolver = resolver(ScriptedSource::default());
    assert_eq!(resolver.resolve_url("https://example.org/no-key").await, None);
    assert_eq!(resolver.source().calls(), 0);
    assert!(resolver.cache().store().is_empty());
  }

  #[test]
  fn test_image_result_serialized_shape() {
    let image = ImageResult {
      url: "https://images.weserv.nl/?url=x".to_string(),
      original: "x".to_string(),
      source: ImageSource::Herbarium,
      license: None,
      rights_holder: Some("Kew".to_string()),
      institution: Some("K".to_string()),
    };
    let value = serde_json::to_value(&image).unwrap();
    assert_eq!(value["source"], "herbarium");
    assert_eq!(value["rightsHolder"], "Kew");
    assert_eq!(value["institution"], "K");
  }
}
