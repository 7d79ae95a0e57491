//! GBIF API client.
//!
//! Covers the three endpoints the datasets need: occurrence search (images and
//! coordinates), backbone name matching and name suggestion.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DataError, Result};

pub const STILL_IMAGE: &str = "StillImage";
pub const PRESERVED_SPECIMEN: &str = "PRESERVED_SPECIMEN";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
  pub identifier: Option<String>,
  pub license: Option<String>,
  pub rights_holder: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
  #[serde(default)]
  pub media: Vec<Media>,
  pub institution_code: Option<String>,
  pub decimal_latitude: Option<f64>,
  pub decimal_longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceSearchResponse {
  #[serde(default)]
  pub results: Vec<Occurrence>,
  #[serde(default)]
  pub end_of_records: bool,
}

/// Parameters of one `occurrence/search` request
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceQuery {
  pub taxon_key: String,
  pub media_type: Option<String>,
  pub basis_of_record: Option<String>,
  pub has_coordinate: bool,
  pub limit: u32,
  pub offset: u32,
}

impl OccurrenceQuery {
  /// Still-image occurrences for a taxon
  pub fn images(taxon_key: &str, limit: u32) -> Self {
    Self {
      taxon_key: taxon_key.to_string(),
      media_type: Some(STILL_IMAGE.to_string()),
      basis_of_record: None,
      has_coordinate: false,
      limit,
      offset: 0,
    }
  }

  /// Still-image occurrences restricted to herbarium specimens
  pub fn specimen_images(taxon_key: &str, limit: u32) -> Self {
    Self { basis_of_record: Some(PRESERVED_SPECIMEN.to_string()), ..Self::images(taxon_key, limit) }
  }

  /// One page of georeferenced occurrences
  pub fn coordinates(taxon_key: &str, limit: u32, offset: u32) -> Self {
    Self {
      taxon_key: taxon_key.to_string(),
      media_type: None,
      basis_of_record: None,
      has_coordinate: true,
      limit,
      offset,
    }
  }

  pub fn to_params(&self) -> Vec<(&'static str, String)> {
    let mut params = vec![("taxonKey", self.taxon_key.clone())];
    if let Some(media_type) = &self.media_type {
      params.push(("mediaType", media_type.clone()));
    }
    if let Some(basis) = &self.basis_of_record {
      params.push(("basisOfRecord", basis.clone()));
    }
    if self.has_coordinate {
      params.push(("hasCoordinate", "true".to_string()));
    }
    params.push(("limit", self.limit.to_string()));
    if self.offset > 0 {
      params.push(("offset", self.offset.to_string()));
    }
    params
  }
}

#[async_trait]
pub trait OccurrenceSource: Send + Sync {
  async fn search_occurrences(&self, query: &OccurrenceQuery) -> Result<OccurrenceSearchResponse>;
}

/// Name → GBIF taxon key resolution
#[async_trait]
pub trait TaxonSource: Send + Sync {
  /// Backbone match; `None` when GBIF reports no match
  async fn match_name(&self, name: &str) -> Result<Option<u64>>;

  /// First key from the suggestion endpoint
  async fn suggest(&self, name: &str) -> Result<Option<u64>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NameMatch {
  usage_key: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct NameSuggestion {
  key: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct GbifClient {
  client: reqwest::Client,
  api_base: String,
}

impl GbifClient {
  pub fn new(client: reqwest::Client, api_base: impl Into<String>) -> Self {
    Self { client, api_base: api_base.into().trim_end_matches('/').to_string() }
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
    let url = format!("{}/{}", self.api_base, path);
    debug!("GET {} {:?}", url, params);

    let response = self
      .client
      .get(&url)
      .query(params)
      .send()
      .await
      .map_err(|e| DataError::fetch(&url, e.to_string()))?;

    if !response.status().is_success() {
      return Err(DataError::fetch(&url, format!("HTTP {}", response.status())));
    }

    Ok(response.json::<T>().await?)
  }
}

#[async_trait]
impl OccurrenceSource for GbifClient {
  async fn search_occurrences(&self, query: &OccurrenceQuery) -> Result<OccurrenceSearchResponse> {
    self.get_json("occurrence/search", &query.to_params()).await
  }
}

#[async_trait]
impl TaxonSource for GbifClient {
  async fn match_name(&self, name: &str) -> Result<Option<u64>> {
    let found: NameMatch = self.get_json("species/match", &[("name", name.to_string())]).await?;
    Ok(found.usage_key)
  }

  async fn suggest(&self, name: &str) -> Result<Option<u64>> {
    let found: Vec<NameSuggestion> =
      self.get_json("species/suggest", &[("q", name.to_string())]).await?;
    Ok(found.first().and_then(|suggestion| suggestion.key))
  }
}
