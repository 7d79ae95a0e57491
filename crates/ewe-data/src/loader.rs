//! Tab-separated table loading.
//!
//! A table is fetched in one round trip (or read from disk for local paths),
//! then parsed synchronously. Rows carrying `X`/`Y` cells have those cells
//! remapped onto the configured tile bounds.

use tracing::{debug, info};
use url::Url;

use crate::coords::Bounds;
use crate::error::{DataError, Result};
use crate::row::{Numeric, Row, Value, X_COLUMN, Y_COLUMN};

/// Fetch and parse a table from an HTTP(S) URL or a local path
pub async fn load_table(client: &reqwest::Client, location: &str, bounds: &Bounds) -> Result<Vec<Row>> {
  let text = read_source(client, location).await?;
  let rows = parse_table(location, &text, bounds)?;
  info!("Loaded {} rows from {}", rows.len(), location);
  Ok(rows)
}

fn is_remote(location: &str) -> bool {
  Url::parse(location).map(|url| matches!(url.scheme(), "http" | "https")).unwrap_or(false)
}

async fn read_source(client: &reqwest::Client, location: &str) -> Result<String> {
  if !is_remote(location) {
    debug!("Reading table from disk: {}", location);
    return tokio::fs::read_to_string(location).await.map_err(|e| DataError::read(location, e));
  }

  let response =
    client.get(location).send().await.map_err(|e| DataError::fetch(location, e.to_string()))?;

  if !response.status().is_success() {
    return Err(DataError::fetch(location, format!("HTTP {}", response.status())));
  }

  response.text().await.map_err(|e| DataError::fetch(location, e.to_string()))
}

/// Parse tab-delimited text with a header row into rows.
///
/// Blank lines are skipped. Short rows omit their missing cells and extra
/// cells are dropped. The whole table parses or nothing is returned.
pub fn parse_table(location: &str, text: &str, bounds: &Bounds) -> Result<Vec<Row>> {
  let mut reader = csv::ReaderBuilder::new()
    .delimiter(b'\t')
    .has_headers(true)
    .flexible(true)
    .from_reader(text.as_bytes());

  let headers = reader.headers().map_err(|e| DataError::parse(location, e.to_string()))?.clone();

  let mut rows = Vec::new();
  for record in reader.records() {
    let record = record.map_err(|e| DataError::parse(location, e.to_string()))?;
    if record.iter().all(str::is_empty) {
      continue;
    }

    let mut row: Row = headers
      .iter()
      .zip(record.iter())
      .map(|(header, cell)| (header.to_string(), Value::from(cell)))
      .collect();

    map_coordinates(&mut row, bounds);
    rows.push(row);
  }

  Ok(rows)
}

/// Overwrite non-empty `X`/`Y` cells with their mapped geographic value
pub fn map_coordinates(row: &mut Row, bounds: &Bounds) {
  if let Some(x) = non_empty_text(row, X_COLUMN) {
    let mapped = bounds.map_x_numeric(Numeric::parse_leading(&x));
    row.insert(X_COLUMN, Value::Number(mapped));
  }
  if let Some(y) = non_empty_text(row, Y_COLUMN) {
    let mapped = bounds.map_y_numeric(Numeric::parse_leading(&y));
    row.insert(Y_COLUMN, Value::Number(mapped));
  }
}

fn non_empty_text(row: &Row, column: &str) -> Option<String> {
  row.text(column).filter(|text| !text.is_empty()).map(str::to_string)
}
