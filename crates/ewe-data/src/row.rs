//! Row model shared by the loader, the merger and the exporters.
//!
//! A row maps column names to cell values. Cells start out as text and the
//! coordinate columns are rewritten into numbers by the loader. A number that
//! failed to parse is kept as [`Numeric::Invalid`] instead of being rejected.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const X_COLUMN: &str = "X";
pub const Y_COLUMN: &str = "Y";

/// A parsed number, or the marker left behind by unparsable input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
  Valid(f64),
  Invalid,
}

fn number_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
      .expect("number pattern is valid")
  })
}

fn parse_decimal(text: &str) -> Numeric {
  text.parse::<f64>().map(Numeric::Valid).unwrap_or(Numeric::Invalid)
}

impl Numeric {
  /// The whole trimmed text must be a decimal number (or `Infinity`)
  pub fn parse(text: &str) -> Self {
    let text = text.trim();
    match number_pattern().find(text) {
      Some(found) if found.end() == text.len() => parse_decimal(text),
      _ => Numeric::Invalid,
    }
  }

  /// Longest decimal prefix after leading whitespace; trailing text such as
  /// units is ignored
  pub fn parse_leading(text: &str) -> Self {
    match number_pattern().find(text.trim_start()) {
      Some(found) => parse_decimal(found.as_str()),
      None => Numeric::Invalid,
    }
  }

  /// Apply `f` to a valid number; invalid stays invalid
  pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
    match self {
      Numeric::Valid(value) => Numeric::Valid(f(value)),
      Numeric::Invalid => Numeric::Invalid,
    }
  }
}

impl Serialize for Numeric {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Numeric::Valid(value) if value.is_finite() => serializer.serialize_f64(*value),
      _ => serializer.serialize_none(),
    }
  }
}

impl<'de> Deserialize<'de> for Numeric {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(Numeric::Valid).unwrap_or(Numeric::Invalid))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Number(Numeric),
  Text(String),
}

impl Value {
  pub fn as_text(&self) -> Option<&str> {
    match self {
      Value::Text(text) => Some(text),
      Value::Number(_) => None,
    }
  }

  /// Loose numeric coercion: blank text is zero, anything else is parsed
  /// or invalid.
  pub fn to_numeric(&self) -> Numeric {
    match self {
      Value::Number(number) => *number,
      Value::Text(text) if text.trim().is_empty() => Numeric::Valid(0.0),
      Value::Text(text) => Numeric::parse(text),
    }
  }
}

impl From<&str> for Value {
  fn from(text: &str) -> Self {
    Value::Text(text.to_string())
  }
}

impl From<String> for Value {
  fn from(text: String) -> Self {
    Value::Text(text)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Value::Number(Numeric::Valid(value))
  }
}

/// One record from a tab-separated source, keyed by column header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
  cells: BTreeMap<String, Value>,
}

impl Row {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, column: &str) -> Option<&Value> {
    self.cells.get(column)
  }

  /// Text of a column, `None` when absent or numeric
  pub fn text(&self, column: &str) -> Option<&str> {
    self.cells.get(column).and_then(Value::as_text)
  }

  /// Trimmed text of a column, `None` when absent or empty after trimming
  pub fn trimmed(&self, column: &str) -> Option<&str> {
    self.text(column).map(str::trim).filter(|text| !text.is_empty())
  }

  pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
    self.cells.insert(column.into(), value.into());
  }

  pub fn contains(&self, column: &str) -> bool {
    self.cells.contains_key(column)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.cells.iter()
  }

  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }

  /// Builder used by tests and fixtures
  pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
    self.insert(column, value);
    self
  }
}

impl FromIterator<(String, Value)> for Row {
  fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
    Self { cells: iter.into_iter().collect() }
  }
}

impl IntoIterator for Row {
  type Item = (String, Value);
  type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

  fn into_iter(self) -> Self::IntoIter {
    self.cells.into_iter()
  }
}
