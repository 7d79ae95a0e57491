use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
  #[error("Failed to fetch {location}: {message}")]
  Fetch { location: String, message: String },

  #[error("Failed to read {location}: {source}")]
  Read { location: String, source: std::io::Error },

  #[error("Failed to parse {location}: {message}")]
  Parse { location: String, message: String },

  #[error("HTTP request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Storage error: {message}")]
  Storage { message: String },
}

impl DataError {
  pub fn fetch(location: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Fetch { location: location.into(), message: message.into() }
  }

  pub fn read(location: impl Into<String>, source: std::io::Error) -> Self {
    Self::Read { location: location.into(), source }
  }

  pub fn parse(location: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Parse { location: location.into(), message: message.into() }
  }

  pub fn storage(message: impl Into<String>) -> Self {
    Self::Storage { message: message.into() }
  }

  /// The dataset location a structural error refers to, if any
  pub fn location(&self) -> Option<&str> {
    match self {
      DataError::Fetch { location, .. }
      | DataError::Read { location, .. }
      | DataError::Parse { location, .. } => Some(location),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fetch_error_names_location() {
    let error = DataError::fetch("https://example.org/plants.tsv", "HTTP 404 Not Found");
    assert_eq!(error.location(), Some("https://example.org/plants.tsv"));
    assert!(error.to_string().contains("plants.tsv"));
    assert!(error.to_string().contains("404"));
  }

  #[test]
  fn test_storage_error_has_no_location() {
    let error = DataError::storage("quota exceeded");
    assert_eq!(error.location(), None);
  }
}
