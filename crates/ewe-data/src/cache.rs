//! Best-effort TTL cache for enrichment results.
//!
//! Entries are stored as a JSON envelope `{time, data}` in a pluggable
//! key-value store. Expiry is measured from write time; reads never extend an
//! entry's life. Storage failures degrade to a miss (reads) or are dropped
//! (writes), so the cache is never a correctness dependency.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{DataError, Result};

/// Persistent text storage behind the cache
#[async_trait]
pub trait KeyValueStore: Send + Sync {
  async fn get(&self, key: &str) -> Result<Option<String>>;
  async fn set(&self, key: &str, value: &str) -> Result<()>;
  async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store, mostly for tests
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
    self.entries.lock().map_err(|e| DataError::storage(format!("store lock poisoned: {e}")))
  }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
  async fn get(&self, key: &str) -> Result<Option<String>> {
    Ok(self.lock()?.get(key).cloned())
  }

  async fn set(&self, key: &str, value: &str) -> Result<()> {
    self.lock()?.insert(key.to_string(), value.to_string());
    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<()> {
    self.lock()?.remove(key);
    Ok(())
  }
}

/// One JSON file per key under a cache directory
#[derive(Debug, Clone)]
pub struct FileStore {
  dir: PathBuf,
}

impl FileStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn path_for(&self, key: &str) -> PathBuf {
    let file_name: String = key
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
      .collect();
    self.dir.join(format!("{file_name}.json"))
  }
}

#[async_trait]
impl KeyValueStore for FileStore {
  async fn get(&self, key: &str) -> Result<Option<String>> {
    match tokio::fs::read_to_string(self.path_for(key)).await {
      Ok(raw) => Ok(Some(raw)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  async fn set(&self, key: &str, value: &str) -> Result<()> {
    tokio::fs::create_dir_all(&self.dir).await?;
    tokio::fs::write(self.path_for(key), value).await?;
    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<()> {
    match tokio::fs::remove_file(self.path_for(key)).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}

/// Source of "now" in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
  fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(not(tarpaulin_include))]
impl Clock for SystemClock {
  fn now_millis(&self) -> i64 {
    chrono::Utc::now().timestamp_millis()
  }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
  now: AtomicI64,
}

impl ManualClock {
  pub fn at(millis: i64) -> Self {
    Self { now: AtomicI64::new(millis) }
  }

  pub fn advance(&self, by: Duration) {
    self.now.fetch_add(i64::try_from(by.as_millis()).unwrap_or(i64::MAX), Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now_millis(&self) -> i64 {
    self.now.load(Ordering::SeqCst)
  }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
  time: i64,
  data: Option<T>,
}

pub struct EnrichmentCache<S: KeyValueStore, C: Clock = SystemClock> {
  store: S,
  clock: C,
  ttl_millis: i64,
}

impl<S: KeyValueStore> EnrichmentCache<S, SystemClock> {
  pub fn new(store: S, ttl: Duration) -> Self {
    Self::with_clock(store, SystemClock, ttl)
  }
}

impl<S: KeyValueStore, C: Clock> EnrichmentCache<S, C> {
  pub fn with_clock(store: S, clock: C, ttl: Duration) -> Self {
    Self { store, clock, ttl_millis: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX) }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn clock(&self) -> &C {
    &self.clock
  }

  /// `None` on miss; `Some(None)` for a cached "nothing found"
  pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<Option<T>> {
    let raw = match self.store.get(key).await {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        warn!("Cache read failed for {}: {}", key, e);
        return None;
      }
    };

    let envelope: Envelope<T> = match serde_json::from_str(&raw) {
      Ok(envelope) => envelope,
      Err(e) => {
        debug!("Discarding unreadable cache entry {}: {}", key, e);
        return None;
      }
    };

    // future-dated entries are as untrustworthy as stale ones
    let age = self.clock.now_millis().saturating_sub(envelope.time);
    if !(0..=self.ttl_millis).contains(&age) {
      debug!("Cache entry {} expired", key);
      if let Err(e) = self.store.remove(key).await {
        warn!("Failed to evict expired cache entry {}: {}", key, e);
      }
      return None;
    }

    Some(envelope.data)
  }

  /// Overwrite `key` with `value`, stamped with the current time
  pub async fn set<T: Serialize>(&self, key: &str, value: Option<&T>) {
    let encoded = serde_json::to_string(&Envelope { time: self.clock.now_millis(), data: value });
    let raw = match encoded {
      Ok(raw) => raw,
      Err(e) => {
        warn!("Failed to encode cache entry {}: {}", key, e);
        return;
      }
    };

    if let Err(e) = self.store.set(key, &raw).await {
      warn!("Cache write failed for {}: {}", key, e);
    }
  }
}
