//! Content-addressed, TTL-expiring store of finished reports.
//!
//! The cache never fails a request: store errors degrade to a miss on read and
//! a no-op on write, and are logged. Every `get` goes back to the backing
//! store; nothing is shadowed in memory here.

pub mod file;
pub mod memory;
pub mod redis_store;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::report::InsightReport;

pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache record serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

// ────────────────────────────────────────────────────────────────────────────
// Keys and records
// ────────────────────────────────────────────────────────────────────────────

/// SHA-256 hex digest of `"<code>_<title lowercased, spaces as underscores>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_report(classification_code: &str, title: &str) -> Self {
        let normalized_title = title.trim().to_lowercase().replace(' ', "_");
        let mut hasher = Sha256::new();
        hasher.update(format!("{}_{normalized_title}", classification_code.trim()).as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Accepts a key read back from a store listing; rejects anything that is
    /// not a 64-character hex digest.
    pub fn parse(raw: &str) -> Option<Self> {
        (raw.len() == 64 && raw.bytes().all(|b| b.is_ascii_hexdigit()))
            .then(|| Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub cached_at: DateTime<Utc>,
    #[serde(alias = "soc_code")]
    pub classification_code: String,
    #[serde(alias = "job_title")]
    pub title: String,
    pub cache_key: CacheKey,
}

/// Persisted form: the report's own fields plus `_cache_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    #[serde(flatten)]
    pub report: InsightReport,
    #[serde(rename = "_cache_metadata")]
    pub metadata: CacheMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntrySummary {
    pub cache_key: CacheKey,
    pub title: String,
    pub classification_code: String,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub backend: String,
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub ttl_hours: i64,
    pub oldest_entry: Option<CacheEntrySummary>,
    pub newest_entry: Option<CacheEntrySummary>,
}

// ────────────────────────────────────────────────────────────────────────────
// Store trait
// ────────────────────────────────────────────────────────────────────────────

/// A key-value backend for serialized cache records.
///
/// `write` must replace an existing value atomically; `remove` must tolerate a
/// key that is already gone (returning `false`).
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn read(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;

    async fn write(&self, key: &CacheKey, record: String) -> Result<(), CacheError>;

    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError>;

    async fn keys(&self) -> Result<Vec<CacheKey>, CacheError>;
}

// ────────────────────────────────────────────────────────────────────────────
// ExtractionCache
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ExtractionCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ExtractionCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<InsightReport> {
        self.get_at(key, Utc::now()).await
    }

    /// Lookup as of `now`. Entries older than the TTL are removed and reported as a miss.
    pub async fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<InsightReport> {
        let raw = match self.store.read(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed for {key}, treating as miss: {e}");
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("Cache record {key} is unreadable, treating as miss: {e}");
                return None;
            }
        };

        if now - record.metadata.cached_at > self.ttl {
            info!(
                "Cache entry {key} for '{}' expired (cached at {})",
                record.metadata.title, record.metadata.cached_at
            );
            if let Err(e) = self.store.remove(key).await {
                warn!("Failed to remove expired cache entry {key}: {e}");
            }
            return None;
        }

        debug!("Cache hit for {key}");
        Some(record.report)
    }

    /// Stores `report` under `key`, replacing any previous entry. Returns
    /// whether the write reached the store.
    pub async fn put(
        &self,
        key: &CacheKey,
        classification_code: &str,
        title: &str,
        report: &InsightReport,
    ) -> bool {
        self.put_at(key, classification_code, title, report, Utc::now())
            .await
    }

    pub async fn put_at(
        &self,
        key: &CacheKey,
        classification_code: &str,
        title: &str,
        report: &InsightReport,
        cached_at: DateTime<Utc>,
    ) -> bool {
        let record = CacheRecord {
            report: report.clone(),
            metadata: CacheMetadata {
                cached_at,
                classification_code: classification_code.to_string(),
                title: title.to_string(),
                cache_key: key.clone(),
            },
        };

        let serialized = match serde_json::to_string_pretty(&record) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize cache record {key}: {e}");
                return false;
            }
        };

        match self.store.write(key, serialized).await {
            Ok(()) => {
                debug!("Cached report {key} for '{title}' ({classification_code})");
                true
            }
            Err(e) => {
                warn!("Cache write failed for {key}, continuing without cache: {e}");
                false
            }
        }
    }

    /// Removes one entry, or every entry when `key` is `None`. Returns how many were removed.
    pub async fn clear(&self, key: Option<&CacheKey>) -> usize {
        let keys = match key {
            Some(key) => vec![key.clone()],
            None => match self.store.keys().await {
                Ok(keys) => keys,
                Err(e) => {
                    warn!("Failed to list cache entries: {e}");
                    return 0;
                }
            },
        };

        let mut removed = 0;
        for key in &keys {
            match self.store.remove(key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to remove cache entry {key}: {e}"),
            }
        }

        info!("Cleared {removed} cache entries");
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        let keys = self.store.keys().await.unwrap_or_else(|e| {
            warn!("Failed to list cache entries: {e}");
            Vec::new()
        });

        let mut total_entries = 0;
        let mut total_size_bytes = 0u64;
        let mut oldest: Option<CacheEntrySummary> = None;
        let mut newest: Option<CacheEntrySummary> = None;

        for key in keys {
            let raw = match self.store.read(&key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to read cache entry {key} for stats: {e}");
                    continue;
                }
            };
            total_entries += 1;
            total_size_bytes += raw.len() as u64;

            let Ok(record) = serde_json::from_str::<CacheRecord>(&raw) else {
                continue;
            };
            let summary = CacheEntrySummary {
                cache_key: key,
                title: record.metadata.title,
                classification_code: record.metadata.classification_code,
                cached_at: record.metadata.cached_at,
            };
            if oldest.as_ref().map_or(true, |o| summary.cached_at < o.cached_at) {
                oldest = Some(summary.clone());
            }
            if newest.as_ref().map_or(true, |n| summary.cached_at > n.cached_at) {
                newest = Some(summary);
            }
        }

        CacheStats {
            backend: self.store.backend().to_string(),
            total_entries,
            total_size_bytes,
            total_size_mb: (total_size_bytes as f64 / 1_048_576.0 * 100.0).round() / 100.0,
            ttl_hours: self.ttl.num_hours(),
            oldest_entry: oldest,
            newest_entry: newest,
        }
    }
}
