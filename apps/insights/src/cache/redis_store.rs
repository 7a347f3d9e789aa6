//! Redis-backed store. Keys are namespaced so the cache can share a database.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::{CacheError, CacheKey, CacheStore};

pub const KEY_PREFIX: &str = "insights:analysis:";

pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    /// Validates the URL; no connection is made until first use.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        Ok(Self {
            client: redis::Client::open(url)?,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

fn namespaced(key: &CacheKey) -> String {
    format!("{KEY_PREFIX}{key}")
}

fn strip_namespace(raw: &str) -> Option<CacheKey> {
    raw.strip_prefix(KEY_PREFIX).and_then(CacheKey::parse)
}

#[async_trait]
impl CacheStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn read(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        Ok(conn.get(namespaced(key)).await?)
    }

    async fn write(&self, key: &CacheKey, record: String) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(namespaced(key), record).await?;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        let removed: usize = conn.del(namespaced(key)).await?;
        Ok(removed > 0)
    }

    async fn keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        let mut conn = self.connection().await?;
        let mut iter = conn.scan_match::<_, String>(format!("{KEY_PREFIX}*")).await?;
        let mut raw = Vec::new();
        while let Some(key) = iter.next_item().await {
            raw.push(key);
        }
        Ok(keys_from_scan(raw))
    }
}

/// SCAN may repeat a key across cursor pages and the glob can match foreign keys.
fn keys_from_scan(raw: Vec<String>) -> Vec<CacheKey> {
    let mut keys: Vec<CacheKey> = raw.iter().filter_map(|k| strip_namespace(k)).collect();
    keys.sort();
    keys.dedup();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        let key = CacheKey::for_report("47-2111.00", "Electrician");
        let raw = namespaced(&key);
        assert!(raw.starts_with("insights:analysis:"));
        assert_eq!(strip_namespace(&raw), Some(key));
        assert_eq!(strip_namespace("other:thing"), None);
    }

    #[test]
    fn test_scanned_keys_are_filtered_and_deduplicated() {
        let nurse = CacheKey::for_report("29-1141.00", "Registered Nurse");
        let electrician = CacheKey::for_report("47-2111.00", "Electrician");
        let raw = vec![
            namespaced(&nurse),
            format!("{KEY_PREFIX}not-a-digest"),
            namespaced(&electrician),
            namespaced(&nurse),
        ];

        let mut expected = vec![nurse, electrician];
        expected.sort();
        assert_eq!(keys_from_scan(raw), expected);
    }

    #[test]
    fn test_open_rejects_bad_url() {
        assert!(RedisStore::open("not a url").is_err());
        assert!(RedisStore::open("redis://127.0.0.1:6379").is_ok());
    }
}
