//! One JSON file per entry, named `analysis_<key>.json`.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use super::{CacheError, CacheKey, CacheStore};

const FILE_PREFIX: &str = "analysis_";
const FILE_SUFFIX: &str = ".json";

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{key}{FILE_SUFFIX}"))
    }
}

#[async_trait]
impl CacheStore for FileStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn read(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a hidden temp file, then renames over the target.
    async fn write(&self, key: &CacheKey, record: String) -> Result<(), CacheError> {
        let target = self.path_for(key);
        let temp = self
            .dir
            .join(format!(".{FILE_PREFIX}{key}.{}.tmp", Uuid::new_v4()));

        fs::write(&temp, record).await?;
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(key) = name
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
                .and_then(CacheKey::parse)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::cache::ExtractionCache;
    use crate::models::report::InsightReport;

    #[tokio::test]
    async fn test_write_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let key = CacheKey::for_report("47-2111.00", "Electrician");

        assert_eq!(store.read(&key).await.unwrap(), None);
        store.write(&key, "{\"a\":1}".to_string()).await.unwrap();
        assert_eq!(store.read(&key).await.unwrap().as_deref(), Some("{\"a\":1}"));

        assert!(store.remove(&key).await.unwrap());
        assert!(!store.remove(&key).await.unwrap());
        assert_eq!(store.read(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_uses_historical_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let key = CacheKey::for_report("47-2111.00", "Electrician");
        store.write(&key, "{}".to_string()).await.unwrap();

        let expected = dir.path().join(format!("analysis_{key}.json"));
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let key = CacheKey::for_report("47-2111.00", "Electrician");

        store.write(&key, "first".to_string()).await.unwrap();
        store.write(&key, "second".to_string()).await.unwrap();

        assert_eq!(store.read(&key).await.unwrap().as_deref(), Some("second"));
        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_keys_ignore_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let a = CacheKey::for_report("47-2111.00", "Electrician");
        let b = CacheKey::for_report("29-1141.00", "Nurse");
        store.write(&a, "{}".to_string()).await.unwrap();
        store.write(&b, "{}".to_string()).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("analysis_index.json"), "{}").unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.keys().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_open_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("cache").join("insights");
        let store = FileStore::open(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_cache_over_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let cache = ExtractionCache::new(store, Duration::hours(24));
        let key = CacheKey::for_report("47-2111.00", "Electrician");
        let report = InsightReport::empty("Electrician", "47-2111.00", 3);

        assert!(cache.put(&key, "47-2111.00", "Electrician", &report).await);
        assert_eq!(cache.get(&key).await, Some(report));

        let stats = cache.stats().await;
        assert_eq!(stats.backend, "file");
        assert_eq!(stats.total_entries, 1);

        assert_eq!(cache.clear(None).await, 1);
        assert_eq!(cache.get(&key).await, None);
    }
}
