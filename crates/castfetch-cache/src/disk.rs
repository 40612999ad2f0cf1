//! A single-directory on-disk cache keyed by a sanitized cache key.

use crate::error::{Error, Result};
use crate::Cache;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, trace};

pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(Error::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl Cache for DiskCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => {
                trace!(key, "cache hit");
                Ok(Some(data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(key, "cache miss");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        debug!(key, bytes = data.len(), "writing cache entry");
        fs::write(&path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).await.unwrap();

        assert_eq!(cache.get("deadbeef").await.unwrap(), None);

        cache.put("deadbeef", b"payload").await.unwrap();
        assert_eq!(
            cache.get("deadbeef").await.unwrap(),
            Some(b"payload".to_vec())
        );
    }

    #[tokio::test]
    async fn rejects_path_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).await.unwrap();
        assert!(matches!(
            cache.get("../escape").await,
            Err(Error::InvalidKey(_))
        ));
    }
}
