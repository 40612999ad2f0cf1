//! A cache that always misses, for tests and no-cache embeddings.

use crate::error::Result;
use crate::Cache;
use async_trait::async_trait;

#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}
