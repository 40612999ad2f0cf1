//! The cache collaborator contract: `get`/`put` over opaque byte blobs,
//! keyed by strings such as `config_<hash>`, `<hash>`, `<hash>.index`.
//!
//! The cache is advisory — misses simply trigger a network fetch. A single
//! on-disk reference implementation and a no-op implementation are provided;
//! any storage engine that implements [`Cache`] can be used by
//! `castfetch-client` in its place.

mod disk;
mod error;
mod null;

pub use disk::DiskCache;
pub use error::{Error, Result};
pub use null::NullCache;

use async_trait::async_trait;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;
}
