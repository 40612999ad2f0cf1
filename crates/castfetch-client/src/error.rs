//! Error types for the resolver client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fetch failed for {url}: status {status:?}")]
    FetchFailed { url: String, status: Option<u16> },

    #[error("request to {url} timed out")]
    FetchTimeout { url: String },

    #[error("no CDN host available for product {product}")]
    NoCdn { product: String },

    #[error("no version entry for region {region}")]
    NoVersion { region: String },

    #[error("build config has no encoding hash")]
    NoEncodingHash,

    #[error("encoding table has not been loaded; call init() first")]
    EncodingTableNotLoaded,

    #[error("root manifest is not available for this build")]
    RootNotAvailable,

    #[error("client has not been initialized; call init() first")]
    NotInitialized,

    #[error("malformed hex hash: {0}")]
    InvalidHash(String),

    #[error(transparent)]
    Formats(#[from] castfetch_formats::Error),

    #[error(transparent)]
    Protocol(#[from] castfetch_protocol::Error),

    #[error(transparent)]
    Cache(#[from] castfetch_cache::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
