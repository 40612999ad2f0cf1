//! Resolver client for Blizzard's CASC/TACT distribution system.
//!
//! Ties together [`castfetch_formats`] (BLTE, encoding table, archive index,
//! root manifest) and [`castfetch_protocol`] (BPSV, build/CDN config) behind
//! a single `init` -> `get_file`/`get_files` surface, fetching everything
//! over HTTP from the public content delivery network.

pub mod config;
mod error;
mod http;

pub use config::{ClientConfig, Region};
pub use error::{Error, Result};

use castfetch_cache::Cache;
use castfetch_formats::archive_index::{self, IndexEntry, IndexSource};
use castfetch_formats::{blte, root};
use castfetch_protocol::bpsv::{Document, Row};
use castfetch_protocol::config::Config;
use http::Transport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

struct CdnEntry {
    path: String,
    hosts: Vec<String>,
}

fn pick_row<'a>(doc: &'a Document, column: &str, value: &str) -> Option<&'a Row> {
    doc.rows.iter().find(|r| r.get(column) == Some(value))
}

/// Prefer an exact region match, then `eu`, then the first row.
fn pick_cdn(doc: &Document, region: &str) -> Option<CdnEntry> {
    let row = pick_row(doc, "Name", region)
        .or_else(|| pick_row(doc, "Name", "eu"))
        .or_else(|| doc.rows.first())?;
    let hosts = row.get_list("Hosts");
    let hosts = if hosts.is_empty() {
        row.get_list("Servers")
    } else {
        hosts
    };
    Some(CdnEntry {
        path: row.get("Path").unwrap_or_default().to_owned(),
        hosts: hosts.into_iter().map(str::to_owned).collect(),
    })
}

fn hash_subpath(hash_hex: &str) -> Option<(&str, &str)> {
    if hash_hex.len() < 4 {
        return None;
    }
    Some((&hash_hex[0..2], &hash_hex[2..4]))
}

fn cdn_url(host: &str, path: &str, kind: &str, hash_hex: &str, suffix: &str) -> Result<String> {
    let (a, b) = hash_subpath(hash_hex).ok_or_else(|| Error::InvalidHash(hash_hex.to_owned()))?;
    Ok(format!("http://{host}/{path}/{kind}/{a}/{b}/{hash_hex}{suffix}"))
}

fn decode_hash(hash_hex: &str) -> Result<Vec<u8>> {
    hex::decode(hash_hex).map_err(|_| Error::InvalidHash(hash_hex.to_owned()))
}

/// Resolved location of an encoded key within one archive.
struct ResolvedLocation {
    entry: IndexEntry,
}

pub struct CastClient {
    config: ClientConfig,
    transport: Arc<Transport>,
    cache: Arc<dyn Cache>,
    cdn: Option<CdnEntry>,
    encoding_table: HashMap<Vec<u8>, castfetch_formats::encoding::EncodingEntry>,
    index: HashMap<Vec<u8>, IndexEntry>,
    root_manifest: Option<root::RootManifest>,
}

impl CastClient {
    pub fn new(config: ClientConfig, cache: Arc<dyn Cache>) -> Result<Self> {
        let transport = Arc::new(Transport::new(&config)?);
        Ok(Self {
            config,
            transport,
            cache,
            cdn: None,
            encoding_table: HashMap::new(),
            index: HashMap::new(),
            root_manifest: None,
        })
    }

    pub fn root_manifest(&self) -> Option<&root::RootManifest> {
        self.root_manifest.as_ref()
    }

    fn require_cdn(&self) -> Result<&CdnEntry> {
        self.cdn.as_ref().ok_or(Error::NotInitialized)
    }

    fn require_host<'a>(&self, cdn: &'a CdnEntry) -> Result<&'a str> {
        cdn.hosts.first().map(String::as_str).ok_or_else(|| Error::NoCdn {
            product: self.config.product.clone(),
        })
    }

    async fn fetch_cached(&self, cache_key: &str, url: &str) -> Result<Vec<u8>> {
        if let Some(cached) = self.cache.get(cache_key).await? {
            return Ok(cached);
        }
        let bytes = self.transport.get_bytes(url).await?;
        self.cache.put(cache_key, &bytes).await?;
        Ok(bytes)
    }

    async fn fetch_config(&self, host: &str, path: &str, hash_hex: &str) -> Result<Config> {
        let url = cdn_url(host, path, "config", hash_hex, "")?;
        let bytes = self.fetch_cached(&format!("config_{hash_hex}"), &url).await?;
        Ok(Config::parse(&String::from_utf8_lossy(&bytes))?)
    }

    async fn fetch_data(&self, host: &str, path: &str, hash_hex: &str, suffix: &str) -> Result<Vec<u8>> {
        let url = cdn_url(host, path, "data", hash_hex, suffix)?;
        self.fetch_cached(&format!("{hash_hex}{suffix}"), &url).await
    }

    /// Run the full initialization sequence: CDN discovery, version
    /// selection, build/cdn config, encoding table, archive indices, and
    /// (if present) the root manifest.
    pub async fn init(&mut self) -> Result<()> {
        let patch_base_url = self.config.patch_base_url.clone();
        let region = self.config.region.as_str();
        let product = self.config.product.clone();

        debug!(product, "fetching cdns");
        let cdns_url = format!("{patch_base_url}/{product}/cdns");
        let cdns_text = self.transport.get_text(&cdns_url).await?;
        let cdns_doc = Document::parse(&cdns_text)?;
        let cdn = pick_cdn(&cdns_doc, region).ok_or_else(|| Error::NoCdn {
            product: product.clone(),
        })?;

        debug!(product, "fetching versions");
        let versions_url = format!("{patch_base_url}/{product}/versions");
        let versions_text = self.transport.get_text(&versions_url).await?;
        let versions_doc = Document::parse(&versions_text)?;
        let version_row = pick_row(&versions_doc, "Region", region).ok_or_else(|| Error::NoVersion {
            region: region.to_owned(),
        })?;
        let build_config_hash = version_row.get("BuildConfig").unwrap_or_default().to_owned();
        let cdn_config_hash = version_row.get("CDNConfig").unwrap_or_default().to_owned();

        let host = self.require_host(&cdn)?.to_owned();

        let build_config = self.fetch_config(&host, &cdn.path, &build_config_hash).await?;
        let cdn_config = self.fetch_config(&host, &cdn.path, &cdn_config_hash).await?;

        self.load_encoding_table(&host, &cdn.path, &build_config).await?;
        self.load_archive_indices(&host, &cdn.path, &cdn_config).await;
        self.load_root_manifest(&host, &cdn.path, &build_config).await?;

        self.cdn = Some(cdn);
        Ok(())
    }

    async fn load_encoding_table(&mut self, host: &str, path: &str, build_config: &Config) -> Result<()> {
        let (_ckey, ekey) = build_config.encoding().ok_or(Error::NoEncodingHash)?;
        let blte_data = self.fetch_data(host, path, ekey, "").await?;
        let decoded = blte::decode(&blte_data)?;
        self.encoding_table = castfetch_formats::encoding::parse(&decoded)?;
        debug!(entries = self.encoding_table.len(), "loaded encoding table");
        Ok(())
    }

    /// Fetches every archive index named in `cdn_config`, in bounded
    /// concurrent batches of `config.archive_batch_size`. An archive whose
    /// index can't be fetched or parsed is logged and skipped rather than
    /// failing the whole init.
    async fn load_archive_indices(&mut self, host: &str, path: &str, cdn_config: &Config) {
        let archives: Vec<String> = cdn_config.archives().into_iter().map(str::to_owned).collect();

        for batch in archives.chunks(self.config.archive_batch_size.max(1)) {
            let mut set = JoinSet::new();
            for hash_hex in batch {
                let transport = Arc::clone(&self.transport);
                let cache = Arc::clone(&self.cache);
                let host = host.to_owned();
                let path = path.to_owned();
                let hash_hex = hash_hex.clone();
                set.spawn(async move {
                    let url = cdn_url(&host, &path, "data", &hash_hex, ".index")?;
                    let cache_key = format!("{hash_hex}.index");
                    let bytes = if let Ok(Some(b)) = cache.get(&cache_key).await {
                        b
                    } else {
                        let b = transport.get_bytes(&url).await?;
                        let _ = cache.put(&cache_key, &b).await;
                        b
                    };
                    let hash = decode_hash(&hash_hex)?;
                    let entries = archive_index::parse(&bytes, &hash, IndexSource::Archive)?;
                    Ok::<_, Error>((hash_hex, entries))
                });
            }

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(Ok((_hash_hex, entries))) => {
                        for entry in entries {
                            self.index.insert(entry.ekey.clone(), entry);
                        }
                    }
                    Ok(Err(e)) => warn!(error = %e, "skipping unreadable archive index"),
                    Err(e) => warn!(error = %e, "archive index fetch task failed"),
                }
            }
        }
        debug!(entries = self.index.len(), "loaded archive indices");
    }

    async fn load_root_manifest(&mut self, host: &str, path: &str, build_config: &Config) -> Result<()> {
        let Some(root_ckey_hex) = build_config.root() else {
            return Ok(());
        };
        let root_ckey = decode_hash(root_ckey_hex)?;
        let Some(ekey) = self.encoding_ekeys(&root_ckey).into_iter().next() else {
            return Ok(());
        };
        let ekey_hex = hex::encode(&ekey);
        let blte_data = self.fetch_data(host, path, &ekey_hex, "").await?;
        let decoded = blte::decode(&blte_data)?;
        self.root_manifest = Some(root::RootManifest::parse(&decoded)?);
        Ok(())
    }

    fn encoding_ekeys(&self, ckey: &[u8]) -> Vec<Vec<u8>> {
        self.encoding_table
            .get(ckey)
            .map_or_else(|| vec![ckey.to_vec()], |e| e.ekeys.clone())
    }

    fn resolve(&self, ckey: &[u8]) -> Option<ResolvedLocation> {
        self.encoding_ekeys(ckey)
            .into_iter()
            .find_map(|ekey| self.index.get(&ekey).cloned())
            .map(|entry| ResolvedLocation { entry })
    }

    /// Fetch and BLTE-decode a single file's bytes by content key. Returns
    /// `Ok(None)` when no candidate encoded key resolves to an archive entry
    /// — a normal miss, not an error.
    pub async fn get_file(&self, ckey: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(loc) = self.resolve(ckey) else {
            return Ok(None);
        };
        let cdn = self.require_cdn()?;
        let host = self.require_host(cdn)?;
        let archive_hex = hex::encode(&loc.entry.archive_hash);
        let archive = self.fetch_data(host, &cdn.path, &archive_hex, "").await?;
        let slice = slice_entry(&archive, &loc.entry, &archive_hex)?;
        Ok(Some(blte::decode(slice)?))
    }

    /// Fetch and BLTE-decode a batch of files by content key, grouping by
    /// archive so each archive blob is fetched exactly once regardless of
    /// how many requested keys it contains.
    pub async fn get_files(&self, ckeys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
        let mut by_archive: HashMap<Vec<u8>, Vec<(Vec<u8>, IndexEntry)>> = HashMap::new();
        for ckey in ckeys {
            if let Some(loc) = self.resolve(ckey) {
                by_archive
                    .entry(loc.entry.archive_hash.clone())
                    .or_default()
                    .push((ckey.clone(), loc.entry));
            }
        }

        let cdn = self.require_cdn()?;
        let host = self.require_host(cdn)?;

        let mut out = HashMap::new();
        for (archive_hash, entries) in by_archive {
            let archive_hex = hex::encode(&archive_hash);
            let archive = self.fetch_data(host, &cdn.path, &archive_hex, "").await?;
            for (ckey, entry) in entries {
                let slice = slice_entry(&archive, &entry, &archive_hex)?;
                out.insert(ckey, blte::decode(slice)?);
            }
        }
        Ok(out)
    }

    /// Look up root-manifest entries by path, for products carrying a root
    /// manifest. Empty if `init` found no root (e.g. the build config had no
    /// `root` entry).
    pub fn get_entry_by_path(&self, path: &str) -> Vec<&root::RootEntry> {
        self.root_manifest
            .as_ref()
            .map(|m| m.get_entry_by_path(path))
            .unwrap_or_default()
    }
}

fn slice_entry<'a>(archive: &'a [u8], entry: &IndexEntry, archive_hex: &str) -> Result<&'a [u8]> {
    let start = entry.offset as usize;
    let end = start + entry.size as usize;
    archive.get(start..end).ok_or_else(|| Error::FetchFailed {
        url: archive_hex.to_owned(),
        status: None,
    })
}
