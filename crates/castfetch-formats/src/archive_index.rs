//! Archive index (`.index`) parser.
//!
//! Each archive on the CDN has a paired index file mapping encoded keys to
//! their byte range within that archive. The layout here is the simplified
//! fixed-page, fixed-width-entry form this client actually needs: every page
//! is 4 KiB, the last page is a footer, and every entry is eKey+size+offset.
//! It does not implement the real TACT footer/table-of-contents format used
//! for binary-search access into a single index file, since this client
//! loads every entry into one merged map up front and never needs that.

use crate::error::Result;
use crate::reader::ByteReader;
use tracing::{trace, warn};

const PAGE_SIZE: usize = 4096;
const ENTRY_SIZE: usize = 16 + 4 + 4;
const MAX_SIZE: u32 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Archive,
    Patch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub ekey: Vec<u8>,
    pub size: u32,
    pub offset: u32,
    pub archive_hash: Vec<u8>,
    pub source: IndexSource,
}

/// Parse the data pages of an `.index` file, dropping the trailing footer page.
pub fn parse(data: &[u8], archive_hash: &[u8], source: IndexSource) -> Result<Vec<IndexEntry>> {
    let data_len = if data.len() % PAGE_SIZE == 0 {
        // Ambiguous case: the source treats this as all-data, not footer-stripped.
        data.len()
    } else {
        let pages = data.len().div_ceil(PAGE_SIZE);
        (pages - 1) * PAGE_SIZE
    };

    let mut r = ByteReader::new(&data[..data_len]);
    let mut entries = Vec::new();

    while r.remaining() >= ENTRY_SIZE {
        let Ok(ekey) = r.read_bytes(16) else {
            break;
        };
        let Ok(size) = r.read_u32be() else {
            break;
        };
        let Ok(offset) = r.read_u32be() else {
            break;
        };

        if size == 0 || size > MAX_SIZE {
            break;
        }

        entries.push(IndexEntry {
            ekey: ekey.to_vec(),
            size,
            offset,
            archive_hash: archive_hash.to_vec(),
            source,
        });
    }

    trace!(entries = entries.len(), "parsed archive index");
    if entries.is_empty() && data_len > 0 {
        warn!("archive index produced no entries");
    }

    Ok(entries)
}
