//! Encoding table parser.
//!
//! Maps a content key (CKey) to the encoded keys (EKeys) that store its
//! compressed representations on the CDN, plus the decompressed file size.

use crate::error::{Error, Result};
use crate::reader::ByteReader;
use std::collections::HashMap;
use tracing::trace;

const SIGNATURE: &[u8; 2] = b"EN";
const HEADER_LEN: usize = 22;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingEntry {
    pub ckey: Vec<u8>,
    pub ekeys: Vec<Vec<u8>>,
    pub file_size: u64,
}

#[derive(Debug)]
struct EncodingHeader {
    ckey_len: u8,
    ekey_len: u8,
    ce_page_size_kb: u16,
    ce_page_count: u32,
    espec_page_count: u32,
    espec_block_size: u32,
}

impl EncodingHeader {
    fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        let signature = r.read_bytes(2)?;
        if signature != SIGNATURE {
            return Err(Error::BadSignature);
        }
        let version = r.read_u8()?;
        if version != 1 {
            return Err(Error::UnsupportedVersion(version));
        }
        let ckey_len = r.read_u8()?;
        let ekey_len = r.read_u8()?;
        let ce_page_size_kb = r.read_u16be()?;
        let _espec_page_size_kb = r.read_u16be()?;
        let ce_page_count = r.read_u32be()?;
        let espec_page_count = r.read_u32be()?;
        let _flags = r.read_u8()?;
        let espec_block_size = r.read_u32be()?;

        Ok(Self {
            ckey_len,
            ekey_len,
            ce_page_size_kb,
            ce_page_count,
            espec_page_count,
            espec_block_size,
        })
    }
}

/// Parse a fully BLTE-decoded encoding table blob.
pub fn parse(data: &[u8]) -> Result<HashMap<Vec<u8>, EncodingEntry>> {
    let mut r = ByteReader::new(data);
    let header = EncodingHeader::parse(&mut r)?;

    // espec data and the page index are both skipped; pages are walked linearly.
    let page_index_len = header.ce_page_count as usize * 32;
    let skip = header.espec_block_size as usize + page_index_len;
    r.seek(HEADER_LEN + skip);

    let page_size = header.ce_page_size_kb as usize * 1024;
    let mut entries = HashMap::new();

    for page in 0..header.ce_page_count {
        let page_start = r.position();
        parse_page(
            data,
            page_start,
            page_size,
            header.ckey_len,
            header.ekey_len,
            &mut entries,
        );
        r.seek(page_start + page_size);
        trace!(page, entries = entries.len(), "parsed encoding table page");
    }

    let _ = header.espec_page_count;
    Ok(entries)
}

fn parse_page(
    data: &[u8],
    page_start: usize,
    page_size: usize,
    ckey_len: u8,
    ekey_len: u8,
    entries: &mut HashMap<Vec<u8>, EncodingEntry>,
) {
    let page_end = (page_start + page_size).min(data.len());
    if page_start >= page_end {
        return;
    }

    let mut r = ByteReader::new(&data[..page_end]);
    r.seek(page_start);

    loop {
        if r.position() >= page_end {
            break;
        }
        let Ok(key_count) = r.read_u8() else {
            break;
        };
        if key_count == 0 {
            break;
        }

        let Ok(file_size) = r.read_u40be() else {
            break;
        };
        let Ok(ckey) = r.read_bytes(ckey_len as usize) else {
            break;
        };
        let ckey = ckey.to_vec();

        let mut ekeys = Vec::with_capacity(key_count as usize);
        let mut truncated = false;
        for _ in 0..key_count {
            if let Ok(ekey) = r.read_bytes(ekey_len as usize) {
                ekeys.push(ekey.to_vec());
            } else {
                truncated = true;
                break;
            }
        }
        if truncated {
            break;
        }

        entries.insert(
            ckey.clone(),
            EncodingEntry {
                ckey,
                ekeys,
                file_size,
            },
        );
    }
}
