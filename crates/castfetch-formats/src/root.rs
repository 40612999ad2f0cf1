//! Root manifest parser.
//!
//! The root manifest maps stable identifiers (FileDataID or path) to content
//! keys. Two wire variants exist: `MFST` (modern products, FileDataID-keyed,
//! delta-compressed) and `War3` (Warcraft III, pipe-delimited text).

use crate::error::{Error, Result};
use crate::reader::ByteReader;
use tracing::trace;

const MFST_MAGIC: &[u8; 4] = b"MFST";
const WAR3_MAGIC: &[u8; 4] = b"War3";

pub const NO_NAME_HASH: u32 = 0x1000_0000;
#[allow(dead_code, reason = "diagnostic only, per spec")]
pub const ENCRYPTED: u32 = 0x0800_0000;

/// The locale bitmask used by the `MFST` variant, and synthesized from the
/// `War3` variant's literal locale-name token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocaleFlags(pub u32);

macro_rules! locale_bits {
    ($($name:ident = $bit:expr, $accessor:ident;)*) => {
        #[allow(non_upper_case_globals, reason = "mirrors the wire locale names verbatim")]
        impl LocaleFlags {
            $(pub const $name: u32 = $bit;)*

            $(pub const fn $accessor(self) -> bool {
                self.0 & Self::$name != 0
            })*

            fn from_name(name: &str) -> Option<Self> {
                let bit = match name {
                    $(stringify!($name) => Self::$name,)*
                    _ => return None,
                };
                Some(Self(bit))
            }
        }
    };
}

locale_bits! {
    enUS = 0x2, is_en_us;
    koKR = 0x4, is_ko_kr;
    frFR = 0x10, is_fr_fr;
    deDE = 0x20, is_de_de;
    zhCN = 0x40, is_zh_cn;
    esES = 0x80, is_es_es;
    zhTW = 0x100, is_zh_tw;
    enGB = 0x200, is_en_gb;
    enCN = 0x400, is_en_cn;
    enTW = 0x800, is_en_tw;
    esMX = 0x1000, is_es_mx;
    ruRU = 0x2000, is_ru_ru;
    ptBR = 0x4000, is_pt_br;
    itIT = 0x8000, is_it_it;
    ptPT = 0x10000, is_pt_pt;
}

#[derive(Debug, Clone)]
pub struct RootEntry {
    pub file_data_id: u32,
    pub content_key: Vec<u8>,
    pub name_hash: Option<u64>,
    pub locale_flags: LocaleFlags,
    pub content_flags: u32,
    pub normalized_path: Option<String>,
    pub scopes: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RootManifest {
    entries: Vec<RootEntry>,
}

impl RootManifest {
    /// Parse a fully BLTE-decoded root manifest blob, dispatching on its magic.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::OutOfRange {
                offset: 0,
                needed: 4,
            });
        }
        match &data[0..4] {
            m if m == MFST_MAGIC => parse_mfst(data),
            m if m == WAR3_MAGIC => Ok(parse_war3(&data[4..])),
            _ => Err(Error::BadSignature),
        }
    }

    pub fn entries(&self) -> &[RootEntry] {
        &self.entries
    }

    /// Linear scan for the first entry matching `ckey`.
    pub fn get_entry_by_ckey(&self, ckey: &[u8]) -> Option<&RootEntry> {
        self.entries.iter().find(|e| e.content_key == ckey)
    }

    /// Case-insensitive substring match on `normalizedPath`, after
    /// normalizing the query the same way (lower-case, backslashes to `/`).
    pub fn get_entry_by_path(&self, path: &str) -> Vec<&RootEntry> {
        let query = normalize_path(path);
        self.entries
            .iter()
            .filter(|e| {
                e.normalized_path
                    .as_deref()
                    .is_some_and(|p| p.contains(&query))
            })
            .collect()
    }
}

/// Lowercases and collapses runs of backslashes to a single `/`, so a
/// doubled separator doesn't split a path into a spurious empty segment.
fn normalize_path(path: &str) -> String {
    let lower = path.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut chars = lower.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push('/');
            while chars.peek() == Some(&'\\') {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_mfst(data: &[u8]) -> Result<RootManifest> {
    let mut r = ByteReader::new(data);
    r.skip(4)?; // magic, already matched by the caller

    let possible_header_size = r.read_u32le()?;
    let (header_size, version) = if (12..=100).contains(&possible_header_size) {
        let version = r.read_u32le()?;
        (possible_header_size, version)
    } else {
        r.seek(4);
        (0, 1)
    };

    let total_file_count = r.read_u32le()?;
    let named_file_count = r.read_u32le()?;
    if header_size > 0 {
        r.skip(4)?; // reserved
    }

    let mut entries = Vec::new();

    loop {
        if r.is_eof() {
            break;
        }
        let Ok(num_records) = r.read_u32le() else {
            break;
        };

        let Ok((content_flags, locale)) = read_block_flags(&mut r, version) else {
            break;
        };

        let has_name_hashes = !(total_file_count != named_file_count
            && content_flags & NO_NAME_HASH != 0);

        let mut deltas = Vec::with_capacity(num_records as usize);
        for _ in 0..num_records {
            match r.read_i32le() {
                Ok(d) => deltas.push(d),
                Err(_) => break,
            }
        }
        if deltas.len() != num_records as usize {
            break;
        }

        let mut ckeys = Vec::with_capacity(num_records as usize);
        for _ in 0..num_records {
            match r.read_bytes(16) {
                Ok(c) => ckeys.push(c.to_vec()),
                Err(_) => break,
            }
        }
        if ckeys.len() != num_records as usize {
            break;
        }

        let mut name_hashes: Vec<Option<u64>> = if has_name_hashes {
            let mut v = Vec::with_capacity(num_records as usize);
            for _ in 0..num_records {
                match r.read_u64le() {
                    Ok(h) => v.push(Some(h)),
                    Err(_) => break,
                }
            }
            v
        } else {
            vec![None; num_records as usize]
        };
        if name_hashes.len() != num_records as usize {
            break;
        }

        let mut current: i64 = 0;
        for (i, delta) in deltas.iter().enumerate() {
            current = if i == 0 {
                i64::from(*delta)
            } else {
                current + 1 + i64::from(*delta)
            };

            entries.push(RootEntry {
                file_data_id: current as u32,
                content_key: std::mem::take(&mut ckeys[i]),
                name_hash: name_hashes[i].take(),
                locale_flags: LocaleFlags(locale),
                content_flags,
                normalized_path: None,
                scopes: Vec::new(),
            });
        }

        trace!(num_records, "parsed MFST block");
    }

    Ok(RootManifest { entries })
}

/// Reads the per-block flags, returning `(contentFlags, locale)`. Layout
/// depends on the manifest version read from the header: version 1 stores
/// `contentFlags` then `locale`; version 2 stores `locale` then three raw
/// words that are folded into `contentFlags`.
fn read_block_flags(r: &mut ByteReader<'_>, version: u32) -> Result<(u32, u32)> {
    if version >= 2 {
        let locale = r.read_u32le()?;
        let unk1 = r.read_u32le()?;
        let unk2 = r.read_u32le()?;
        let unk3 = r.read_u8()?;
        let content_flags = unk1 | unk2 | (u32::from(unk3) << 17);
        Ok((content_flags, locale))
    } else {
        let content_flags = r.read_u32le()?;
        let locale = r.read_u32le()?;
        Ok((content_flags, locale))
    }
}

fn parse_war3(data: &[u8]) -> RootManifest {
    let text = String::from_utf8_lossy(data);
    let mut entries = Vec::new();

    for line in text.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('|');
        let Some(path) = fields.next() else { continue };
        let Some(ekey) = fields.next() else { continue };
        if path.is_empty() || ekey.is_empty() {
            continue;
        }
        let locale_token = fields.next().unwrap_or("");

        let file_data_id = war3_path_hash(path);
        let locale_flags = LocaleFlags::from_name(locale_token).unwrap_or_default();
        let parts: Vec<&str> = path.split(':').collect();
        let scopes: Vec<String> = if parts.len() > 1 {
            parts[..parts.len() - 1].iter().map(|s| (*s).to_owned()).collect()
        } else {
            Vec::new()
        };

        // War3 conflates content and encoded keys: the eKey text is the
        // wire form of the content key too, so decode it to the same raw
        // byte representation the encoding table and archive index use.
        let Ok(content_key) = hex::decode(ekey) else {
            continue;
        };

        entries.push(RootEntry {
            file_data_id,
            content_key,
            name_hash: Some(u64::from(file_data_id)),
            locale_flags,
            content_flags: 0,
            normalized_path: Some(normalize_path(path)),
            scopes,
        });
    }

    RootManifest { entries }
}

/// `h = (h << 5) - h + c`, final absolute value, matching the source's
/// simple string hash for Warcraft III paths.
fn war3_path_hash(path: &str) -> u32 {
    let mut h: i32 = 0;
    for c in path.bytes() {
        h = h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(c));
    }
    h.unsigned_abs()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mfst_block(content_flags: u32, locale: u32, deltas: &[i32], ckeys: &[[u8; 16]]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&(deltas.len() as u32).to_le_bytes());
        b.extend_from_slice(&content_flags.to_le_bytes());
        b.extend_from_slice(&locale.to_le_bytes());
        for d in deltas {
            b.extend_from_slice(&d.to_le_bytes());
        }
        for c in ckeys {
            b.extend_from_slice(c);
        }
        for _ in deltas {
            b.extend_from_slice(&0u64.to_le_bytes());
        }
        b
    }

    #[test]
    fn mfst_delta_reconstruction() {
        let mut data = Vec::new();
        data.extend_from_slice(MFST_MAGIC);
        // 3 is outside the header-size peek range, so the reader rewinds and
        // re-reads this same field as totalFileCount.
        data.extend_from_slice(&3u32.to_le_bytes()); // total file count
        data.extend_from_slice(&3u32.to_le_bytes()); // named file count
        data.extend_from_slice(&mfst_block(
            0,
            LocaleFlags::enUS,
            &[10, 0, 4],
            &[[1; 16], [2; 16], [3; 16]],
        ));

        let manifest = parse_mfst(&data).unwrap();
        let ids: Vec<u32> = manifest.entries.iter().map(|e| e.file_data_id).collect();
        assert_eq!(ids, vec![10, 11, 16]);
        assert!(manifest.entries.iter().all(|e| e.locale_flags.is_en_us()));
    }

    #[test]
    fn mfst_version_2_block_flags_are_folded_from_three_words() {
        let mut data = Vec::new();
        data.extend_from_slice(MFST_MAGIC);
        data.extend_from_slice(&12u32.to_le_bytes()); // headerSize, in [12, 100]
        data.extend_from_slice(&2u32.to_le_bytes()); // version 2
        data.extend_from_slice(&1u32.to_le_bytes()); // total file count
        data.extend_from_slice(&1u32.to_le_bytes()); // named file count
        data.extend_from_slice(&0u32.to_le_bytes()); // reserved

        data.extend_from_slice(&1u32.to_le_bytes()); // numRecords
        data.extend_from_slice(&LocaleFlags::enUS.to_le_bytes()); // locale
        data.extend_from_slice(&0b0010u32.to_le_bytes()); // unk1
        data.extend_from_slice(&0b0100u32.to_le_bytes()); // unk2
        data.extend_from_slice(&3u8.to_le_bytes()); // unk3
        data.extend_from_slice(&7i32.to_le_bytes()); // delta
        data.extend_from_slice(&[9u8; 16]); // ckey
        data.extend_from_slice(&0u64.to_le_bytes()); // name hash

        let manifest = parse_mfst(&data).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        let entry = &manifest.entries[0];
        assert_eq!(entry.file_data_id, 7);
        assert_eq!(entry.content_flags, 0b0010 | 0b0100 | (3 << 17));
        assert!(entry.locale_flags.is_en_us());
    }

    #[test]
    fn war3_line_parses_into_entry() {
        let data = b"Units\\Human.slk|deadbeefdeadbeefdeadbeefdeadbeef|enUS\r\n";
        let manifest = parse_war3(data);
        assert_eq!(manifest.entries.len(), 1);
        let entry = &manifest.entries[0];
        assert_eq!(entry.normalized_path.as_deref(), Some("units/human.slk"));
        assert!(entry.locale_flags.is_en_us());
    }

    #[test]
    fn war3_missing_fields_are_skipped() {
        let data = b"|deadbeef|enUS\r\nOnlyPath\r\n";
        let manifest = parse_war3(data);
        assert!(manifest.entries.is_empty());
    }

    #[test]
    fn path_lookup_normalizes_case_and_separators() {
        let data = b"Units\\Human.slk|deadbeef|enUS\r\n";
        let manifest = parse_war3(data);
        let a = manifest.get_entry_by_path("Units\\Human.slk");
        let b = manifest.get_entry_by_path("units/human.slk");
        assert_eq!(a.len(), 1);
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn doubled_backslashes_collapse_to_one_separator() {
        assert_eq!(normalize_path("Units\\\\Human.slk"), "units/human.slk");
    }

    #[test]
    fn war3_scopes_exclude_last_colon_component() {
        let data = b"Campaign:Chapter1:Human.slk|deadbeef|enUS\r\n";
        let manifest = parse_war3(data);
        assert_eq!(
            manifest.entries[0].scopes,
            vec!["Campaign".to_string(), "Chapter1".to_string()]
        );
    }
}
