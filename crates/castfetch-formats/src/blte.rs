//! [BLTE][0] container decoding.
//!
//! BLTE wraps every downloadable blob on the CDN: a small header describes
//! one or more blocks, each independently compressed with its own codec tag.
//!
//! [0]: https://wowdev.wiki/BLTE

use crate::error::{Error, Result};
use crate::reader::ByteReader;
use std::io::{Read, Write};
use tracing::{error, trace, warn};

const BLTE_MAGIC: &[u8; 4] = b"BLTE";
const MD5_LENGTH: usize = 16;
const MAX_RECURSION_DEPTH: u32 = 8;

#[derive(Debug, PartialEq, Eq)]
struct BlockInfo {
    compressed_size: u32,
    decompressed_size: u32,
    #[allow(dead_code, reason = "parsed for future integrity checks, not verified here")]
    hash: [u8; MD5_LENGTH],
    #[allow(dead_code, reason = "parsed for future integrity checks, not verified here")]
    uncompressed_hash: Option<[u8; MD5_LENGTH]>,
}

#[derive(Debug, PartialEq, Eq)]
struct BlteHeader {
    blocks: Vec<BlockInfo>,
}

impl BlteHeader {
    /// Parses the magic, the fixed prologue, and the block-info table.
    /// Returns the header and the byte offset where block payload data
    /// begins (the reader's position once the table has been consumed —
    /// `headerSize` itself is validated but not used for this, since this
    /// format's block-info table always immediately follows the prologue).
    fn parse(r: &mut ByteReader<'_>) -> Result<(Self, usize)> {
        let magic = r.read_bytes(4)?;
        if magic != BLTE_MAGIC {
            return Err(Error::BadMagic {
                expected: BLTE_MAGIC,
                got: magic.to_vec(),
            });
        }

        let header_size = r.read_u32be()?;
        if header_size == 0 {
            return Err(Error::BadBlteHeader("headerSize must be greater than 0"));
        }

        let format = r.read_u8()?;
        if format != 0x0F && format != 0x10 {
            return Err(Error::BadBlteFormat(format));
        }
        let has_uncompressed_hash = format == 0x10;

        let block_count = r.read_u24be()?;
        if block_count == 0 {
            return Err(Error::BadBlteHeader("blockCount must be greater than 0"));
        }

        let mut blocks = Vec::with_capacity(block_count as usize);
        for _ in 0..block_count {
            let compressed_size = r.read_u32be()?;
            let decompressed_size = r.read_u32be()?;

            let mut hash = [0u8; MD5_LENGTH];
            hash.copy_from_slice(r.read_bytes(MD5_LENGTH)?);

            let uncompressed_hash = if has_uncompressed_hash {
                let mut h = [0u8; MD5_LENGTH];
                h.copy_from_slice(r.read_bytes(MD5_LENGTH)?);
                Some(h)
            } else {
                None
            };

            blocks.push(BlockInfo {
                compressed_size,
                decompressed_size,
                hash,
                uncompressed_hash,
            });
        }

        let block_start = r.position();
        Ok((Self { blocks }, block_start))
    }
}

/// Decode a complete BLTE container into its concatenated decompressed payload.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    decode_with_depth(data, 0)
}

fn decode_with_depth(data: &[u8], depth: u32) -> Result<Vec<u8>> {
    if depth >= MAX_RECURSION_DEPTH {
        return Err(Error::BlteRecursionLimit(MAX_RECURSION_DEPTH));
    }

    let mut r = ByteReader::new(data);
    let (header, mut block_start) = BlteHeader::parse(&mut r)?;
    trace!(blocks = header.blocks.len(), depth, "decoding BLTE container");

    let mut out = Vec::new();
    for (i, block) in header.blocks.iter().enumerate() {
        let compressed_size = block.compressed_size as usize;
        if block_start + compressed_size > data.len() {
            error!(block = i, "BLTE block runs past end of input");
            return Err(Error::OutOfRange {
                offset: block_start,
                needed: compressed_size,
            });
        }

        let payload = &data[block_start..block_start + compressed_size];
        decode_block(payload, block.decompressed_size, depth, &mut out)?;
        block_start += compressed_size;
    }

    Ok(out)
}

fn decode_block(payload: &[u8], decompressed_size: u32, depth: u32, out: &mut Vec<u8>) -> Result<()> {
    let &[tag, ref rest @ ..] = payload else {
        return Err(Error::BadBlteHeader("empty block payload"));
    };

    match tag {
        b'N' => out.extend_from_slice(rest),
        b'Z' => decode_zlib(rest, out)?,
        b'4' => decode_lz4(rest, decompressed_size, out)?,
        b'F' => {
            let nested = decode_with_depth(rest, depth + 1)?;
            out.extend_from_slice(&nested);
        }
        b'E' => {
            warn!("rejecting encrypted BLTE block");
            return Err(Error::UnsupportedEncryption);
        }
        other => return Err(Error::UnknownCodec(other)),
    }
    Ok(())
}

fn decode_zlib(payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let mut decoder = flate2::read::ZlibDecoder::new(payload);
    decoder
        .read_to_end(out)
        .map_err(|e| Error::Decompress(e.to_string()))?;
    Ok(())
}

fn decode_lz4(payload: &[u8], decompressed_size: u32, out: &mut Vec<u8>) -> Result<()> {
    let &[version, ref rest @ ..] = payload else {
        return Err(Error::BadBlteHeader("empty LZ4 block payload"));
    };
    if version != 1 {
        return Err(Error::BadBlteHeader("unsupported LZ4 frame version"));
    }
    // 8-byte big-endian size and a 1-byte block-shift parameter are informational only.
    if rest.len() < 9 {
        return Err(Error::BadBlteHeader("truncated LZ4 frame preamble"));
    }
    let raw = &rest[9..];
    let decompressed = lz4_flex::block::decompress(raw, decompressed_size as usize)
        .map_err(|e| Error::Decompress(e.to_string()))?;
    out.extend_from_slice(&decompressed);
    Ok(())
}

/// Write `data` into a [`Write`] sink, for callers that want to stream the
/// decoded output rather than hold it in one buffer.
pub fn decode_to<W: Write>(data: &[u8], mut sink: W) -> Result<()> {
    let decoded = decode(data)?;
    sink.write_all(&decoded)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn single_block_blte(tag: u8, payload: &[u8], decompressed_size: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(BLTE_MAGIC);
        buf.extend_from_slice(&12u32.to_be_bytes());
        buf.push(0x0F);
        buf.extend_from_slice(&1u32.to_be_bytes()[1..]); // 24-bit block count
        let compressed_size = 1 + payload.len() as u32;
        buf.extend_from_slice(&compressed_size.to_be_bytes());
        buf.extend_from_slice(&decompressed_size.to_be_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        buf.push(tag);
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn single_uncompressed_block_round_trips() {
        let blte = single_block_blte(b'N', b"hello", 5);
        assert_eq!(decode(&blte).unwrap(), b"hello");
    }

    #[test]
    fn unknown_codec_is_rejected() {
        let blte = single_block_blte(b'X', b"hello", 5);
        match decode(&blte) {
            Err(Error::UnknownCodec(b'X')) => {}
            other => panic!("expected UnknownCodec('X'), got {other:?}"),
        }
    }

    #[test]
    fn encrypted_block_is_rejected() {
        // key_name_len=0, iv_len=0, no payload after.
        let blte = single_block_blte(b'E', &[0, 0], 0);
        assert!(matches!(decode(&blte), Err(Error::UnsupportedEncryption)));
    }

    #[test]
    fn zlib_block_decompresses() {
        use std::io::Write as _;
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(b"hello world").unwrap();
        let compressed = enc.finish().unwrap();
        let blte = single_block_blte(b'Z', &compressed, 11);
        assert_eq!(decode(&blte).unwrap(), b"hello world");
    }

    #[test]
    fn multi_block_concatenates_in_order() {
        let mut buf = Vec::new();
        buf.extend_from_slice(BLTE_MAGIC);
        let header_size = 8 + 4 + 2 * 24u32;
        buf.extend_from_slice(&header_size.to_be_bytes());
        buf.push(0x0F);
        buf.extend_from_slice(&2u32.to_be_bytes()[1..]);
        for payload in [&b"foo"[..], &b"bar"[..]] {
            let compressed_size = 1 + payload.len() as u32;
            buf.extend_from_slice(&compressed_size.to_be_bytes());
            buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            buf.extend_from_slice(&[0u8; 16]);
        }
        buf.push(b'N');
        buf.extend_from_slice(b"foo");
        buf.push(b'N');
        buf.extend_from_slice(b"bar");
        assert_eq!(decode(&buf).unwrap(), b"foobar");
    }

    #[test]
    fn recursive_nested_blte_decodes() {
        let inner = single_block_blte(b'N', b"nested", 6);
        let outer = single_block_blte(b'F', &inner, inner.len() as u32);
        assert_eq!(decode(&outer).unwrap(), b"nested");
    }

    #[test]
    fn recursion_limit_is_enforced() {
        let mut blte = single_block_blte(b'N', b"x", 1);
        for _ in 0..MAX_RECURSION_DEPTH {
            blte = single_block_blte(b'F', &blte, blte.len() as u32);
        }
        assert!(matches!(decode(&blte), Err(Error::BlteRecursionLimit(_))));
    }
}
