use thiserror::Error;

/// Errors produced while parsing CASC/TACT binary formats.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected magic: expected {expected:?}, got {got:?}")]
    BadMagic {
        expected: &'static [u8],
        got: Vec<u8>,
    },

    #[error("unrecognized signature")]
    BadSignature,

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    #[error("read past end of input at offset {offset}, needed {needed} more byte(s)")]
    OutOfRange { offset: usize, needed: usize },

    #[error("malformed BLTE header: {0}")]
    BadBlteHeader(&'static str),

    #[error("unsupported BLTE table format: {0:#x}")]
    BadBlteFormat(u8),

    #[error("unknown BLTE block codec: {0:#04x}")]
    UnknownCodec(u8),

    #[error("encrypted BLTE blocks are not supported")]
    UnsupportedEncryption,

    #[error("BLTE recursion depth exceeded {0} levels")]
    BlteRecursionLimit(u32),

    #[error("zlib decompression failed: {0}")]
    Decompress(String),
}

pub type Result<T> = std::result::Result<T, Error>;
