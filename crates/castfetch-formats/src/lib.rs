//! Binary format parsers for Blizzard's CASC/TACT content distribution
//! system: the BLTE compression envelope, the encoding table, the archive
//! index, and the root manifest (both `MFST` and `War3` variants).
//!
//! These parsers operate on already-fetched, in-memory byte slices; they do
//! not perform any I/O themselves. The networked resolver that drives them
//! lives in `castfetch-client`.

pub mod archive_index;
pub mod blte;
pub mod encoding;
mod error;
pub mod reader;
pub mod root;

pub use error::{Error, Result};
