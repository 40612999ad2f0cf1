//! Wire text formats used by the TACT patch service: the pipe-delimited
//! BPSV tables (`cdns`, `versions`) and the key=value build/CDN config
//! blobs.

pub mod bpsv;
pub mod config;
mod error;

pub use error::{Error, Result};
