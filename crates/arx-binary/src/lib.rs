//! Binary codec for ARX archives.
//!
//! Compact and platform-native: primitives are written at their native width
//! in native byte order, strings and blocks are length-prefixed raw bytes
//! with no escaping. Archives are not portable across byte orders.
//!
//! # Wire Layout
//!
//! ```text
//! [magic "ARXB"][major u32][minor u32][payload...]
//! ```
//!
//! - bool: one byte, `0` or `1`
//! - class version: one byte
//! - identity index: `i32`
//! - lengths: LEB128 varint from minor 1, native `u64` in minor 0

pub mod decoder;
pub mod encoder;
mod varint;

use arx_archive::{
    ArchiveKind, ArchiveResult, ByteSink, ByteSource, DecodeLimits, Reader, Registry, Writer,
};
use serde::{Deserialize, Serialize};

pub use decoder::{parse_header, BinaryDecoder};
pub use encoder::BinaryEncoder;

/// Registry key of the binary codec.
pub const KIND: ArchiveKind = ArchiveKind::new("binary");

/// Leading bytes of every binary archive.
pub const MAGIC: [u8; 4] = *b"ARXB";

/// Magic plus major and minor version.
pub const HEADER_LEN: usize = 12;

/// Minor version written by default.
pub const MINOR_VERSION: u32 = 1;

/// First minor version that encodes lengths as varints.
pub const MINOR_VARINT_LENGTHS: u32 = 1;

/// Binary codec settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryConfig {
    /// Minor version to write. Readers accept every minor up to
    /// [`MINOR_VERSION`].
    pub minor_version: u32,
    /// Allocation caps while reading.
    pub limits: DecodeLimits,
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            minor_version: MINOR_VERSION,
            limits: DecodeLimits::default(),
        }
    }
}

/// Returns `true` if `prefix` starts with the binary magic.
pub fn is_binary(prefix: &[u8]) -> bool {
    prefix.starts_with(&MAGIC)
}

/// Open a binary writer over `sink`, writing the header immediately.
pub fn writer<'a>(
    sink: &'a mut dyn ByteSink,
    registry: &'a Registry,
    config: &BinaryConfig,
) -> ArchiveResult<Writer<'a>> {
    let encoder = BinaryEncoder::new(sink, config.minor_version)?;
    Ok(Writer::new(Box::new(encoder), registry))
}

/// Open a binary reader over `source`, validating the header immediately.
pub fn reader<'a>(
    source: &'a mut dyn ByteSource,
    registry: &'a Registry,
    config: &BinaryConfig,
) -> ArchiveResult<Reader<'a>> {
    let decoder = BinaryDecoder::new(source, config.limits.clone())?;
    Ok(Reader::new(Box::new(decoder), registry))
}
