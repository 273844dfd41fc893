//! Text codec for ARX archives.
//!
//! Human-readable and diffable: every primitive is a decimal token, tokens
//! are separated by a single space, and opaque byte blocks are base64. The
//! format is not wire-compatible with the binary codec.
//!
//! # Wire Layout
//!
//! ```text
//! arx_text_archive <major> <minor>
//! 42 5 héllo 3 AAEC
//! ```
//!
//! - header: the id token and the major version, plus the minor version when
//!   the major is above zero
//! - bool: `0` or `1`
//! - float: shortest round-trip decimal, or `nan`, `inf`, `-inf`
//! - string: character count, one space, then the literal text
//! - raw block: byte length, then padded standard base64 (omitted when empty)

pub mod decoder;
pub mod encoder;

use arx_archive::{
    ArchiveKind, ArchiveResult, ByteSink, ByteSource, DecodeLimits, Reader, Registry, Writer,
};
use serde::{Deserialize, Serialize};

pub use decoder::{parse_header, TextDecoder};
pub use encoder::TextEncoder;

/// Registry key of the text codec.
pub const KIND: ArchiveKind = ArchiveKind::new("text");

/// First token of every text archive.
pub const ID: &str = "arx_text_archive";

/// Minor version written by default.
pub const MINOR_VERSION: u32 = 0;

/// Text codec settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub minor_version: u32,
    /// Allocation caps while reading. String limits count characters.
    pub limits: DecodeLimits,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            minor_version: MINOR_VERSION,
            limits: DecodeLimits::default(),
        }
    }
}

/// Returns `true` if `prefix` starts with the text id token.
pub fn is_text(prefix: &[u8]) -> bool {
    prefix.starts_with(ID.as_bytes())
}

/// Open a text writer over `sink`, writing the header line immediately.
pub fn writer<'a>(
    sink: &'a mut dyn ByteSink,
    registry: &'a Registry,
    config: &TextConfig,
) -> ArchiveResult<Writer<'a>> {
    let encoder = TextEncoder::new(sink, config.minor_version)?;
    Ok(Writer::new(Box::new(encoder), registry))
}

/// Open a text reader over `source`, validating the header line immediately.
pub fn reader<'a>(
    source: &'a mut dyn ByteSource,
    registry: &'a Registry,
    config: &TextConfig,
) -> ArchiveResult<Reader<'a>> {
    let decoder = TextDecoder::new(source, config.limits.clone())?;
    Ok(Reader::new(Box::new(decoder), registry))
}
