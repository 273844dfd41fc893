use arx_archive::{ArchiveCore, ArchiveError};
use serde::Serialize;

use crate::error::{SdkError, SdkResult};
use crate::format::Format;

/// Header summary of an encoded archive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArchiveInfo {
    pub format: Format,
    pub major_version: u32,
    pub minor_version: u32,
    /// Total size of the archive in bytes.
    pub size: usize,
}

/// Detect the format of `bytes` and validate its header.
///
/// Only the header is examined; the payload is not decoded.
pub fn inspect(bytes: &[u8]) -> SdkResult<ArchiveInfo> {
    let format = Format::detect(bytes)
        .ok_or_else(|| SdkError::UnknownFormat(hex::encode(&bytes[..bytes.len().min(8)])))?;
    let core = match format {
        Format::Binary => arx_binary::parse_header(bytes)?,
        Format::Text => text_header(bytes)?,
    };
    Ok(ArchiveInfo {
        format,
        major_version: core.major(),
        minor_version: core.minor(),
        size: bytes.len(),
    })
}

fn text_header(bytes: &[u8]) -> SdkResult<ArchiveCore> {
    let end = bytes
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(bytes.len());
    let line = std::str::from_utf8(&bytes[..end])
        .map_err(|e| ArchiveError::invalid(format!("header is not UTF-8: {e}")))?;
    Ok(arx_text::parse_header(line)?)
}
