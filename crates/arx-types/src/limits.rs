use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, ArchiveResult};

/// Allocation caps applied while decoding.
///
/// Lengths read from the wire are checked against these limits before any
/// buffer is allocated, so a corrupt or hostile length prefix fails with
/// [`ArchiveError::InvalidDataFormat`] instead of exhausting memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeLimits {
    /// Maximum length of a string, in bytes for binary and characters for text.
    pub max_string_len: usize,
    /// Maximum length of a raw data block in bytes.
    pub max_raw_len: usize,
    /// Maximum element count of a sequence or array.
    pub max_sequence_len: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_string_len: 16 * 1024 * 1024, // 16 MiB
            max_raw_len: 256 * 1024 * 1024,   // 256 MiB
            max_sequence_len: 64 * 1024 * 1024,
        }
    }
}

impl DecodeLimits {
    /// Limits that never reject anything. Only for trusted input.
    pub fn unlimited() -> Self {
        Self {
            max_string_len: usize::MAX,
            max_raw_len: usize::MAX,
            max_sequence_len: usize::MAX,
        }
    }

    /// Validate a decoded string length.
    pub fn check_string(&self, len: u64) -> ArchiveResult<usize> {
        check("string", len, self.max_string_len)
    }

    /// Validate a decoded raw block length.
    pub fn check_raw(&self, len: u64) -> ArchiveResult<usize> {
        check("raw block", len, self.max_raw_len)
    }

    /// Validate a decoded sequence length.
    pub fn check_sequence(&self, len: u64) -> ArchiveResult<usize> {
        check("sequence", len, self.max_sequence_len)
    }
}

fn check(what: &str, len: u64, max: usize) -> ArchiveResult<usize> {
    match usize::try_from(len) {
        Ok(len) if len <= max => Ok(len),
        _ => Err(ArchiveError::InvalidDataFormat(format!(
            "{what} length {len} exceeds limit {max}"
        ))),
    }
}
