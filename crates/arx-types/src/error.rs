use thiserror::Error;

use crate::kind::ArchiveKind;
use crate::version::ArchiveCore;

/// Errors produced while encoding or decoding an archive.
///
/// Every variant is fatal to the current session. The engine never retries;
/// callers decide whether to reopen the stream and start over.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Corrupt or unexpected token, byte count, or identity index.
    #[error("invalid data format: {0}")]
    InvalidDataFormat(String),

    /// No factory is registered for a decoded class name.
    #[error("unregistered class: {0}")]
    UnregisteredClass(String),

    /// No serializer is registered for a class name under this archive kind.
    #[error("no {kind} serializer registered for class {class}")]
    SerializerNotFound { kind: ArchiveKind, class: String },

    /// The stored class version is newer than the implementation.
    #[error("class {class} stored at version {stored}, implementation is at version {current}")]
    ClassVersionMismatch {
        class: String,
        stored: u8,
        current: u8,
    },

    /// Short read or write on the underlying sink/source.
    #[error("short {operation}: expected {expected} bytes, got {actual}")]
    StreamError {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The archive was constructed over a closed stream.
    #[error("stream is not open")]
    StreamNotOpen,

    /// The magic bytes or id token do not belong to this codec.
    #[error("unrecognized archive format: expected {expected}, got {actual}")]
    UnrecognizedArchiveFormat { expected: String, actual: String },

    /// The archive's format version is not readable by this implementation.
    #[error("archive version {found} is not readable (supported: {supported})")]
    ArchiveVersionMismatch {
        found: ArchiveCore,
        supported: ArchiveCore,
    },

    /// I/O error from the underlying sink/source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Shorthand for [`ArchiveError::InvalidDataFormat`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidDataFormat(reason.into())
    }

    /// A short read: fewer bytes than requested were available.
    pub fn short_read(expected: usize, actual: usize) -> Self {
        Self::StreamError {
            operation: "read",
            expected,
            actual,
        }
    }

    /// A short write: the sink accepted fewer bytes than offered.
    pub fn short_write(expected: usize, actual: usize) -> Self {
        Self::StreamError {
            operation: "write",
            expected,
            actual,
        }
    }
}

/// Result alias for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;
