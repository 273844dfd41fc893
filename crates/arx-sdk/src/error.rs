use arx_archive::ArchiveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown archive format (leading bytes {0})")]
    UnknownFormat(String),
}

impl SdkError {
    /// The underlying archive error, if this is one.
    pub fn as_archive(&self) -> Option<&ArchiveError> {
        match self {
            Self::Archive(e) => Some(e),
            _ => None,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
