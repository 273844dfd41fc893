use std::fmt;
use std::str::FromStr;

use arx_archive::ArchiveKind;
use serde::{Deserialize, Serialize};

/// One of the two concrete encodings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Binary,
    Text,
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Binary, Format::Text];

    /// Registry key of the codec.
    pub fn kind(self) -> ArchiveKind {
        match self {
            Self::Binary => arx_binary::KIND,
            Self::Text => arx_text::KIND,
        }
    }

    /// Identify an archive from its leading bytes.
    pub fn detect(prefix: &[u8]) -> Option<Self> {
        if arx_binary::is_binary(prefix) {
            Some(Self::Binary)
        } else if arx_text::is_text(prefix) {
            Some(Self::Text)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        self.kind().name()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(Self::Binary),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown format {other:?}, expected binary or text")),
        }
    }
}
