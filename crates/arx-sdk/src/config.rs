use arx_archive::DecodeLimits;
use arx_binary::BinaryConfig;
use arx_text::TextConfig;
use serde::{Deserialize, Serialize};

use crate::format::Format;

/// Aggregate configuration for an [`Arx`](crate::Arx) instance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArxConfig {
    /// Format used when saving without an explicit one.
    pub format: Format,
    pub binary: BinaryConfig,
    pub text: TextConfig,
}

impl ArxConfig {
    /// Apply the same decode limits to both codecs.
    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.binary.limits = limits.clone();
        self.text.limits = limits;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}
