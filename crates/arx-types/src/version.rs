use std::fmt;

use serde::{Deserialize, Serialize};

/// Engine-wide major format version shared by every codec.
pub const ENGINE_MAJOR_VERSION: u32 = 1;

/// The two-part format version of one archive.
///
/// The major version belongs to the engine and must match exactly between
/// writer and reader. The minor version belongs to the concrete codec and
/// gates format-specific decode branches. Both are fixed when the codec is
/// constructed and never change afterwards.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveCore {
    major: u32,
    minor: u32,
}

impl ArchiveCore {
    /// Create the core for a freshly opened archive.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Core for a codec writing at the current engine major version.
    pub const fn current(minor: u32) -> Self {
        Self::new(ENGINE_MAJOR_VERSION, minor)
    }

    /// Engine-wide major version.
    pub fn major(&self) -> u32 {
        self.major
    }

    /// Format-specific minor version.
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Returns `true` if the archive was written at `minor` or later.
    pub fn supports(&self, minor: u32) -> bool {
        self.minor >= minor
    }

    /// Returns `true` if a reader at `supported` can decode this archive.
    ///
    /// Majors must match exactly; the minor may not be newer.
    pub fn readable_by(&self, supported: ArchiveCore) -> bool {
        self.major == supported.major && self.minor <= supported.minor
    }
}

impl fmt::Debug for ArchiveCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchiveCore({}.{})", self.major, self.minor)
    }
}

impl fmt::Display for ArchiveCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
