use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Class name written in place of a null pointer.
pub const NULL_CLASS_NAME: &str = "0";

/// Identity index written in place of a null tracked pointer.
///
/// Never inserted into an identity table.
pub const NULL_INDEX: i32 = -1;

/// Identity policy of a persistable type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tracking {
    /// Every occurrence is written in full; decoding yields independent copies.
    #[default]
    Untracked,
    /// The first occurrence is written in full, later ones as a back-reference.
    Tracked,
}

impl Tracking {
    /// Returns `true` for [`Tracking::Tracked`].
    pub fn is_tracked(self) -> bool {
        matches!(self, Self::Tracked)
    }
}

/// Capability descriptor of a persistable class.
///
/// A `ClassMeta` can come from a static per-type table or from a dynamic
/// per-instance lookup; the engine only ever sees the resulting value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassMeta {
    /// Registry key and wire name. Empty for primitive types.
    pub name: Cow<'static, str>,
    /// Current implementation version of the class.
    pub version: u8,
    /// Whether a version byte precedes every written body.
    pub version_stored: bool,
    /// Identity policy.
    pub tracking: Tracking,
}

impl ClassMeta {
    /// Metadata for a named class at the given version.
    ///
    /// Defaults to untracked with the version stored on the wire.
    pub const fn new(name: &'static str, version: u8) -> Self {
        Self {
            name: Cow::Borrowed(name),
            version,
            version_stored: true,
            tracking: Tracking::Untracked,
        }
    }

    /// Metadata for a class whose name is only known at runtime.
    pub fn dynamic(name: impl Into<String>, version: u8) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            version,
            version_stored: true,
            tracking: Tracking::Untracked,
        }
    }

    /// Metadata shared by all primitive element types.
    pub const fn primitive() -> Self {
        Self {
            name: Cow::Borrowed(""),
            version: 0,
            version_stored: false,
            tracking: Tracking::Untracked,
        }
    }

    /// Switch the class to [`Tracking::Tracked`].
    pub const fn tracked(mut self) -> Self {
        self.tracking = Tracking::Tracked;
        self
    }

    /// Omit the version byte from the wire.
    pub const fn without_version(mut self) -> Self {
        self.version_stored = false;
        self
    }

    /// Returns `true` if the identity of instances is tracked.
    pub fn is_tracked(&self) -> bool {
        self.tracking.is_tracked()
    }

    /// Returns `true` for primitive element types.
    pub fn is_primitive(&self) -> bool {
        self.name.is_empty()
    }

    /// Check a stored version against this implementation.
    pub fn accepts(&self, stored: u8) -> bool {
        stored <= self.version
    }
}

impl fmt::Debug for ClassMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassMeta({}@v{}", self.name, self.version)?;
        if self.is_tracked() {
            f.write_str(", tracked")?;
        }
        if !self.version_stored {
            f.write_str(", unversioned")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for ClassMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_primitive() {
            f.write_str("<primitive>")
        } else {
            write!(f, "{} v{}", self.name, self.version)
        }
    }
}
