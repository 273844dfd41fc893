use std::fmt;

/// Identifies a concrete codec.
///
/// Registries keep one table per kind, so a serializer registered for one
/// codec is invisible to the others. The set is open: each codec crate
/// declares its own constant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveKind(&'static str);

impl ArchiveKind {
    /// Declare a kind. Names must be unique per process.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The kind's name.
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchiveKind({})", self.0)
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
