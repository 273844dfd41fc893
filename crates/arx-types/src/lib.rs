//! Foundation types for the ARX archive engine.
//!
//! This crate holds the vocabulary shared by the engine and every codec:
//! per-class capability metadata, the two-part archive format version, the
//! open set of archive kinds, decode limits, and the error taxonomy. Every
//! other ARX crate depends on `arx-types`.
//!
//! # Key Types
//!
//! - [`ClassMeta`] — Declared name, version, and policy of a persistable type
//! - [`Tracking`] — Whether repeated occurrences of one identity are deduplicated
//! - [`ArchiveCore`] — Engine-wide major and format-specific minor version
//! - [`ArchiveKind`] — Identifies a concrete codec for registry lookups
//! - [`DecodeLimits`] — Allocation caps applied while decoding untrusted input
//! - [`ArchiveError`] — The failure taxonomy shared by all codecs

pub mod class;
pub mod error;
pub mod kind;
pub mod limits;
pub mod version;

pub use class::{ClassMeta, Tracking, NULL_CLASS_NAME, NULL_INDEX};
pub use error::{ArchiveError, ArchiveResult};
pub use kind::ArchiveKind;
pub use limits::DecodeLimits;
pub use version::{ArchiveCore, ENGINE_MAJOR_VERSION};
