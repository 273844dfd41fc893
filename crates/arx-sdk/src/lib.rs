//! High-level SDK for ARX archives.
//!
//! Bundles a shared [`Registry`] with codec settings and offers one-call
//! save and load helpers over memory and files, with format auto-detection.
//! This is the main entry point for applications embedding ARX.

pub mod arx;
pub mod config;
pub mod error;
pub mod format;
pub mod inspect;

#[cfg(test)]
mod scenarios;

pub use arx::Arx;
pub use config::ArxConfig;
pub use error::{SdkError, SdkResult};
pub use format::Format;
pub use inspect::{inspect, ArchiveInfo};

// Re-export the engine surface applications implement against.
pub use arx_archive::{
    nvp, shared, ArchiveError, ArchiveResult, ClassMeta, Decode, Decoded, DecodeLimits, Encode,
    Instance, Object, Persist, Reader, RegistrationGuard, RegistrationKey, Registry, Shared,
    SharedObject, Tracking, Writer,
};
pub use arx_binary::BinaryConfig;
pub use arx_text::TextConfig;
