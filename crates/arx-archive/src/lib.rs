//! Codec-agnostic object-graph archive engine.
//!
//! An archive session walks an in-memory object graph and hands every
//! primitive to a concrete codec, while the engine itself preserves shared
//! and cyclic identity, resolves polymorphic classes by name, and enforces
//! per-class versions.
//!
//! # Architecture
//!
//! - [`Writer`] / [`Reader`] -- the output and input engines, one per session
//! - [`Encoder`] / [`Decoder`] -- primitive hooks a concrete codec implements
//! - [`Persist`] / [`Object`] -- static and dynamic capability traits of user types
//! - [`Registry`] -- serializer and factory tables for polymorphic values
//! - [`ByteSink`] / [`ByteSource`] -- the borrowed stream underneath a codec
//!
//! # Identity Rules
//!
//! 1. Tracked identities get dense handles from 0 in first-sighting order.
//! 2. The wire index `-1` and the class name `"0"` denote null.
//! 3. A tracked identity is written in full once per session, except that a
//!    value first reached through a pointer is written again at its value
//!    position.
//! 4. Back-references resolve through a handle arena, so moving a decoded
//!    value updates a single slot.
//! 5. A failed body releases its identity slot before the error propagates.

pub mod codec;
pub mod encode;
pub mod identity;
pub mod persist;
pub mod reader;
pub mod registry;
pub mod stream;
pub mod writer;

#[cfg(test)]
mod testing;

pub use codec::{Decoder, Encoder};
pub use encode::{nvp, Decode, Encode, NameValue, RawElement};
pub use identity::{Handle, Location};
pub use persist::{shared, Instance, Object, Persist, Shared, SharedObject};
pub use reader::{Decoded, Reader};
pub use registry::{
    Factory, FactoryScope, RegistrationGuard, RegistrationKey, Registry, Serializer,
    TypeFactory, TypeSerializer,
};
pub use stream::{ByteSink, ByteSource, IoSink, IoSource};
pub use writer::Writer;

// Codecs and callers need the shared vocabulary without a direct dependency.
pub use arx_types::{
    ArchiveCore, ArchiveError, ArchiveKind, ArchiveResult, ClassMeta, DecodeLimits, Tracking,
    ENGINE_MAJOR_VERSION, NULL_CLASS_NAME, NULL_INDEX,
};
