//! Low-level hooks a concrete codec provides to the engine.
//!
//! The [`Writer`](crate::Writer) and [`Reader`](crate::Reader) own all
//! graph-level logic (identity, polymorphism, versions) and delegate every
//! primitive to these traits. A codec decides only how each primitive looks
//! on the wire.

use arx_types::{ArchiveCore, ArchiveKind, ArchiveResult, DecodeLimits};

/// Primitive write hooks of a concrete codec.
pub trait Encoder {
    /// Registry key of this codec.
    fn kind(&self) -> ArchiveKind;

    /// Format version written in the header.
    fn core(&self) -> ArchiveCore;

    fn write_bool(&mut self, value: bool) -> ArchiveResult<()>;
    fn write_i8(&mut self, value: i8) -> ArchiveResult<()>;
    fn write_u8(&mut self, value: u8) -> ArchiveResult<()>;
    fn write_i16(&mut self, value: i16) -> ArchiveResult<()>;
    fn write_u16(&mut self, value: u16) -> ArchiveResult<()>;
    fn write_i32(&mut self, value: i32) -> ArchiveResult<()>;
    fn write_u32(&mut self, value: u32) -> ArchiveResult<()>;
    fn write_i64(&mut self, value: i64) -> ArchiveResult<()>;
    fn write_u64(&mut self, value: u64) -> ArchiveResult<()>;
    fn write_f32(&mut self, value: f32) -> ArchiveResult<()>;
    fn write_f64(&mut self, value: f64) -> ArchiveResult<()>;
    fn write_str(&mut self, value: &str) -> ArchiveResult<()>;

    /// Element count of a sequence or array.
    fn write_len(&mut self, len: usize) -> ArchiveResult<()>;

    /// An opaque block whose length the reader already knows.
    fn write_raw_data(&mut self, bytes: &[u8]) -> ArchiveResult<()>;

    fn write_class_name(&mut self, name: &str) -> ArchiveResult<()> {
        self.write_str(name)
    }

    fn write_version(&mut self, version: u8) -> ArchiveResult<()> {
        self.write_u8(version)
    }

    fn write_index(&mut self, index: i32) -> ArchiveResult<()> {
        self.write_i32(index)
    }

    /// Enter a name-value pair. Codecs that do not carry names ignore it.
    fn begin_field(&mut self, _name: &str) {}

    fn end_field(&mut self) {}

    fn flush(&mut self) -> ArchiveResult<()>;
}

/// Primitive read hooks of a concrete codec.
pub trait Decoder {
    /// Registry key of this codec.
    fn kind(&self) -> ArchiveKind;

    /// Format version read from the header.
    fn core(&self) -> ArchiveCore;

    /// Allocation caps for lengths read from the wire.
    fn limits(&self) -> &DecodeLimits;

    fn read_bool(&mut self) -> ArchiveResult<bool>;
    fn read_i8(&mut self) -> ArchiveResult<i8>;
    fn read_u8(&mut self) -> ArchiveResult<u8>;
    fn read_i16(&mut self) -> ArchiveResult<i16>;
    fn read_u16(&mut self) -> ArchiveResult<u16>;
    fn read_i32(&mut self) -> ArchiveResult<i32>;
    fn read_u32(&mut self) -> ArchiveResult<u32>;
    fn read_i64(&mut self) -> ArchiveResult<i64>;
    fn read_u64(&mut self) -> ArchiveResult<u64>;
    fn read_f32(&mut self) -> ArchiveResult<f32>;
    fn read_f64(&mut self) -> ArchiveResult<f64>;
    fn read_string(&mut self) -> ArchiveResult<String>;

    /// Element count of a sequence or array, already checked against
    /// [`DecodeLimits::max_sequence_len`].
    fn read_len(&mut self) -> ArchiveResult<usize>;

    /// An opaque block of exactly `len` bytes.
    fn read_raw_data(&mut self, len: usize) -> ArchiveResult<Vec<u8>>;

    fn read_class_name(&mut self) -> ArchiveResult<String> {
        self.read_string()
    }

    fn read_version(&mut self) -> ArchiveResult<u8> {
        self.read_u8()
    }

    fn read_index(&mut self) -> ArchiveResult<i32> {
        self.read_i32()
    }

    /// Enter a name-value pair. Codecs may use the name for diagnostics.
    fn begin_field(&mut self, _name: &str) {}

    fn end_field(&mut self) {}
}
