use arx_archive::{ArchiveCore, ArchiveError, ArchiveKind, ArchiveResult, ByteSink, Encoder};
use tracing::debug;

use crate::varint::encode_varint;
use crate::{KIND, MAGIC, MINOR_VARINT_LENGTHS, MINOR_VERSION};

/// Binary [`Encoder`] writing native-endian primitives to a borrowed sink.
pub struct BinaryEncoder<'a> {
    sink: &'a mut dyn ByteSink,
    core: ArchiveCore,
    scratch: Vec<u8>,
}

impl<'a> BinaryEncoder<'a> {
    /// Write the header at the given minor version and return the encoder.
    pub fn new(sink: &'a mut dyn ByteSink, minor: u32) -> ArchiveResult<Self> {
        if !sink.is_open() {
            return Err(ArchiveError::StreamNotOpen);
        }
        let core = ArchiveCore::current(minor);
        let supported = ArchiveCore::current(MINOR_VERSION);
        if !core.readable_by(supported) {
            return Err(ArchiveError::ArchiveVersionMismatch {
                found: core,
                supported,
            });
        }
        let mut encoder = Self {
            sink,
            core,
            scratch: Vec::with_capacity(16),
        };
        encoder.put(&MAGIC)?;
        encoder.put(&core.major().to_ne_bytes())?;
        encoder.put(&core.minor().to_ne_bytes())?;
        debug!(version = %core, "wrote binary archive header");
        Ok(encoder)
    }

    fn put(&mut self, bytes: &[u8]) -> ArchiveResult<()> {
        let written = self.sink.write(bytes)?;
        if written != bytes.len() {
            return Err(ArchiveError::short_write(bytes.len(), written));
        }
        Ok(())
    }
}

impl Encoder for BinaryEncoder<'_> {
    fn kind(&self) -> ArchiveKind {
        KIND
    }

    fn core(&self) -> ArchiveCore {
        self.core
    }

    fn write_bool(&mut self, value: bool) -> ArchiveResult<()> {
        self.put(&[value as u8])
    }

    fn write_i8(&mut self, value: i8) -> ArchiveResult<()> {
        self.put(&value.to_ne_bytes())
    }

    fn write_u8(&mut self, value: u8) -> ArchiveResult<()> {
        self.put(&[value])
    }

    fn write_i16(&mut self, value: i16) -> ArchiveResult<()> {
        self.put(&value.to_ne_bytes())
    }

    fn write_u16(&mut self, value: u16) -> ArchiveResult<()> {
        self.put(&value.to_ne_bytes())
    }

    fn write_i32(&mut self, value: i32) -> ArchiveResult<()> {
        self.put(&value.to_ne_bytes())
    }

    fn write_u32(&mut self, value: u32) -> ArchiveResult<()> {
        self.put(&value.to_ne_bytes())
    }

    fn write_i64(&mut self, value: i64) -> ArchiveResult<()> {
        self.put(&value.to_ne_bytes())
    }

    fn write_u64(&mut self, value: u64) -> ArchiveResult<()> {
        self.put(&value.to_ne_bytes())
    }

    fn write_f32(&mut self, value: f32) -> ArchiveResult<()> {
        self.put(&value.to_ne_bytes())
    }

    fn write_f64(&mut self, value: f64) -> ArchiveResult<()> {
        self.put(&value.to_ne_bytes())
    }

    fn write_str(&mut self, value: &str) -> ArchiveResult<()> {
        self.write_len(value.len())?;
        self.put(value.as_bytes())
    }

    fn write_len(&mut self, len: usize) -> ArchiveResult<()> {
        if self.core.supports(MINOR_VARINT_LENGTHS) {
            let mut scratch = std::mem::take(&mut self.scratch);
            scratch.clear();
            encode_varint(&mut scratch, len as u64);
            let result = self.put(&scratch);
            self.scratch = scratch;
            result
        } else {
            self.put(&(len as u64).to_ne_bytes())
        }
    }

    fn write_raw_data(&mut self, bytes: &[u8]) -> ArchiveResult<()> {
        self.put(bytes)
    }

    fn flush(&mut self) -> ArchiveResult<()> {
        self.sink.flush()?;
        Ok(())
    }
}
