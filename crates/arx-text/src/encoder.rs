use std::fmt;

use arx_archive::{ArchiveCore, ArchiveError, ArchiveKind, ArchiveResult, ByteSink, Encoder};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::{ID, KIND, MINOR_VERSION};

/// Render a float so that `nan`, `inf` and `-inf` survive a round trip.
///
/// Finite values use the shortest representation that parses back to the
/// same bits.
pub(crate) fn float_token<F>(value: F) -> String
where
    F: Copy + fmt::Debug + Into<f64>,
{
    let wide: f64 = value.into();
    if wide.is_nan() {
        "nan".to_owned()
    } else if wide == f64::INFINITY {
        "inf".to_owned()
    } else if wide == f64::NEG_INFINITY {
        "-inf".to_owned()
    } else {
        format!("{value:?}")
    }
}

/// Format the header line for a version.
pub(crate) fn header_line(core: ArchiveCore) -> String {
    if core.major() > 0 {
        format!("{ID} {} {}\n", core.major(), core.minor())
    } else {
        format!("{ID} {}\n", core.major())
    }
}

/// Text [`Encoder`] writing space-delimited tokens to a borrowed sink.
pub struct TextEncoder<'a> {
    sink: &'a mut dyn ByteSink,
    core: ArchiveCore,
    /// Whether the current line already holds a token.
    line_open: bool,
}

impl<'a> TextEncoder<'a> {
    /// Write the header line at the given minor version and return the encoder.
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
            line_open: false,
        };
        encoder.put(header_line(core).as_bytes())?;
        debug!(version = %core, "wrote text archive header");
        Ok(encoder)
    }

    fn put(&mut self, bytes: &[u8]) -> ArchiveResult<()> {
        let written = self.sink.write(bytes)?;
        if written != bytes.len() {
            return Err(ArchiveError::short_write(bytes.len(), written));
        }
        Ok(())
    }

    fn token(&mut self, token: &str) -> ArchiveResult<()> {
        if self.line_open {
            self.put(b" ")?;
        }
        self.put(token.as_bytes())?;
        self.line_open = true;
        Ok(())
    }

    fn display(&mut self, value: impl fmt::Display) -> ArchiveResult<()> {
        self.token(&value.to_string())
    }
}

impl Encoder for TextEncoder<'_> {
    fn kind(&self) -> ArchiveKind {
        KIND
    }

    fn core(&self) -> ArchiveCore {
        self.core
    }

    fn write_bool(&mut self, value: bool) -> ArchiveResult<()> {
        self.token(if value { "1" } else { "0" })
    }

    fn write_i8(&mut self, value: i8) -> ArchiveResult<()> {
        self.display(value)
    }

    fn write_u8(&mut self, value: u8) -> ArchiveResult<()> {
        self.display(value)
    }

    fn write_i16(&mut self, value: i16) -> ArchiveResult<()> {
        self.display(value)
    }

    fn write_u16(&mut self, value: u16) -> ArchiveResult<()> {
        self.display(value)
    }

    fn write_i32(&mut self, value: i32) -> ArchiveResult<()> {
        self.display(value)
    }

    fn write_u32(&mut self, value: u32) -> ArchiveResult<()> {
        self.display(value)
    }

    fn write_i64(&mut self, value: i64) -> ArchiveResult<()> {
        self.display(value)
    }

    fn write_u64(&mut self, value: u64) -> ArchiveResult<()> {
        self.display(value)
    }

    fn write_f32(&mut self, value: f32) -> ArchiveResult<()> {
        self.token(&float_token(value))
    }

    fn write_f64(&mut self, value: f64) -> ArchiveResult<()> {
        self.token(&float_token(value))
    }

    /// Character count, one space, then the literal text.
    fn write_str(&mut self, value: &str) -> ArchiveResult<()> {
        self.display(value.chars().count())?;
        self.put(b" ")?;
        self.put(value.as_bytes())
    }

    fn write_len(&mut self, len: usize) -> ArchiveResult<()> {
        self.display(len)
    }

    /// Byte length, then the padded base64 text. An empty block has no
    /// base64 token.
    fn write_raw_data(&mut self, bytes: &[u8]) -> ArchiveResult<()> {
        self.display(bytes.len())?;
        if bytes.is_empty() {
            return Ok(());
        }
        self.token(&STANDARD.encode(bytes))
    }

    fn flush(&mut self) -> ArchiveResult<()> {
        if self.line_open {
            self.put(b"\n")?;
            self.line_open = false;
        }
        self.sink.flush()?;
        Ok(())
    }
}
