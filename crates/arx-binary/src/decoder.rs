use arx_archive::{
    ArchiveCore, ArchiveError, ArchiveKind, ArchiveResult, ByteSource, DecodeLimits, Decoder,
};
use tracing::{debug, warn};

use crate::varint::decode_varint;
use crate::{HEADER_LEN, KIND, MAGIC, MINOR_VARINT_LENGTHS, MINOR_VERSION};

/// Validate a binary header and return its format version.
///
/// `bytes` must start with the header; anything after it is ignored.
pub fn parse_header(bytes: &[u8]) -> ArchiveResult<ArchiveCore> {
    let magic = &bytes[..bytes.len().min(MAGIC.len())];
    if magic != MAGIC {
        return Err(ArchiveError::UnrecognizedArchiveFormat {
            expected: hex::encode(MAGIC),
            actual: hex::encode(magic),
        });
    }
    if bytes.len() < HEADER_LEN {
        return Err(ArchiveError::short_read(HEADER_LEN, bytes.len()));
    }
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[4..8]);
    let major = u32::from_ne_bytes(word);
    word.copy_from_slice(&bytes[8..12]);
    let minor = u32::from_ne_bytes(word);

    let core = ArchiveCore::new(major, minor);
    let supported = ArchiveCore::current(MINOR_VERSION);
    if !core.readable_by(supported) {
        warn!(found = %core, %supported, "rejected binary archive version");
        return Err(ArchiveError::ArchiveVersionMismatch {
            found: core,
            supported,
        });
    }
    Ok(core)
}

/// Binary [`Decoder`] reading native-endian primitives from a borrowed source.
pub struct BinaryDecoder<'a> {
    source: &'a mut dyn ByteSource,
    core: ArchiveCore,
    limits: DecodeLimits,
}

impl<'a> BinaryDecoder<'a> {
    /// Read and validate the header.
    pub fn new(source: &'a mut dyn ByteSource, limits: DecodeLimits) -> ArchiveResult<Self> {
        if !source.is_open() {
            return Err(ArchiveError::StreamNotOpen);
        }
        let mut header = [0u8; HEADER_LEN];
        let read = source.read(&mut header)?;
        let core = parse_header(&header[..read])?;
        debug!(version = %core, "read binary archive header");
        Ok(Self {
            source,
            core,
            limits,
        })
    }

    fn take<const N: usize>(&mut self) -> ArchiveResult<[u8; N]> {
        let mut buf = [0u8; N];
        let read = self.source.read(&mut buf)?;
        if read != N {
            return Err(ArchiveError::short_read(N, read));
        }
        Ok(buf)
    }

    fn take_vec(&mut self, len: usize) -> ArchiveResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let read = self.source.read(&mut buf)?;
        if read != len {
            return Err(ArchiveError::short_read(len, read));
        }
        Ok(buf)
    }

    /// A length prefix, before any limit is applied.
    fn read_length_prefix(&mut self) -> ArchiveResult<u64> {
        if self.core.supports(MINOR_VARINT_LENGTHS) {
            decode_varint(|| self.take::<1>().map(|[b]| b))
        } else {
            self.take::<8>().map(u64::from_ne_bytes)
        }
    }
}

impl Decoder for BinaryDecoder<'_> {
    fn kind(&self) -> ArchiveKind {
        KIND
    }

    fn core(&self) -> ArchiveCore {
        self.core
    }

    fn limits(&self) -> &DecodeLimits {
        &self.limits
    }

    fn read_bool(&mut self) -> ArchiveResult<bool> {
        match self.take::<1>()? {
            [0] => Ok(false),
            [1] => Ok(true),
            [b] => Err(ArchiveError::invalid(format!("invalid bool byte {b:#04x}"))),
        }
    }

    fn read_i8(&mut self) -> ArchiveResult<i8> {
        self.take().map(i8::from_ne_bytes)
    }

    fn read_u8(&mut self) -> ArchiveResult<u8> {
        self.take().map(u8::from_ne_bytes)
    }

    fn read_i16(&mut self) -> ArchiveResult<i16> {
        self.take().map(i16::from_ne_bytes)
    }

    fn read_u16(&mut self) -> ArchiveResult<u16> {
        self.take().map(u16::from_ne_bytes)
    }

    fn read_i32(&mut self) -> ArchiveResult<i32> {
        self.take().map(i32::from_ne_bytes)
    }

    fn read_u32(&mut self) -> ArchiveResult<u32> {
        self.take().map(u32::from_ne_bytes)
    }

    fn read_i64(&mut self) -> ArchiveResult<i64> {
        self.take().map(i64::from_ne_bytes)
    }

    fn read_u64(&mut self) -> ArchiveResult<u64> {
        self.take().map(u64::from_ne_bytes)
    }

    fn read_f32(&mut self) -> ArchiveResult<f32> {
        self.take().map(f32::from_ne_bytes)
    }

    fn read_f64(&mut self) -> ArchiveResult<f64> {
        self.take().map(f64::from_ne_bytes)
    }

    fn read_string(&mut self) -> ArchiveResult<String> {
        let prefix = self.read_length_prefix()?;
        let len = self.limits.check_string(prefix).inspect_err(|_| {
            warn!(len = prefix, "string exceeds decode limit");
        })?;
        let bytes = self.take_vec(len)?;
        String::from_utf8(bytes).map_err(|e| ArchiveError::invalid(format!("invalid UTF-8: {e}")))
    }

    fn read_len(&mut self) -> ArchiveResult<usize> {
        let prefix = self.read_length_prefix()?;
        self.limits.check_sequence(prefix).inspect_err(|_| {
            warn!(len = prefix, "sequence exceeds decode limit");
        })
    }

    fn read_raw_data(&mut self, len: usize) -> ArchiveResult<Vec<u8>> {
        self.take_vec(len)
    }
}
