use arx_archive::{ArchiveError, ArchiveResult};

/// Longest LEB128 encoding of a `u64`.
pub(crate) const MAX_VARINT_LEN: usize = 10;

/// Encode a u64 as a variable-length integer.
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a variable-length integer, pulling one byte at a time.
pub(crate) fn decode_varint(
    mut next_byte: impl FnMut() -> ArchiveResult<u8>,
) -> ArchiveResult<u64> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for _ in 0..MAX_VARINT_LEN {
        let byte = next_byte()?;
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ArchiveError::invalid("varint overflow"))
}
