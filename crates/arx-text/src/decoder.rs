use std::str::FromStr;

use arx_archive::{
    ArchiveCore, ArchiveError, ArchiveKind, ArchiveResult, ByteSource, DecodeLimits, Decoder,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::{ID, KIND, MINOR_VERSION};

/// Longest token accepted where a number is expected.
const MAX_NUMBER_TOKEN: usize = 64;

/// Validate a complete header line and return its format version.
pub fn parse_header(line: &str) -> ArchiveResult<ArchiveCore> {
    match line.strip_prefix(ID) {
        Some(rest) => parse_versions(rest),
        None => Err(unrecognized(line.split_whitespace().next().unwrap_or(""))),
    }
}

fn unrecognized(actual: &str) -> ArchiveError {
    ArchiveError::UnrecognizedArchiveFormat {
        expected: ID.to_owned(),
        actual: actual.to_owned(),
    }
}

/// Parse the version tokens following the id. Major 0 archives carry no
/// minor token.
fn parse_versions(rest: &str) -> ArchiveResult<ArchiveCore> {
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        let suffix: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
        return Err(unrecognized(&format!("{ID}{suffix}")));
    }
    let mut tokens = rest.split_whitespace();
    let major = version_token(tokens.next(), "major")?;
    let minor = if major > 0 {
        version_token(tokens.next(), "minor")?
    } else {
        0
    };
    if let Some(extra) = tokens.next() {
        return Err(ArchiveError::invalid(format!(
            "unexpected header token {extra:?}"
        )));
    }

    let core = ArchiveCore::new(major, minor);
    let supported = ArchiveCore::current(MINOR_VERSION);
    if !core.readable_by(supported) {
        warn!(found = %core, %supported, "rejected text archive version");
        return Err(ArchiveError::ArchiveVersionMismatch {
            found: core,
            supported,
        });
    }
    Ok(core)
}

fn version_token(token: Option<&str>, which: &str) -> ArchiveResult<u32> {
    let token = token.ok_or_else(|| ArchiveError::invalid(format!("missing {which} version")))?;
    token
        .parse()
        .map_err(|_| ArchiveError::invalid(format!("malformed {which} version {token:?}")))
}

/// Text [`Decoder`] reading space-delimited tokens from a borrowed source.
pub struct TextDecoder<'a> {
    source: &'a mut dyn ByteSource,
    core: ArchiveCore,
    limits: DecodeLimits,
    /// Enclosing name-value fields, outermost first.
    fields: Vec<String>,
}

impl<'a> TextDecoder<'a> {
    /// Read and validate the header line.
    pub fn new(source: &'a mut dyn ByteSource, limits: DecodeLimits) -> ArchiveResult<Self> {
        if !source.is_open() {
            return Err(ArchiveError::StreamNotOpen);
        }
        let mut id = [0u8; ID.len()];
        let read = source.read(&mut id)?;
        if id[..read] != *ID.as_bytes() {
            return Err(unrecognized(&String::from_utf8_lossy(&id[..read])));
        }
        let mut rest = String::new();
        source.read_line(&mut rest)?;
        let core = parse_versions(&rest)?;
        debug!(version = %core, "read text archive header");
        Ok(Self {
            source,
            core,
            limits,
            fields: Vec::new(),
        })
    }

    /// Next whitespace-delimited token, or `None` at end of input.
    ///
    /// Strings containing spaces span several tokens; this is a lexical view
    /// for diagnostics, not a decode.
    pub fn next_token(&mut self) -> ArchiveResult<Option<String>> {
        let max = self.limits.max_string_len.max(MAX_NUMBER_TOKEN);
        self.read_token(max)
    }

    fn byte(&mut self) -> ArchiveResult<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.source.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    /// Skip leading whitespace, then collect bytes up to and including the
    /// next delimiter. The delimiter itself is consumed.
    fn read_token(&mut self, max: usize) -> ArchiveResult<Option<String>> {
        let mut token = Vec::new();
        loop {
            match self.byte()? {
                None => break,
                Some(b) if b.is_ascii_whitespace() => {
                    if !token.is_empty() {
                        break;
                    }
                }
                Some(b) => {
                    if token.len() == max {
                        let preview = String::from_utf8_lossy(&token[..max.min(16)]);
                        return Err(self.malformed("token", &format!("{preview}...")));
                    }
                    token.push(b);
                }
            }
        }
        if token.is_empty() {
            return Ok(None);
        }
        String::from_utf8(token)
            .map(Some)
            .map_err(|e| self.malformed("token", &String::from_utf8_lossy(e.as_bytes())))
    }

    fn expect_token(&mut self, max: usize) -> ArchiveResult<String> {
        self.read_token(max)?
            .ok_or_else(|| ArchiveError::short_read(1, 0))
    }

    fn number<T: FromStr>(&mut self, what: &str) -> ArchiveResult<T> {
        let token = self.expect_token(MAX_NUMBER_TOKEN)?;
        token.parse().map_err(|_| self.malformed(what, &token))
    }

    fn float<T: FromStr>(&mut self, nan: T, inf: T, neg_inf: T) -> ArchiveResult<T> {
        let token = self.expect_token(MAX_NUMBER_TOKEN)?;
        match token.as_str() {
            "nan" => Ok(nan),
            "inf" => Ok(inf),
            "-inf" => Ok(neg_inf),
            _ => token.parse().map_err(|_| self.malformed("float", &token)),
        }
    }

    fn read_char(&mut self) -> ArchiveResult<char> {
        let first = self.byte()?.ok_or_else(|| ArchiveError::short_read(1, 0))?;
        let width = match first {
            0x00..=0x7f => 1,
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf7 => 4,
            _ => return Err(self.malformed("string", &format!("{first:#04x}"))),
        };
        let mut buf = [first, 0, 0, 0];
        let read = self.source.read(&mut buf[1..width])?;
        if read != width - 1 {
            return Err(ArchiveError::short_read(width - 1, read));
        }
        std::str::from_utf8(&buf[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .ok_or_else(|| self.malformed("string", &format!("{:02x?}", &buf[..width])))
    }

    /// `InvalidDataFormat` naming the field being decoded, if any.
    fn malformed(&self, what: &str, token: &str) -> ArchiveError {
        if self.fields.is_empty() {
            ArchiveError::invalid(format!("malformed {what} token {token:?}"))
        } else {
            ArchiveError::invalid(format!(
                "malformed {what} token {token:?} in field `{}`",
                self.fields.join(".")
            ))
        }
    }
}

impl Decoder for TextDecoder<'_> {
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
        let token = self.expect_token(MAX_NUMBER_TOKEN)?;
        match token.as_str() {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(self.malformed("bool", &token)),
        }
    }

    fn read_i8(&mut self) -> ArchiveResult<i8> {
        self.number("i8")
    }

    fn read_u8(&mut self) -> ArchiveResult<u8> {
        self.number("u8")
    }

    fn read_i16(&mut self) -> ArchiveResult<i16> {
        self.number("i16")
    }

    fn read_u16(&mut self) -> ArchiveResult<u16> {
        self.number("u16")
    }

    fn read_i32(&mut self) -> ArchiveResult<i32> {
        self.number("i32")
    }

    fn read_u32(&mut self) -> ArchiveResult<u32> {
        self.number("u32")
    }

    fn read_i64(&mut self) -> ArchiveResult<i64> {
        self.number("i64")
    }

    fn read_u64(&mut self) -> ArchiveResult<u64> {
        self.number("u64")
    }

    fn read_f32(&mut self) -> ArchiveResult<f32> {
        self.float(f32::NAN, f32::INFINITY, f32::NEG_INFINITY)
    }

    fn read_f64(&mut self) -> ArchiveResult<f64> {
        self.float(f64::NAN, f64::INFINITY, f64::NEG_INFINITY)
    }

    fn read_string(&mut self) -> ArchiveResult<String> {
        let count: u64 = self.number("string length")?;
        let count = self.limits.check_string(count).inspect_err(|_| {
            warn!(len = count, "string exceeds decode limit");
        })?;
        let mut text = String::with_capacity(count);
        for _ in 0..count {
            text.push(self.read_char()?);
        }
        Ok(text)
    }

    fn read_len(&mut self) -> ArchiveResult<usize> {
        let len: u64 = self.number("length")?;
        self.limits.check_sequence(len).inspect_err(|_| {
            warn!(len, "sequence exceeds decode limit");
        })
    }

    fn read_raw_data(&mut self, len: usize) -> ArchiveResult<Vec<u8>> {
        let stored: usize = self.number("raw length")?;
        if stored != len {
            return Err(ArchiveError::invalid(format!(
                "raw block of {stored} bytes where {len} were expected"
            )));
        }
        if len == 0 {
            return Ok(Vec::new());
        }
        let encoded = self.expect_token(len.div_ceil(3) * 4)?;
        let bytes = STANDARD
            .decode(&encoded)
            .map_err(|_| self.malformed("base64", &encoded))?;
        if bytes.len() != len {
            return Err(ArchiveError::invalid(format!(
                "base64 block decodes to {} bytes, expected {len}",
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    fn begin_field(&mut self, name: &str) {
        self.fields.push(name.to_owned());
    }

    fn end_field(&mut self) {
        self.fields.pop();
    }
}
