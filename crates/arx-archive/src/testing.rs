//! A codec that records tokens instead of bytes, for exercising the engines
//! without a concrete wire format.

use arx_types::{ArchiveCore, ArchiveError, ArchiveKind, ArchiveResult, DecodeLimits};

use crate::codec::{Decoder, Encoder};
use crate::reader::Reader;
use crate::registry::Registry;
use crate::writer::Writer;

pub(crate) const KIND: ArchiveKind = ArchiveKind::new("recording");

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Len(usize),
    Raw(Vec<u8>),
    Class(String),
    Version(u8),
    Index(i32),
    Begin(String),
    End,
}

pub(crate) struct RecordingEncoder<'t> {
    tokens: &'t mut Vec<Token>,
}

impl Encoder for RecordingEncoder<'_> {
    fn kind(&self) -> ArchiveKind {
        KIND
    }

    fn core(&self) -> ArchiveCore {
        ArchiveCore::current(0)
    }

    fn write_bool(&mut self, value: bool) -> ArchiveResult<()> {
        self.tokens.push(Token::Bool(value));
        Ok(())
    }

    fn write_i8(&mut self, value: i8) -> ArchiveResult<()> {
        self.write_i64(value.into())
    }

    fn write_u8(&mut self, value: u8) -> ArchiveResult<()> {
        self.write_u64(value.into())
    }

    fn write_i16(&mut self, value: i16) -> ArchiveResult<()> {
        self.write_i64(value.into())
    }

    fn write_u16(&mut self, value: u16) -> ArchiveResult<()> {
        self.write_u64(value.into())
    }

    fn write_i32(&mut self, value: i32) -> ArchiveResult<()> {
        self.write_i64(value.into())
    }

    fn write_u32(&mut self, value: u32) -> ArchiveResult<()> {
        self.write_u64(value.into())
    }

    fn write_i64(&mut self, value: i64) -> ArchiveResult<()> {
        self.tokens.push(Token::Int(value));
        Ok(())
    }

    fn write_u64(&mut self, value: u64) -> ArchiveResult<()> {
        self.tokens.push(Token::UInt(value));
        Ok(())
    }

    fn write_f32(&mut self, value: f32) -> ArchiveResult<()> {
        self.write_f64(value.into())
    }

    fn write_f64(&mut self, value: f64) -> ArchiveResult<()> {
        self.tokens.push(Token::Float(value));
        Ok(())
    }

    fn write_str(&mut self, value: &str) -> ArchiveResult<()> {
        self.tokens.push(Token::Str(value.to_string()));
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> ArchiveResult<()> {
        self.tokens.push(Token::Len(len));
        Ok(())
    }

    fn write_raw_data(&mut self, bytes: &[u8]) -> ArchiveResult<()> {
        self.tokens.push(Token::Raw(bytes.to_vec()));
        Ok(())
    }

    fn write_class_name(&mut self, name: &str) -> ArchiveResult<()> {
        self.tokens.push(Token::Class(name.to_string()));
        Ok(())
    }

    fn write_version(&mut self, version: u8) -> ArchiveResult<()> {
        self.tokens.push(Token::Version(version));
        Ok(())
    }

    fn write_index(&mut self, index: i32) -> ArchiveResult<()> {
        self.tokens.push(Token::Index(index));
        Ok(())
    }

    fn begin_field(&mut self, name: &str) {
        self.tokens.push(Token::Begin(name.to_string()));
    }

    fn end_field(&mut self) {
        self.tokens.push(Token::End);
    }

    fn flush(&mut self) -> ArchiveResult<()> {
        Ok(())
    }
}

pub(crate) struct ReplayDecoder<'t> {
    tokens: &'t [Token],
    pos: usize,
    limits: DecodeLimits,
}

impl<'t> ReplayDecoder<'t> {
    fn next(&mut self) -> ArchiveResult<&'t Token> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| ArchiveError::short_read(1, 0))?;
        self.pos += 1;
        Ok(token)
    }

    fn int(&mut self) -> ArchiveResult<i64> {
        match self.next()? {
            Token::Int(v) => Ok(*v),
            other => Err(unexpected("int", other)),
        }
    }

    fn uint(&mut self) -> ArchiveResult<u64> {
        match self.next()? {
            Token::UInt(v) => Ok(*v),
            other => Err(unexpected("uint", other)),
        }
    }

    fn skip_if(&mut self, pred: impl FnOnce(&Token) -> bool) {
        if self.tokens.get(self.pos).is_some_and(pred) {
            self.pos += 1;
        }
    }
}

fn unexpected(wanted: &str, found: &Token) -> ArchiveError {
    ArchiveError::invalid(format!("expected {wanted}, found {found:?}"))
}

fn out_of_range(value: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::invalid(format!("{value} out of range"))
}

impl Decoder for ReplayDecoder<'_> {
    fn kind(&self) -> ArchiveKind {
        KIND
    }

    fn core(&self) -> ArchiveCore {
        ArchiveCore::current(0)
    }

    fn limits(&self) -> &DecodeLimits {
        &self.limits
    }

    fn read_bool(&mut self) -> ArchiveResult<bool> {
        match self.next()? {
            Token::Bool(v) => Ok(*v),
            other => Err(unexpected("bool", other)),
        }
    }

    fn read_i8(&mut self) -> ArchiveResult<i8> {
        let v = self.int()?;
        i8::try_from(v).map_err(|_| out_of_range(v))
    }

    fn read_u8(&mut self) -> ArchiveResult<u8> {
        let v = self.uint()?;
        u8::try_from(v).map_err(|_| out_of_range(v))
    }

    fn read_i16(&mut self) -> ArchiveResult<i16> {
        let v = self.int()?;
        i16::try_from(v).map_err(|_| out_of_range(v))
    }

    fn read_u16(&mut self) -> ArchiveResult<u16> {
        let v = self.uint()?;
        u16::try_from(v).map_err(|_| out_of_range(v))
    }

    fn read_i32(&mut self) -> ArchiveResult<i32> {
        let v = self.int()?;
        i32::try_from(v).map_err(|_| out_of_range(v))
    }

    fn read_u32(&mut self) -> ArchiveResult<u32> {
        let v = self.uint()?;
        u32::try_from(v).map_err(|_| out_of_range(v))
    }

    fn read_i64(&mut self) -> ArchiveResult<i64> {
        self.int()
    }

    fn read_u64(&mut self) -> ArchiveResult<u64> {
        self.uint()
    }

    fn read_f32(&mut self) -> ArchiveResult<f32> {
        Ok(self.read_f64()? as f32)
    }

    fn read_f64(&mut self) -> ArchiveResult<f64> {
        match self.next()? {
            Token::Float(v) => Ok(*v),
            other => Err(unexpected("float", other)),
        }
    }

    fn read_string(&mut self) -> ArchiveResult<String> {
        match self.next()? {
            Token::Str(v) => Ok(v.clone()),
            other => Err(unexpected("string", other)),
        }
    }

    fn read_len(&mut self) -> ArchiveResult<usize> {
        match self.next()? {
            Token::Len(v) => self.limits.check_sequence(*v as u64),
            other => Err(unexpected("length", other)),
        }
    }

    fn read_raw_data(&mut self, len: usize) -> ArchiveResult<Vec<u8>> {
        match self.next()? {
            Token::Raw(bytes) if bytes.len() == len => Ok(bytes.clone()),
            other => Err(unexpected("raw block", other)),
        }
    }

    fn read_class_name(&mut self) -> ArchiveResult<String> {
        match self.next()? {
            Token::Class(v) => Ok(v.clone()),
            other => Err(unexpected("class name", other)),
        }
    }

    fn read_version(&mut self) -> ArchiveResult<u8> {
        match self.next()? {
            Token::Version(v) => Ok(*v),
            other => Err(unexpected("version", other)),
        }
    }

    fn read_index(&mut self) -> ArchiveResult<i32> {
        match self.next()? {
            Token::Index(v) => Ok(*v),
            other => Err(unexpected("index", other)),
        }
    }

    fn begin_field(&mut self, _name: &str) {
        self.skip_if(|token| matches!(token, Token::Begin(_)));
    }

    fn end_field(&mut self) {
        self.skip_if(|token| matches!(token, Token::End));
    }
}

pub(crate) fn recording_writer<'a>(tokens: &'a mut Vec<Token>, registry: &'a Registry) -> Writer<'a> {
    Writer::new(Box::new(RecordingEncoder { tokens }), registry)
}

pub(crate) fn recording_reader<'a>(tokens: &'a [Token], registry: &'a Registry) -> Reader<'a> {
    let decoder = ReplayDecoder {
        tokens,
        pos: 0,
        limits: DecodeLimits::default(),
    };
    Reader::new(Box::new(decoder), registry)
}

/// Encode with `write` and return the recorded tokens.
pub(crate) fn record(
    registry: &Registry,
    write: impl FnOnce(&mut Writer<'_>) -> ArchiveResult<()>,
) -> Vec<Token> {
    let mut tokens = Vec::new();
    {
        let mut out = recording_writer(&mut tokens, registry);
        write(&mut out).expect("recording failed");
    }
    tokens
}

pub(crate) mod fixtures {
    use arx_types::{ArchiveResult, ClassMeta};

    use crate::persist::{Persist, Shared, SharedObject};
    use crate::reader::Reader;
    use crate::writer::Writer;

    #[derive(Clone, Debug, Default, PartialEq)]
    pub(crate) struct Point {
        pub x: i32,
        pub y: i32,
    }

    impl Persist for Point {
        fn meta() -> ClassMeta {
            ClassMeta::new("Point", 1)
        }

        fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
            out.encode(&self.x)?;
            out.encode(&self.y)
        }

        fn load(&mut self, input: &mut Reader<'_>, _version: u8) -> ArchiveResult<()> {
            input.decode(&mut self.x)?;
            input.decode(&mut self.y)
        }
    }

    /// An older build of `Point` that only knows version 0.
    #[derive(Debug, Default)]
    pub(crate) struct PointV0 {
        pub x: i32,
        pub y: i32,
    }

    impl Persist for PointV0 {
        fn meta() -> ClassMeta {
            ClassMeta::new("Point", 0)
        }

        fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
            out.encode(&self.x)?;
            out.encode(&self.y)
        }

        fn load(&mut self, input: &mut Reader<'_>, _version: u8) -> ArchiveResult<()> {
            input.decode(&mut self.x)?;
            input.decode(&mut self.y)
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct Label {
        pub text: String,
    }

    impl Persist for Label {
        fn meta() -> ClassMeta {
            ClassMeta::new("Label", 0)
        }

        fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
            out.encode(&self.text)
        }

        fn load(&mut self, input: &mut Reader<'_>, _version: u8) -> ArchiveResult<()> {
            input.decode(&mut self.text)
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct Node {
        pub value: i32,
        pub next: Option<Shared<Node>>,
    }

    impl Node {
        pub(crate) fn leaf(value: i32) -> Self {
            Self { value, next: None }
        }
    }

    impl Persist for Node {
        fn meta() -> ClassMeta {
            ClassMeta::new("Node", 2).tracked()
        }

        fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
            out.encode(&self.value)?;
            out.encode(&self.next)
        }

        fn load(&mut self, input: &mut Reader<'_>, _version: u8) -> ArchiveResult<()> {
            input.decode(&mut self.value)?;
            input.decode(&mut self.next)
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct Holder {
        pub item: Option<SharedObject>,
    }

    impl Persist for Holder {
        fn meta() -> ClassMeta {
            ClassMeta::new("Holder", 1).tracked()
        }

        fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
            out.encode(&self.item)
        }

        fn load(&mut self, input: &mut Reader<'_>, _version: u8) -> ArchiveResult<()> {
            input.decode(&mut self.item)
        }
    }
}
