//! Value shapes the engine knows how to walk.
//!
//! [`Encode`] and [`Decode`] are implemented for primitives, strings,
//! sequences of persistable values, and every pointer flavour. User types
//! implement [`Persist`] and are written as values with
//! [`Writer::encode_value`] or through one of the pointer shapes.

use arx_types::ArchiveResult;

use crate::persist::{Object, Persist, Shared, SharedObject};
use crate::reader::Reader;
use crate::writer::Writer;

/// A shape the [`Writer`] can encode.
pub trait Encode {
    fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()>;
}

/// A shape the [`Reader`] can decode in place.
pub trait Decode {
    fn decode(&mut self, input: &mut Reader<'_>) -> ArchiveResult<()>;
}

macro_rules! primitive_shape {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
                    out.encoder_mut().$write(*self)
                }
            }

            impl Decode for $ty {
                fn decode(&mut self, input: &mut Reader<'_>) -> ArchiveResult<()> {
                    *self = input.decoder_mut().$read()?;
                    Ok(())
                }
            }
        )*
    };
}

primitive_shape! {
    bool => write_bool, read_bool;
    i8 => write_i8, read_i8;
    u8 => write_u8, read_u8;
    i16 => write_i16, read_i16;
    u16 => write_u16, read_u16;
    i32 => write_i32, read_i32;
    u32 => write_u32, read_u32;
    i64 => write_i64, read_i64;
    u64 => write_u64, read_u64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

impl Encode for str {
    fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.encoder_mut().write_str(self)
    }
}

impl Encode for String {
    fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.encoder_mut().write_str(self)
    }
}

impl Decode for String {
    fn decode(&mut self, input: &mut Reader<'_>) -> ArchiveResult<()> {
        *self = input.decoder_mut().read_string()?;
        Ok(())
    }
}

impl<T: Persist> Encode for [T] {
    fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.encode_values(self)
    }
}

impl<T: Persist> Encode for Vec<T> {
    fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.encode_values(self)
    }
}

impl<T: Persist> Decode for Vec<T> {
    fn decode(&mut self, input: &mut Reader<'_>) -> ArchiveResult<()> {
        input.decode_values(self)
    }
}

/// Shared storage encoded in place: the value path with cell identity.
impl<T: Persist> Encode for Shared<T> {
    fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.encode_owned(self)
    }
}

impl<T: Persist> Decode for Shared<T> {
    fn decode(&mut self, input: &mut Reader<'_>) -> ArchiveResult<()> {
        input.decode_owned(self).map(|_| ())
    }
}

impl<T: Persist> Encode for Option<Shared<T>> {
    fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.encode_pointer(self.as_ref())
    }
}

impl<T: Persist> Decode for Option<Shared<T>> {
    fn decode(&mut self, input: &mut Reader<'_>) -> ArchiveResult<()> {
        *self = input.decode_pointer()?;
        Ok(())
    }
}

impl<T: Persist> Encode for Option<Box<T>> {
    fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.encode_boxed(self.as_deref())
    }
}

impl<T: Persist> Decode for Option<Box<T>> {
    fn decode(&mut self, input: &mut Reader<'_>) -> ArchiveResult<()> {
        *self = input.decode_boxed()?;
        Ok(())
    }
}

impl Encode for Option<SharedObject> {
    fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.encode_dyn_shared(self.as_ref())
    }
}

impl Decode for Option<SharedObject> {
    fn decode(&mut self, input: &mut Reader<'_>) -> ArchiveResult<()> {
        *self = input.decode_dyn_shared()?;
        Ok(())
    }
}

impl Encode for Option<Box<dyn Object>> {
    fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.encode_dyn_boxed(self.as_deref())
    }
}

impl Decode for Option<Box<dyn Object>> {
    fn decode(&mut self, input: &mut Reader<'_>) -> ArchiveResult<()> {
        *self = input.decode_dyn_boxed()?;
        Ok(())
    }
}

/// A value tagged with a field name.
///
/// The text codec uses the name as diagnostic context; the binary codec
/// ignores it. Decode the matching position with
/// [`Reader::field`](crate::Reader::field).
#[derive(Debug, Clone, Copy)]
pub struct NameValue<'a, T: ?Sized> {
    pub name: &'a str,
    pub value: &'a T,
}

/// Pair `value` with `name`.
pub fn nvp<'a, T: ?Sized>(name: &'a str, value: &'a T) -> NameValue<'a, T> {
    NameValue { name, value }
}

impl<T: Encode + ?Sized> Encode for NameValue<'_, T> {
    fn encode(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.field(self.name, self.value)
    }
}

/// Fixed-width element of a raw array, stored in native byte order.
pub trait RawElement: Copy + Default + 'static {
    /// Width of one element in bytes.
    const SIZE: usize;

    /// Append the native-endian bytes of `self`.
    fn write_ne(&self, out: &mut Vec<u8>);

    /// Rebuild an element from exactly [`Self::SIZE`] bytes.
    fn read_ne(bytes: &[u8]) -> Self;
}

macro_rules! raw_element {
    ($($ty:ty),*) => {
        $(
            impl RawElement for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn write_ne(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }

                fn read_ne(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_ne_bytes(buf)
                }
            }
        )*
    };
}

raw_element!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);
