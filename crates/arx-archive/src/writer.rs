//! The output engine.

use std::cell::{Ref, RefCell};

use arx_types::{
    ArchiveCore, ArchiveError, ArchiveKind, ArchiveResult, ClassMeta, NULL_CLASS_NAME, NULL_INDEX,
};
use tracing::{debug, trace};

use crate::codec::Encoder;
use crate::encode::{Encode, RawElement};
use crate::identity::{Handle, Location, OutputTable, Sighting};
use crate::persist::{Object, Persist, Shared, SharedObject};
use crate::registry::{Registry, Serializer};

/// Drives one encode session over a concrete [`Encoder`].
///
/// The writer resolves pointer versus value and tracked versus untracked for
/// every call, keeps the identity table, and dispatches polymorphic bodies
/// through the [`Registry`]. The encoder only sees primitives.
///
/// A tracked value first reached through a pointer and later encoded as a
/// value is written twice: once after the pointer, once at the value
/// position. Readers rely on this layout.
pub struct Writer<'a> {
    encoder: Box<dyn Encoder + 'a>,
    registry: &'a Registry,
    table: OutputTable,
}

impl<'a> Writer<'a> {
    /// Start a session. The encoder has already written its header.
    pub fn new(encoder: Box<dyn Encoder + 'a>, registry: &'a Registry) -> Self {
        Self {
            encoder,
            registry,
            table: OutputTable::default(),
        }
    }

    /// Encode any supported shape.
    pub fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> ArchiveResult<()> {
        value.encode(self)
    }

    /// Encode `value` as a name-value pair.
    pub fn field<T: Encode + ?Sized>(&mut self, name: &str, value: &T) -> ArchiveResult<()> {
        self.encoder.begin_field(name);
        let result = value.encode(self);
        self.encoder.end_field();
        result
    }

    /// Encode a value held in place.
    ///
    /// Tracked types write their identity index first; the body follows only
    /// the first time the value itself is encoded.
    pub fn encode_value<T: Persist>(&mut self, value: &T) -> ArchiveResult<()> {
        let meta = T::meta();
        if !meta.is_tracked() {
            return self.write_body(&meta, value);
        }
        match self.table.sight(Location::of(value), true) {
            Sighting::New(handle) => {
                self.write_index(handle)?;
                self.write_or_release(handle, |out| out.write_body(&meta, value))
            }
            Sighting::Pending(handle) => {
                debug!(%handle, class = %meta.name, "writing pointer-first value again");
                self.write_index(handle)?;
                self.write_body(&meta, value)
            }
            Sighting::Known(handle) => self.write_index(handle),
        }
    }

    /// Encode the contents of shared storage as a value.
    ///
    /// Decoded with [`Reader::decode_owned`](crate::Reader::decode_owned),
    /// which preserves the identity of the cell.
    pub fn encode_owned<T: Persist>(&mut self, cell: &Shared<T>) -> ArchiveResult<()> {
        let value = borrow(cell)?;
        self.encode_value(&*value)
    }

    /// Encode a statically typed pointer. `None` writes the null sentinel.
    pub fn encode_pointer<T: Persist>(&mut self, pointer: Option<&Shared<T>>) -> ArchiveResult<()> {
        let meta = T::meta();
        match pointer {
            None => self.write_null(&meta),
            Some(cell) => {
                let value = borrow(cell)?;
                self.write_pointee(&meta, &*value)
            }
        }
    }

    /// Encode a statically typed boxed pointer. `None` writes the null sentinel.
    pub fn encode_boxed<T: Persist>(&mut self, pointer: Option<&T>) -> ArchiveResult<()> {
        let meta = T::meta();
        match pointer {
            None => self.write_null(&meta),
            Some(value) => self.write_pointee(&meta, value),
        }
    }

    /// Encode a polymorphic pointer to shared storage.
    pub fn encode_dyn_shared(&mut self, pointer: Option<&SharedObject>) -> ArchiveResult<()> {
        match pointer {
            None => self.encoder.write_class_name(NULL_CLASS_NAME),
            Some(cell) => {
                let object = borrow(cell)?;
                self.write_object(&*object)
            }
        }
    }

    /// Encode a polymorphic boxed pointer.
    pub fn encode_dyn_boxed(&mut self, pointer: Option<&dyn Object>) -> ArchiveResult<()> {
        match pointer {
            None => self.encoder.write_class_name(NULL_CLASS_NAME),
            Some(object) => self.write_object(object),
        }
    }

    /// Encode a length followed by each element as a value.
    pub fn encode_values<T: Persist>(&mut self, values: &[T]) -> ArchiveResult<()> {
        self.encoder.write_len(values.len())?;
        values.iter().try_for_each(|value| self.encode_value(value))
    }

    /// Encode a length followed by each element in its own shape.
    pub fn encode_seq<T: Encode>(&mut self, values: &[T]) -> ArchiveResult<()> {
        self.encoder.write_len(values.len())?;
        values.iter().try_for_each(|value| value.encode(self))
    }

    /// Write a length followed by the native bytes of every element.
    pub fn write_array<E: RawElement>(&mut self, values: &[E]) -> ArchiveResult<()> {
        self.encoder.write_len(values.len())?;
        let mut bytes = Vec::with_capacity(values.len() * E::SIZE);
        for value in values {
            value.write_ne(&mut bytes);
        }
        self.encoder.write_raw_data(&bytes)
    }

    /// Write an opaque block. The reader must know its length.
    pub fn write_raw_data(&mut self, bytes: &[u8]) -> ArchiveResult<()> {
        self.encoder.write_raw_data(bytes)
    }

    /// Direct access to the codec's primitive hooks.
    pub fn encoder_mut(&mut self) -> &mut (dyn Encoder + 'a) {
        &mut *self.encoder
    }

    pub fn kind(&self) -> ArchiveKind {
        self.encoder.kind()
    }

    pub fn core(&self) -> ArchiveCore {
        self.encoder.core()
    }

    pub fn major_version(&self) -> u32 {
        self.core().major()
    }

    pub fn minor_version(&self) -> u32 {
        self.core().minor()
    }

    /// Number of identities assigned so far.
    pub fn tracked_count(&self) -> usize {
        self.table.len()
    }

    pub fn flush(&mut self) -> ArchiveResult<()> {
        self.encoder.flush()
    }

    /// Flush and end the session.
    pub fn finish(mut self) -> ArchiveResult<()> {
        debug!(kind = %self.kind(), identities = self.table.len(), "finished writing archive");
        self.encoder.flush()
    }

    fn write_index(&mut self, handle: Handle) -> ArchiveResult<()> {
        let index = handle.to_wire()?;
        self.encoder.write_index(index)
    }

    fn write_null(&mut self, meta: &ClassMeta) -> ArchiveResult<()> {
        if meta.is_tracked() {
            self.encoder.write_index(NULL_INDEX)
        } else {
            self.encoder.write_class_name(NULL_CLASS_NAME)
        }
    }

    fn write_version(&mut self, meta: &ClassMeta) -> ArchiveResult<()> {
        if meta.version_stored {
            self.encoder.write_version(meta.version)?;
        }
        Ok(())
    }

    fn write_body<T: Persist>(&mut self, meta: &ClassMeta, value: &T) -> ArchiveResult<()> {
        self.write_version(meta)?;
        value.save(self)
    }

    fn write_named_body<T: Persist>(&mut self, meta: &ClassMeta, value: &T) -> ArchiveResult<()> {
        self.encoder.write_class_name(&meta.name)?;
        self.write_body(meta, value)
    }

    fn write_pointee<T: Persist>(&mut self, meta: &ClassMeta, value: &T) -> ArchiveResult<()> {
        if !meta.is_tracked() {
            return self.write_named_body(meta, value);
        }
        match self.table.sight(Location::of(value), false) {
            Sighting::New(handle) => {
                self.write_index(handle)?;
                self.write_or_release(handle, |out| out.write_named_body(meta, value))
            }
            Sighting::Pending(handle) | Sighting::Known(handle) => self.write_index(handle),
        }
    }

    fn write_object(&mut self, object: &dyn Object) -> ArchiveResult<()> {
        let meta = object.class_meta();
        let kind = self.kind();
        let serializer = self.registry.serializer(kind, &meta.name).ok_or_else(|| {
            ArchiveError::SerializerNotFound {
                kind,
                class: meta.name.to_string(),
            }
        })?;
        self.encoder.write_class_name(&meta.name)?;
        if !meta.is_tracked() {
            return self.write_object_body(&meta, serializer.as_ref(), object);
        }
        match self.table.sight(Location::of_object(object), false) {
            Sighting::New(handle) => {
                self.write_index(handle)?;
                self.write_or_release(handle, |out| {
                    out.write_object_body(&meta, serializer.as_ref(), object)
                })
            }
            Sighting::Pending(handle) | Sighting::Known(handle) => self.write_index(handle),
        }
    }

    fn write_object_body(
        &mut self,
        meta: &ClassMeta,
        serializer: &dyn Serializer,
        object: &dyn Object,
    ) -> ArchiveResult<()> {
        trace!(class = %meta.name, "writing polymorphic body");
        self.write_version(meta)?;
        serializer.save(object, self)
    }

    /// Run `write` for the payload of a freshly assigned identity, releasing
    /// the identity again if it fails.
    fn write_or_release(
        &mut self,
        handle: Handle,
        write: impl FnOnce(&mut Self) -> ArchiveResult<()>,
    ) -> ArchiveResult<()> {
        let result = write(self);
        if result.is_err() {
            self.table.rollback(handle);
        }
        result
    }
}

fn borrow<T: ?Sized>(cell: &RefCell<T>) -> ArchiveResult<Ref<'_, T>> {
    cell.try_borrow()
        .map_err(|_| ArchiveError::invalid("object is mutably borrowed during encode"))
}
