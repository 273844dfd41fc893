//! The input engine.

use std::cell::{RefCell, RefMut};
use std::sync::Arc;

use arx_types::{
    ArchiveCore, ArchiveError, ArchiveKind, ArchiveResult, ClassMeta, DecodeLimits,
    NULL_CLASS_NAME,
};
use tracing::{debug, trace, warn};

use crate::codec::Decoder;
use crate::encode::{Decode, RawElement};
use crate::identity::{Handle, InputTable, Location, Lookup};
use crate::persist::{shared, Instance, Object, Persist, Shared, SharedObject};
use crate::registry::{Factory, Registry};

/// Upper bound on elements reserved from a wire length before any decode.
const PREALLOCATE_MAX: usize = 1024;

/// How a tracked value position was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// Untracked; the body was decoded in place.
    Inline,
    /// A new identity; the body was decoded in place.
    Created(Handle),
    /// A back-reference to an identity already decoded as a value; the
    /// destination was left untouched.
    Reused(Handle),
    /// The identity was first decoded through a pointer and its body has now
    /// been decoded again in place. The slot tracks the destination; call
    /// [`Reader::relocate`] if the value moves.
    RelocationPending(Handle),
    /// The destination now shares the cell first decoded through a pointer.
    Adopted(Handle),
}

impl Decoded {
    /// The identity this position resolved to, if tracked.
    pub fn handle(&self) -> Option<Handle> {
        match *self {
            Self::Inline => None,
            Self::Created(h) | Self::Reused(h) | Self::RelocationPending(h) | Self::Adopted(h) => {
                Some(h)
            }
        }
    }

    /// Whether the identity table now points at the destination's address.
    pub fn tracks_destination(&self) -> bool {
        matches!(self, Self::Created(_) | Self::RelocationPending(_))
    }
}

/// Drives one decode session over a concrete [`Decoder`].
///
/// Mirror of [`Writer`](crate::Writer). Identities are registered before
/// their bodies are decoded so cycles resolve to the same cell; if a body
/// fails, its slot and everything registered after it are discarded before
/// the error propagates.
pub struct Reader<'a> {
    decoder: Box<dyn Decoder + 'a>,
    registry: &'a Registry,
    table: InputTable,
}

impl<'a> Reader<'a> {
    /// Start a session. The decoder has already validated its header.
    pub fn new(decoder: Box<dyn Decoder + 'a>, registry: &'a Registry) -> Self {
        Self {
            decoder,
            registry,
            table: InputTable::default(),
        }
    }

    /// Decode any supported shape in place.
    pub fn decode<T: Decode + ?Sized>(&mut self, value: &mut T) -> ArchiveResult<()> {
        value.decode(self)
    }

    /// Decode a name-value pair written with [`Writer::field`](crate::Writer::field).
    pub fn field<T: Decode + ?Sized>(&mut self, name: &str, value: &mut T) -> ArchiveResult<()> {
        self.decoder.begin_field(name);
        let result = value.decode(self);
        self.decoder.end_field();
        result
    }

    /// Decode a value in place.
    pub fn decode_value<T: Persist>(&mut self, value: &mut T) -> ArchiveResult<Decoded> {
        let meta = T::meta();
        if !meta.is_tracked() {
            self.read_body(&meta, value)?;
            return Ok(Decoded::Inline);
        }
        let location = Location::of(value);
        match self.read_identity()? {
            Lookup::Null => Err(null_value(&meta)),
            Lookup::New(_) => {
                let handle = self.table.insert(None, Some(location), true);
                self.read_or_release(handle, |input| input.read_body(&meta, value))?;
                Ok(Decoded::Created(handle))
            }
            Lookup::Existing(handle) if self.table.is_materialized(handle) => {
                Ok(Decoded::Reused(handle))
            }
            Lookup::Existing(handle) => {
                self.read_body(&meta, value)?;
                self.table.materialize(handle, location);
                debug!(%handle, class = %meta.name, "decoded pointer-first value in place");
                Ok(Decoded::RelocationPending(handle))
            }
        }
    }

    /// Decode a value into shared storage.
    ///
    /// A new identity registers `cell` itself, so later back-references
    /// resolve to it. An identity first decoded through a pointer replaces
    /// `cell` with that pointer's cell, so both positions share one object.
    pub fn decode_owned<T: Persist>(&mut self, cell: &mut Shared<T>) -> ArchiveResult<Decoded> {
        let meta = T::meta();
        if !meta.is_tracked() {
            let mut value = borrow_mut(cell)?;
            self.read_body(&meta, &mut *value)?;
            return Ok(Decoded::Inline);
        }
        match self.read_identity()? {
            Lookup::Null => Err(null_value(&meta)),
            Lookup::New(_) => {
                let handle = self.table.insert(
                    Some(Instance::from_shared(cell)),
                    Some(Location::of_shared(cell)),
                    true,
                );
                self.read_or_release(handle, |input| {
                    let mut value = borrow_mut(cell)?;
                    input.read_body(&meta, &mut *value)
                })?;
                Ok(Decoded::Created(handle))
            }
            Lookup::Existing(handle) => {
                let canonical = match self.table.cell(handle) {
                    Some(instance) => Some(typed::<T>(instance, handle, &meta)?),
                    None => None,
                };
                let materialized = self.table.is_materialized(handle);
                match (canonical, materialized) {
                    (Some(canonical), true) => {
                        *cell = canonical;
                        Ok(Decoded::Reused(handle))
                    }
                    (None, true) => Ok(Decoded::Reused(handle)),
                    (Some(canonical), false) => {
                        *cell = canonical;
                        {
                            let mut value = borrow_mut(cell)?;
                            self.read_body(&meta, &mut *value)?;
                        }
                        self.table.materialize(handle, Location::of_shared(cell));
                        Ok(Decoded::Adopted(handle))
                    }
                    (None, false) => {
                        {
                            let mut value = borrow_mut(cell)?;
                            self.read_body(&meta, &mut *value)?;
                        }
                        self.table.materialize(handle, Location::of_shared(cell));
                        Ok(Decoded::RelocationPending(handle))
                    }
                }
            }
        }
    }

    /// Decode a statically typed pointer.
    pub fn decode_pointer<T: Persist>(&mut self) -> ArchiveResult<Option<Shared<T>>> {
        let meta = T::meta();
        if !meta.is_tracked() {
            if !self.read_class(&meta)? {
                return Ok(None);
            }
            let cell = shared(T::default());
            {
                let mut value = borrow_mut(&cell)?;
                self.read_body(&meta, &mut *value)?;
            }
            return Ok(Some(cell));
        }
        match self.read_identity()? {
            Lookup::Null => Ok(None),
            Lookup::Existing(handle) => {
                let instance = self.table.cell(handle).ok_or_else(|| no_shared_storage(handle))?;
                typed::<T>(instance, handle, &meta).map(Some)
            }
            Lookup::New(_) => {
                self.expect_class(&meta)?;
                let cell = shared(T::default());
                let handle = self.table.insert(
                    Some(Instance::from_shared(&cell)),
                    Some(Location::of_shared(&cell)),
                    false,
                );
                self.read_or_release(handle, |input| {
                    let mut value = borrow_mut(&cell)?;
                    input.read_body(&meta, &mut *value)
                })?;
                Ok(Some(cell))
            }
        }
    }

    /// Decode a statically typed boxed pointer.
    ///
    /// A box cannot alias, so a back-reference here is rejected.
    pub fn decode_boxed<T: Persist>(&mut self) -> ArchiveResult<Option<Box<T>>> {
        let meta = T::meta();
        if !meta.is_tracked() {
            if !self.read_class(&meta)? {
                return Ok(None);
            }
            let mut value = Box::<T>::default();
            self.read_body(&meta, &mut *value)?;
            return Ok(Some(value));
        }
        match self.read_identity()? {
            Lookup::Null => Ok(None),
            Lookup::Existing(handle) => Err(boxed_alias(handle)),
            Lookup::New(_) => {
                self.expect_class(&meta)?;
                let mut value = Box::<T>::default();
                let handle = self.table.insert(None, Some(Location::of(&*value)), false);
                self.read_or_release(handle, |input| input.read_body(&meta, &mut *value))?;
                Ok(Some(value))
            }
        }
    }

    /// Decode a polymorphic pointer into shared storage.
    pub fn decode_dyn_shared(&mut self) -> ArchiveResult<Option<SharedObject>> {
        let Some((name, factory)) = self.read_factory()? else {
            return Ok(None);
        };
        let meta = factory.meta();
        if !meta.is_tracked() {
            let instance = factory.create_shared();
            self.load_shared(&name, &meta, instance.object())?;
            return Ok(Some(instance.object().clone()));
        }
        match self.read_identity()? {
            Lookup::Null => Err(ArchiveError::invalid(format!(
                "null identity after class name {name}"
            ))),
            Lookup::Existing(handle) => self
                .table
                .cell(handle)
                .map(|instance| Some(instance.object().clone()))
                .ok_or_else(|| no_shared_storage(handle)),
            Lookup::New(_) => {
                let instance = factory.create_shared();
                let location = Location::of_object(&*borrow_mut(instance.object())?);
                let handle = self
                    .table
                    .insert(Some(instance.clone()), Some(location), false);
                self.read_or_release(handle, |input| {
                    input.load_shared(&name, &meta, instance.object())
                })?;
                Ok(Some(instance.object().clone()))
            }
        }
    }

    /// Decode a polymorphic boxed pointer.
    pub fn decode_dyn_boxed(&mut self) -> ArchiveResult<Option<Box<dyn Object>>> {
        let Some((name, factory)) = self.read_factory()? else {
            return Ok(None);
        };
        let meta = factory.meta();
        let mut object = factory.create_boxed();
        if !meta.is_tracked() {
            self.load_object(&name, &meta, &mut *object)?;
            return Ok(Some(object));
        }
        match self.read_identity()? {
            Lookup::Null => Err(ArchiveError::invalid(format!(
                "null identity after class name {name}"
            ))),
            Lookup::Existing(handle) => Err(boxed_alias(handle)),
            Lookup::New(_) => {
                let handle = self
                    .table
                    .insert(None, Some(Location::of_object(&*object)), false);
                self.read_or_release(handle, |input| {
                    input.load_object(&name, &meta, &mut *object)
                })?;
                Ok(Some(object))
            }
        }
    }

    /// Decode a sequence written by [`Writer::encode_values`](crate::Writer::encode_values).
    ///
    /// Replaces the contents of `values`. Every element is decoded at a
    /// temporary location and relocated once it has been moved into place,
    /// and again whenever the vector grows into a new buffer.
    pub fn decode_values<T: Persist>(&mut self, values: &mut Vec<T>) -> ArchiveResult<()> {
        let len = self.decoder.read_len()?;
        values.clear();
        values.reserve(len.min(PREALLOCATE_MAX));
        let mut placed: Vec<(usize, Handle)> = Vec::new();
        for _ in 0..len {
            let mut item = T::default();
            // `item` may reuse one stack slot every iteration; the slot is
            // moved off `from` before the next element is decoded there.
            let from = Location::of(&item);
            let outcome = self.decode_value(&mut item)?;
            let capacity = values.capacity();
            values.push(item);
            if let (true, Some(handle), Some(last)) =
                (outcome.tracks_destination(), outcome.handle(), values.last())
            {
                self.table.relocate(from, Location::of(last));
                placed.push((values.len() - 1, handle));
            }
            if values.capacity() != capacity {
                for &(i, handle) in &placed {
                    if let Some(value) = values.get(i) {
                        self.table.place(handle, Location::of(value));
                    }
                }
            }
        }
        Ok(())
    }

    /// Decode a sequence written by [`Writer::encode_seq`](crate::Writer::encode_seq).
    pub fn decode_seq<T: Decode + Default>(&mut self, values: &mut Vec<T>) -> ArchiveResult<()> {
        let len = self.decoder.read_len()?;
        values.clear();
        values.reserve(len.min(PREALLOCATE_MAX));
        for _ in 0..len {
            let mut item = T::default();
            item.decode(self)?;
            values.push(item);
        }
        Ok(())
    }

    /// Read an array written by [`Writer::write_array`](crate::Writer::write_array).
    pub fn read_array<E: RawElement>(&mut self, values: &mut Vec<E>) -> ArchiveResult<()> {
        let len = self.decoder.read_len()?;
        let byte_len = len
            .checked_mul(E::SIZE)
            .ok_or_else(|| ArchiveError::invalid(format!("array of {len} elements overflows")))?;
        let bytes = self.read_raw_data(byte_len)?;
        values.clear();
        values.extend(bytes.chunks_exact(E::SIZE).map(E::read_ne));
        Ok(())
    }

    /// Read an opaque block of exactly `len` bytes.
    pub fn read_raw_data(&mut self, len: usize) -> ArchiveResult<Vec<u8>> {
        if let Err(e) = self.decoder.limits().check_raw(len as u64) {
            warn!(len, "raw block exceeds decode limit");
            return Err(e);
        }
        self.decoder.read_raw_data(len)
    }

    /// Tell the engine that the value registered at `from` now lives at `to`.
    ///
    /// Only the identity's slot is updated; back-references hold handles.
    /// Returns `false` if no identity was registered at `from`.
    pub fn relocate(&mut self, from: Location, to: Location) -> bool {
        self.table.relocate(from, to)
    }

    /// Current location of the value registered for `handle`.
    pub fn location(&self, handle: Handle) -> Option<Location> {
        self.table.location(handle)
    }

    /// Shared cell registered for `handle`, if it lives in shared storage.
    pub fn instance(&self, handle: Handle) -> Option<&Instance> {
        self.table.cell(handle)
    }

    /// Direct access to the codec's primitive hooks.
    pub fn decoder_mut(&mut self) -> &mut (dyn Decoder + 'a) {
        &mut *self.decoder
    }

    pub fn kind(&self) -> ArchiveKind {
        self.decoder.kind()
    }

    pub fn core(&self) -> ArchiveCore {
        self.decoder.core()
    }

    pub fn major_version(&self) -> u32 {
        self.core().major()
    }

    pub fn minor_version(&self) -> u32 {
        self.core().minor()
    }

    pub fn limits(&self) -> &DecodeLimits {
        self.decoder.limits()
    }

    /// Number of identities registered so far.
    pub fn tracked_count(&self) -> usize {
        self.table.len()
    }

    fn read_identity(&mut self) -> ArchiveResult<Lookup> {
        let index = self.decoder.read_index()?;
        self.table.classify(index)
    }

    fn read_version(&mut self, meta: &ClassMeta) -> ArchiveResult<u8> {
        if !meta.version_stored {
            return Ok(meta.version);
        }
        let stored = self.decoder.read_version()?;
        if !meta.accepts(stored) {
            warn!(class = %meta.name, stored, current = meta.version, "class version too new");
            return Err(ArchiveError::ClassVersionMismatch {
                class: meta.name.to_string(),
                stored,
                current: meta.version,
            });
        }
        Ok(stored)
    }

    fn read_body<T: Persist>(&mut self, meta: &ClassMeta, value: &mut T) -> ArchiveResult<()> {
        let version = self.read_version(meta)?;
        value.load(self, version)
    }

    /// Read a static pointer's class name. Returns `false` for null.
    fn read_class(&mut self, meta: &ClassMeta) -> ArchiveResult<bool> {
        let name = self.decoder.read_class_name()?;
        if name == NULL_CLASS_NAME {
            return Ok(false);
        }
        check_class(meta, &name)?;
        Ok(true)
    }

    fn expect_class(&mut self, meta: &ClassMeta) -> ArchiveResult<()> {
        let name = self.decoder.read_class_name()?;
        check_class(meta, &name)
    }

    /// Read a polymorphic class name and resolve its factory.
    fn read_factory(&mut self) -> ArchiveResult<Option<(String, Arc<dyn Factory>)>> {
        let name = self.decoder.read_class_name()?;
        if name == NULL_CLASS_NAME {
            return Ok(None);
        }
        let factory = self
            .registry
            .factory(self.kind(), &name)
            .ok_or_else(|| ArchiveError::UnregisteredClass(name.clone()))?;
        Ok(Some((name, factory)))
    }

    fn load_shared(
        &mut self,
        name: &str,
        meta: &ClassMeta,
        cell: &RefCell<dyn Object>,
    ) -> ArchiveResult<()> {
        let mut object = borrow_mut(cell)?;
        self.load_object(name, meta, &mut *object)
    }

    fn load_object(
        &mut self,
        name: &str,
        meta: &ClassMeta,
        object: &mut dyn Object,
    ) -> ArchiveResult<()> {
        let version = self.read_version(meta)?;
        let kind = self.kind();
        let serializer =
            self.registry
                .serializer(kind, name)
                .ok_or_else(|| ArchiveError::SerializerNotFound {
                    kind,
                    class: name.to_string(),
                })?;
        trace!(class = name, version, "reading polymorphic body");
        serializer.load(object, self, version)
    }

    /// Run `read` for the payload of a freshly registered identity,
    /// discarding the identity and its dependents if it fails.
    fn read_or_release(
        &mut self,
        handle: Handle,
        read: impl FnOnce(&mut Self) -> ArchiveResult<()>,
    ) -> ArchiveResult<()> {
        let result = read(self);
        if result.is_err() {
            self.table.truncate(handle);
        }
        result
    }
}

fn borrow_mut<T: ?Sized>(cell: &RefCell<T>) -> ArchiveResult<RefMut<'_, T>> {
    cell.try_borrow_mut()
        .map_err(|_| ArchiveError::invalid("object is already borrowed during decode"))
}

fn typed<T: Persist>(instance: &Instance, handle: Handle, meta: &ClassMeta) -> ArchiveResult<Shared<T>> {
    instance.typed::<T>().ok_or_else(|| {
        ArchiveError::invalid(format!("identity {handle} is not a {}", meta.name))
    })
}

fn check_class(meta: &ClassMeta, name: &str) -> ArchiveResult<()> {
    if name == meta.name {
        Ok(())
    } else {
        Err(ArchiveError::invalid(format!(
            "expected class {:?}, found {name:?}",
            meta.name
        )))
    }
}

fn null_value(meta: &ClassMeta) -> ArchiveError {
    ArchiveError::invalid(format!("null identity in place of a {} value", meta.name))
}

fn no_shared_storage(handle: Handle) -> ArchiveError {
    ArchiveError::invalid(format!(
        "identity {handle} was decoded in place and cannot be shared"
    ))
}

fn boxed_alias(handle: Handle) -> ArchiveError {
    ArchiveError::invalid(format!("back-reference to identity {handle} in a boxed pointer"))
}
