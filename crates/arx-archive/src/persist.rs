//! Capability traits implemented by persistable types.
//!
//! [`Persist`] is the static side: a per-type metadata table plus the body
//! encoding. [`Object`] is the dynamic side: a per-instance metadata lookup
//! used for polymorphic values, whose bodies are written through the
//! [`Registry`](crate::Registry). Every `Persist` type is automatically an
//! `Object`, so the engine sees the same [`ClassMeta`] either way.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use arx_types::{ArchiveResult, ClassMeta};

use crate::reader::Reader;
use crate::writer::Writer;

/// Shared, identity-bearing storage for a tracked object.
pub type Shared<T> = Rc<RefCell<T>>;

/// Shared storage for a polymorphic object.
pub type SharedObject = Rc<RefCell<dyn Object>>;

/// Move `value` into fresh shared storage.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// A type the engine can write and read.
///
/// `load` runs on a default-constructed instance and receives the version the
/// body was written at, which is never newer than `meta().version`.
pub trait Persist: Any + Default {
    /// Static capability descriptor of the type.
    fn meta() -> ClassMeta;

    /// Write the body.
    fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()>;

    /// Read the body written by `save` at `version`.
    fn load(&mut self, input: &mut Reader<'_>, version: u8) -> ArchiveResult<()>;
}

/// Dynamic view of a persistable value.
pub trait Object: Any {
    /// Capability descriptor of this instance's concrete class.
    fn class_meta(&self) -> ClassMeta;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Return to the default state, dropping every handle the value holds.
    fn reset(&mut self);
}

impl<T: Persist> Object for T {
    fn class_meta(&self) -> ClassMeta {
        T::meta()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn reset(&mut self) {
        *self = T::default();
    }
}

impl dyn Object {
    /// Concrete type of the value behind the trait object.
    pub fn concrete_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

impl fmt::Debug for dyn Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:?})", self.class_meta())
    }
}

/// One freshly constructed shared object, viewed both statically and dynamically.
///
/// Both handles point at the same allocation, so a back-reference can be
/// resolved to `Shared<T>` or to [`SharedObject`] regardless of which path
/// created the object.
#[derive(Clone)]
pub struct Instance {
    typed: Rc<dyn Any>,
    object: SharedObject,
}

impl Instance {
    /// Move `value` into fresh shared storage.
    pub fn new<T: Object>(value: T) -> Self {
        Self::from_shared(&shared(value))
    }

    /// View existing shared storage.
    pub fn from_shared<T: Object>(cell: &Shared<T>) -> Self {
        let typed: Rc<dyn Any> = cell.clone();
        let object: SharedObject = cell.clone();
        Self { typed, object }
    }

    /// The statically typed handle, if the object is a `T`.
    pub fn typed<T: Any>(&self) -> Option<Shared<T>> {
        self.typed.clone().downcast::<RefCell<T>>().ok()
    }

    /// The polymorphic handle.
    pub fn object(&self) -> &SharedObject {
        &self.object
    }

    /// Reset the object in place so cycles through it are broken.
    ///
    /// Skipped if the object is currently borrowed.
    pub fn reset(&self) {
        if let Ok(mut object) = self.object.try_borrow_mut() {
            object.reset();
        }
    }

    /// Returns `true` if both instances share one allocation.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.object.try_borrow() {
            Ok(object) => write!(f, "Instance({:?})", object.class_meta()),
            Err(_) => f.write_str("Instance(<borrowed>)"),
        }
    }
}

macro_rules! persist_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Persist for $ty {
                fn meta() -> ClassMeta {
                    ClassMeta::primitive()
                }

                fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
                    out.encode(self)
                }

                fn load(&mut self, input: &mut Reader<'_>, _version: u8) -> ArchiveResult<()> {
                    input.decode(self)
                }
            }
        )*
    };
}

persist_primitive!(bool, i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, String);
