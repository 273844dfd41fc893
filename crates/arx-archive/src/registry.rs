//! Name-keyed serializer and factory tables for polymorphic values.
//!
//! A [`Registry`] is an explicit, process-scoped object: construct it once,
//! register every polymorphic class, and hand a reference to each archive.
//! Lookups are read-mostly and never fail loudly; absence is reported as
//! `None` and turned into [`ArchiveError::SerializerNotFound`] or
//! [`ArchiveError::UnregisteredClass`] by the engine.
//!
//! [`ArchiveError::SerializerNotFound`]: arx_types::ArchiveError::SerializerNotFound
//! [`ArchiveError::UnregisteredClass`]: arx_types::ArchiveError::UnregisteredClass

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use arx_types::{ArchiveError, ArchiveKind, ArchiveResult, ClassMeta};
use tracing::debug;

use crate::persist::{Instance, Object, Persist};
use crate::reader::Reader;
use crate::writer::Writer;

/// Writes and reads the body of one polymorphic class.
pub trait Serializer: Send + Sync {
    /// Write the body of `object`.
    fn save(&self, object: &dyn Object, out: &mut Writer<'_>) -> ArchiveResult<()>;

    /// Read a body written at `version` into `object`.
    fn load(&self, object: &mut dyn Object, input: &mut Reader<'_>, version: u8)
        -> ArchiveResult<()>;
}

/// Constructs default instances of one polymorphic class.
pub trait Factory: Send + Sync {
    /// Metadata of the class this factory builds.
    fn meta(&self) -> ClassMeta;

    /// A default instance in shared storage.
    fn create_shared(&self) -> Instance;

    /// A default instance in a box.
    fn create_boxed(&self) -> Box<dyn Object>;
}

/// [`Serializer`] that forwards to a type's [`Persist`] implementation.
pub struct TypeSerializer<T>(PhantomData<fn() -> T>);

impl<T> TypeSerializer<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TypeSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Persist> Serializer for TypeSerializer<T> {
    fn save(&self, object: &dyn Object, out: &mut Writer<'_>) -> ArchiveResult<()> {
        let value = object
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| mismatch::<T>(object.class_meta()))?;
        value.save(out)
    }

    fn load(
        &self,
        object: &mut dyn Object,
        input: &mut Reader<'_>,
        version: u8,
    ) -> ArchiveResult<()> {
        let meta = object.class_meta();
        let value = object
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| mismatch::<T>(meta))?;
        value.load(input, version)
    }
}

fn mismatch<T: Persist>(found: ClassMeta) -> ArchiveError {
    ArchiveError::invalid(format!(
        "serializer for {} applied to {}",
        T::meta().name,
        found.name
    ))
}

/// [`Factory`] that builds `T::default()`.
pub struct TypeFactory<T>(PhantomData<fn() -> T>);

impl<T> TypeFactory<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TypeFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Persist> Factory for TypeFactory<T> {
    fn meta(&self) -> ClassMeta {
        T::meta()
    }

    fn create_shared(&self) -> Instance {
        Instance::new(T::default())
    }

    fn create_boxed(&self) -> Box<dyn Object> {
        Box::new(T::default())
    }
}

/// Which table a factory lives in.
///
/// Lookups try the archive-specific table first, then the default table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FactoryScope {
    Archive(ArchiveKind),
    Default,
}

impl fmt::Display for FactoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive(kind) => write!(f, "{kind}"),
            Self::Default => f.write_str("default"),
        }
    }
}

/// Identifies one registration so it can be removed on its own.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RegistrationKey {
    Serializer { kind: ArchiveKind, class: String },
    Factory { scope: FactoryScope, class: String },
}

type SerializerTable = HashMap<ArchiveKind, HashMap<String, Arc<dyn Serializer>>>;
type FactoryTable = HashMap<FactoryScope, HashMap<String, Arc<dyn Factory>>>;

/// Serializer and factory tables keyed by archive kind and class name.
///
/// Thread-safe: one registry may back any number of concurrent sessions.
pub struct Registry {
    serializers: RwLock<SerializerTable>,
    factories: RwLock<FactoryTable>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            serializers: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Register the serializer for `class` under `kind`.
    ///
    /// Registering the same key again replaces the previous entry.
    pub fn register_serializer(
        &self,
        kind: ArchiveKind,
        class: impl Into<String>,
        serializer: Arc<dyn Serializer>,
    ) -> RegistrationKey {
        let class = class.into();
        let mut map = self.serializers.write().expect("lock poisoned");
        if map
            .entry(kind)
            .or_default()
            .insert(class.clone(), serializer)
            .is_some()
        {
            debug!(%kind, class = %class, "replaced serializer registration");
        }
        RegistrationKey::Serializer { kind, class }
    }

    /// Register the factory for `class` in `scope`.
    ///
    /// Registering the same key again replaces the previous entry.
    pub fn register_factory(
        &self,
        scope: FactoryScope,
        class: impl Into<String>,
        factory: Arc<dyn Factory>,
    ) -> RegistrationKey {
        let class = class.into();
        let mut map = self.factories.write().expect("lock poisoned");
        if map
            .entry(scope)
            .or_default()
            .insert(class.clone(), factory)
            .is_some()
        {
            debug!(%scope, class = %class, "replaced factory registration");
        }
        RegistrationKey::Factory { scope, class }
    }

    /// Register `T`'s serializer and archive-scoped factory under `kind`.
    pub fn register_type<T: Persist>(&self, kind: ArchiveKind) -> Vec<RegistrationKey> {
        let name = T::meta().name;
        vec![
            self.register_serializer(kind, name.clone(), Arc::new(TypeSerializer::<T>::new())),
            self.register_factory(
                FactoryScope::Archive(kind),
                name,
                Arc::new(TypeFactory::<T>::new()),
            ),
        ]
    }

    /// Register `T`'s factory in the default scope, shared by every kind.
    pub fn register_default_factory<T: Persist>(&self) -> RegistrationKey {
        self.register_factory(
            FactoryScope::Default,
            T::meta().name,
            Arc::new(TypeFactory::<T>::new()),
        )
    }

    /// Register `T` under every kind in `kinds` and remove it again when the
    /// returned guard drops.
    pub fn scoped_type<T: Persist>(
        self: &Arc<Self>,
        kinds: &[ArchiveKind],
    ) -> RegistrationGuard {
        let keys = kinds
            .iter()
            .flat_map(|kind| self.register_type::<T>(*kind))
            .collect();
        RegistrationGuard::new(Arc::clone(self), keys)
    }

    /// Remove one registration. Returns `false` if it was not present.
    pub fn unregister(&self, key: &RegistrationKey) -> bool {
        let removed = match key {
            RegistrationKey::Serializer { kind, class } => {
                let mut map = self.serializers.write().expect("lock poisoned");
                remove_entry(&mut map, kind, class)
            }
            RegistrationKey::Factory { scope, class } => {
                let mut map = self.factories.write().expect("lock poisoned");
                remove_entry(&mut map, scope, class)
            }
        };
        if removed {
            debug!(?key, "removed registration");
        }
        removed
    }

    /// Serializer for `class` under `kind`, if registered.
    pub fn serializer(&self, kind: ArchiveKind, class: &str) -> Option<Arc<dyn Serializer>> {
        let map = self.serializers.read().expect("lock poisoned");
        map.get(&kind)?.get(class).cloned()
    }

    /// Factory for `class`: archive scope first, then the default scope.
    pub fn factory(&self, kind: ArchiveKind, class: &str) -> Option<Arc<dyn Factory>> {
        let map = self.factories.read().expect("lock poisoned");
        map.get(&FactoryScope::Archive(kind))
            .and_then(|table| table.get(class))
            .or_else(|| map.get(&FactoryScope::Default)?.get(class))
            .cloned()
    }

    /// Remove every registration.
    pub fn clear(&self) {
        self.serializers.write().expect("lock poisoned").clear();
        self.factories.write().expect("lock poisoned").clear();
    }

    /// Total number of serializer and factory registrations.
    pub fn len(&self) -> usize {
        let serializers: usize = self
            .serializers
            .read()
            .expect("lock poisoned")
            .values()
            .map(HashMap::len)
            .sum();
        let factories: usize = self
            .factories
            .read()
            .expect("lock poisoned")
            .values()
            .map(HashMap::len)
            .sum();
        serializers + factories
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted class names with a serializer under `kind`.
    pub fn classes(&self, kind: ArchiveKind) -> Vec<String> {
        let map = self.serializers.read().expect("lock poisoned");
        let mut names: Vec<String> = map
            .get(&kind)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

fn remove_entry<K, V>(map: &mut HashMap<K, HashMap<String, V>>, key: &K, class: &str) -> bool
where
    K: std::hash::Hash + Eq,
{
    let Some(table) = map.get_mut(key) else {
        return false;
    };
    let removed = table.remove(class).is_some();
    if table.is_empty() {
        map.remove(key);
    }
    removed
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("registrations", &self.len())
            .finish()
    }
}

/// Removes a set of registrations when dropped.
#[must_use = "dropping the guard unregisters immediately"]
pub struct RegistrationGuard {
    registry: Arc<Registry>,
    keys: Vec<RegistrationKey>,
}

impl RegistrationGuard {
    pub fn new(registry: Arc<Registry>, keys: Vec<RegistrationKey>) -> Self {
        Self { registry, keys }
    }

    /// The registrations this guard owns.
    pub fn keys(&self) -> &[RegistrationKey] {
        &self.keys
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            self.registry.unregister(key);
        }
    }
}

impl fmt::Debug for RegistrationGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationGuard")
            .field("keys", &self.keys)
            .finish()
    }
}
