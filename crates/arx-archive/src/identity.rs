//! Per-session identity tables.
//!
//! Every tracked identity gets a dense [`Handle`] at first sight. The output
//! table maps source locations to handles; the input table is an arena
//! indexed by handle whose slots hold the shared cell of the decoded object
//! (when it lives in shared storage) and the current location of inline
//! values. Back-references resolve through the arena, so moving an inline
//! value only updates one slot.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use arx_types::{ArchiveError, ArchiveResult, NULL_INDEX};
use tracing::debug;

use crate::persist::{Instance, Object, Shared};

/// Dense identity handle, assigned from 0 in first-sighting order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    #[cfg(test)]
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Zero-based position in the identity table.
    pub fn index(self) -> u32 {
        self.0
    }

    /// Wire form of the handle.
    pub(crate) fn to_wire(self) -> ArchiveResult<i32> {
        i32::try_from(self.0)
            .map_err(|_| ArchiveError::invalid(format!("identity table overflow at {}", self.0)))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a value lives: its address plus its concrete type.
///
/// Pairing the address with the type keeps a struct and its first field,
/// which share an address, from being mistaken for one identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    addr: usize,
    ty: TypeId,
}

impl Location {
    /// Location of a value borrowed in place.
    pub fn of<T: Any>(value: &T) -> Self {
        Self {
            addr: value as *const T as usize,
            ty: TypeId::of::<T>(),
        }
    }

    /// Location of the value inside shared storage.
    ///
    /// Equal to [`Location::of`] applied to the borrowed contents.
    pub fn of_shared<T: Any>(cell: &Shared<T>) -> Self {
        Self {
            addr: cell.as_ptr() as usize,
            ty: TypeId::of::<T>(),
        }
    }

    /// Location of a polymorphic value.
    pub fn of_object(object: &dyn Object) -> Self {
        Self {
            addr: object as *const dyn Object as *const () as usize,
            ty: object.as_any().type_id(),
        }
    }

    pub fn addr(&self) -> usize {
        self.addr
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location({:#x})", self.addr)
    }
}

/// Result of looking up a source location while encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Sighting {
    /// First sight; the handle was just assigned.
    New(Handle),
    /// Seen before through a pointer only.
    Pending(Handle),
    /// Nothing beyond the index needs to be written.
    Known(Handle),
}

#[derive(Debug)]
struct OutSlot {
    handle: Handle,
    materialized: bool,
}

/// Source location to handle, for one encode session.
#[derive(Debug, Default)]
pub(crate) struct OutputTable {
    slots: HashMap<Location, OutSlot>,
    next: u32,
}

impl OutputTable {
    /// Look up `location`, assigning the next handle on first sight.
    ///
    /// `materialize` marks the slot as written by value; pointer sightings
    /// leave it pending.
    pub(crate) fn sight(&mut self, location: Location, materialize: bool) -> Sighting {
        if let Some(slot) = self.slots.get_mut(&location) {
            let handle = slot.handle;
            return match (slot.materialized, materialize) {
                (false, true) => {
                    slot.materialized = true;
                    Sighting::Pending(handle)
                }
                _ => Sighting::Known(handle),
            };
        }
        let handle = Handle(self.next);
        self.next += 1;
        self.slots.insert(
            location,
            OutSlot {
                handle,
                materialized: materialize,
            },
        );
        Sighting::New(handle)
    }

    /// Forget `handle` and every handle assigned after it.
    pub(crate) fn rollback(&mut self, handle: Handle) {
        self.slots.retain(|_, slot| slot.handle < handle);
        self.next = handle.0;
        debug!(handle = handle.0, "released output identity slots");
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Classification of an index read from the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lookup {
    Null,
    Existing(Handle),
    New(Handle),
}

#[derive(Debug)]
struct InSlot {
    cell: Option<Instance>,
    location: Option<Location>,
    materialized: bool,
}

/// Handle-indexed arena of decoded identities, for one decode session.
#[derive(Debug, Default)]
pub(crate) struct InputTable {
    slots: Vec<InSlot>,
    by_location: HashMap<Location, Handle>,
}

impl InputTable {
    /// Classify a wire index. A new index must be exactly the next handle.
    pub(crate) fn classify(&self, index: i32) -> ArchiveResult<Lookup> {
        if index == NULL_INDEX {
            return Ok(Lookup::Null);
        }
        let len = self.slots.len();
        match usize::try_from(index) {
            Ok(i) if i < len => Ok(Lookup::Existing(Handle(i as u32))),
            Ok(i) if i == len => Ok(Lookup::New(Handle(i as u32))),
            _ => Err(ArchiveError::invalid(format!(
                "identity index {index} out of sequence, next is {len}"
            ))),
        }
    }

    /// Register a slot for the next handle.
    pub(crate) fn insert(
        &mut self,
        cell: Option<Instance>,
        location: Option<Location>,
        materialized: bool,
    ) -> Handle {
        let handle = Handle(self.slots.len() as u32);
        if let Some(location) = location {
            self.by_location.insert(location, handle);
        }
        self.slots.push(InSlot {
            cell,
            location,
            materialized,
        });
        debug!(handle = handle.0, "registered input identity");
        handle
    }

    /// Remove `handle` and every slot registered after it.
    ///
    /// Discarded shared objects are reset, so a partially decoded cycle
    /// among them is freed once the caller drops its handles.
    pub(crate) fn truncate(&mut self, handle: Handle) {
        let at = (handle.0 as usize).min(self.slots.len());
        let discarded = self.slots.split_off(at);
        self.by_location.retain(|_, h| *h < handle);
        for cell in discarded.iter().filter_map(|slot| slot.cell.as_ref()) {
            cell.reset();
        }
        debug!(handle = handle.0, released = discarded.len(), "released input identity slots");
    }

    /// Record that the value for `handle` moved to `location`.
    pub(crate) fn place(&mut self, handle: Handle, location: Location) {
        let Some(slot) = self.slots.get_mut(handle.0 as usize) else {
            return;
        };
        if let Some(old) = slot.location.replace(location) {
            if self.by_location.get(&old) == Some(&handle) {
                self.by_location.remove(&old);
            }
        }
        self.by_location.insert(location, handle);
    }

    pub(crate) fn cell(&self, handle: Handle) -> Option<&Instance> {
        self.slots.get(handle.0 as usize)?.cell.as_ref()
    }

    pub(crate) fn is_materialized(&self, handle: Handle) -> bool {
        self.slots
            .get(handle.0 as usize)
            .map(|slot| slot.materialized)
            .unwrap_or(false)
    }

    /// Record that `handle`'s payload has now been decoded at `location`.
    pub(crate) fn materialize(&mut self, handle: Handle, location: Location) {
        if let Some(slot) = self.slots.get_mut(handle.0 as usize) {
            slot.materialized = true;
            if let Some(old) = slot.location.replace(location) {
                self.by_location.remove(&old);
            }
            self.by_location.insert(location, handle);
        }
    }

    /// Location of the value currently registered for `handle`.
    pub(crate) fn location(&self, handle: Handle) -> Option<Location> {
        self.slots.get(handle.0 as usize)?.location
    }

    /// Retarget the slot registered at `from` to `to`.
    ///
    /// Returns `false` if no slot lives at `from`.
    pub(crate) fn relocate(&mut self, from: Location, to: Location) -> bool {
        let Some(handle) = self.by_location.remove(&from) else {
            return false;
        };
        if let Some(slot) = self.slots.get_mut(handle.0 as usize) {
            slot.location = Some(to);
        }
        self.by_location.insert(to, handle);
        debug!(handle = handle.0, from = from.addr, to = to.addr, "relocated input identity");
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
