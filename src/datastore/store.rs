/*!
 * Data Store
 * Named, typed objects grouped by durability
 *
 * Entries are registered once (normally during `initialize`) and keep their
 * registration for the whole job; `clear_maps` only drops the objects.
 */

use super::types::{Durability, StoreError, StoreResult};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use tracing::trace;

struct Entry {
    type_id: TypeId,
    object: Option<Box<dyn Any + Send>>,
}

/// Process-local object store shared by all modules of a path
#[derive(Default)]
pub struct DataStore {
    maps: [HashMap<String, Entry>; 3],
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry of type `T`
    ///
    /// Registering the same name and type again is allowed.
    pub fn register<T: Any + Send>(&mut self, name: &str, durability: Durability) -> StoreResult<()> {
        let map = &mut self.maps[durability.index()];
        match map.get(name) {
            Some(entry) if entry.type_id != TypeId::of::<T>() => Err(StoreError::TypeMismatch {
                name: name.to_string(),
                durability,
            }),
            Some(_) => Ok(()),
            None => {
                map.insert(
                    name.to_string(),
                    Entry {
                        type_id: TypeId::of::<T>(),
                        object: None,
                    },
                );
                trace!(name, %durability, "Registered store entry");
                Ok(())
            }
        }
    }

    pub fn is_registered(&self, name: &str, durability: Durability) -> bool {
        self.maps[durability.index()].contains_key(name)
    }

    /// Fail unless an entry was registered by some earlier module
    pub fn require(&self, name: &str, durability: Durability) -> StoreResult<()> {
        if self.is_registered(name, durability) {
            Ok(())
        } else {
            Err(StoreError::NotRegistered {
                name: name.to_string(),
                durability,
            })
        }
    }

    /// Store an object, replacing the previous one
    pub fn put<T: Any + Send>(&mut self, name: &str, durability: Durability, value: T) -> StoreResult<()> {
        let entry = self.entry_mut::<T>(name, durability)?;
        entry.object = Some(Box::new(value));
        Ok(())
    }

    pub fn get<T: Any + Send>(&self, name: &str, durability: Durability) -> Option<&T> {
        self.maps[durability.index()]
            .get(name)
            .and_then(|entry| entry.object.as_ref())
            .and_then(|object| object.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send>(&mut self, name: &str, durability: Durability) -> Option<&mut T> {
        self.maps[durability.index()]
            .get_mut(name)
            .and_then(|entry| entry.object.as_mut())
            .and_then(|object| object.downcast_mut::<T>())
    }

    /// Remove and return the object of an entry
    pub fn take<T: Any + Send>(&mut self, name: &str, durability: Durability) -> StoreResult<T> {
        let entry = self.entry_mut::<T>(name, durability)?;
        let object = entry.object.take().ok_or_else(|| StoreError::Empty {
            name: name.to_string(),
            durability,
        })?;
        // Type was checked by entry_mut
        object
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| StoreError::TypeMismatch {
                name: name.to_string(),
                durability,
            })
    }

    /// Whether the entry currently holds an object
    pub fn contains(&self, name: &str, durability: Durability) -> bool {
        self.maps[durability.index()]
            .get(name)
            .map_or(false, |entry| entry.object.is_some())
    }

    /// Drop all objects of one durability, keeping registrations
    pub fn clear_maps(&mut self, durability: Durability) {
        let mut cleared = 0usize;
        for entry in self.maps[durability.index()].values_mut() {
            if entry.object.take().is_some() {
                cleared += 1;
            }
        }
        trace!(%durability, cleared, "Cleared store maps");
    }

    /// Number of entries holding an object
    pub fn object_count(&self, durability: Durability) -> usize {
        self.maps[durability.index()]
            .values()
            .filter(|entry| entry.object.is_some())
            .count()
    }

    fn entry_mut<T: Any + Send>(&mut self, name: &str, durability: Durability) -> StoreResult<&mut Entry> {
        let entry = self.maps[durability.index()]
            .get_mut(name)
            .ok_or_else(|| StoreError::NotRegistered {
                name: name.to_string(),
                durability,
            })?;
        if entry.type_id != TypeId::of::<T>() {
            return Err(StoreError::TypeMismatch {
                name: name.to_string(),
                durability,
            });
        }
        Ok(entry)
    }
}
