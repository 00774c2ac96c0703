//! Memoized construction of named instances, scoped per type.
//!
//! One registry is created per page/process and passed by reference to every
//! factory that needs singleton-by-name construction. Slots are never
//! overwritten and live as long as the registry.

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::debug;

/// Default slot name used by [`InstanceRegistry::singleton`].
pub const SINGLETON_NAME: &str = "singleton";

type Slot = Arc<dyn Any + Send + Sync>;

#[derive(Debug)]
pub enum StoreOutcome<T> {
    Stored,
    /// The slot was already taken; the caller should discard its own instance
    /// and use this one.
    Existing(Arc<T>),
}

impl<T> StoreOutcome<T> {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored)
    }
}

#[derive(Default)]
pub struct InstanceRegistry {
    slots: Mutex<HashMap<(TypeId, String), Slot>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retrieve<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let slots = self.slots();
        slots
            .get(&(TypeId::of::<T>(), name.to_string()))
            .cloned()
            .and_then(|slot| slot.downcast::<T>().ok())
    }

    /// Stores `instance` under `name` unless the slot is taken, in which case
    /// the existing instance is handed back and nothing changes.
    pub fn store<T>(&self, name: &str, instance: Arc<T>) -> StoreOutcome<T>
    where
        T: Any + Send + Sync,
    {
        let mut slots = self.slots();
        let key = (TypeId::of::<T>(), name.to_string());
        if let Some(existing) = slots.get(&key).cloned() {
            if let Ok(existing) = existing.downcast::<T>() {
                return StoreOutcome::Existing(existing);
            }
        }
        debug!(kind = type_name::<T>(), name, "registry: stored instance");
        slots.insert(key, instance);
        StoreOutcome::Stored
    }

    /// Returns the instance stored under `name`, constructing and storing one
    /// with `factory` on first use.
    pub fn get_or_create<T, F>(&self, name: &str, factory: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.retrieve::<T>(name) {
            return existing;
        }

        // The factory runs unlocked so it may use the registry itself; a
        // concurrent construction under the same name loses to the first
        // store.
        let created = Arc::new(factory());
        match self.store(name, Arc::clone(&created)) {
            StoreOutcome::Stored => created,
            StoreOutcome::Existing(existing) => existing,
        }
    }

    /// [`InstanceRegistry::get_or_create`] with `name` defaulting to
    /// [`SINGLETON_NAME`].
    pub fn singleton<T, F>(&self, name: Option<&str>, factory: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        self.get_or_create(name.unwrap_or(SINGLETON_NAME), factory)
    }

    pub fn names_for<T>(&self) -> Vec<String>
    where
        T: Any + Send + Sync,
    {
        let mut names: Vec<String> = self
            .slots()
            .keys()
            .filter(|(type_id, _)| *type_id == TypeId::of::<T>())
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<(TypeId, String), Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
