//! Headless widgets built on [`NamedChain`] operations.
//!
//! Each public widget operation assembles a fresh chain of named steps and
//! runs it. Before running, the operation fires its event: every hook
//! registered for the event receives the widget and the chain, and may
//! insert, remove or replace steps. Widgets never hold a lock while a hook or
//! a step runs.

pub mod autocomplete;
pub mod layer;
pub mod tabs;

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::chain::NamedChain;

pub use autocomplete::{AutoComplete, AutoCompleteEvent, InputField, Key, SuggestionSource};
pub use layer::{FormSubmission, Layer, LayerEvent};
pub use tabs::{TabEvent, Tabs};

/// Chain hook: may edit the chain before it runs.
pub type Hook<W> = Arc<dyn Fn(&W, &mut NamedChain) + Send + Sync>;

pub struct Hooks<E, W> {
    hooks: HashMap<E, Vec<Hook<W>>>,
}

impl<E, W> Default for Hooks<E, W> {
    fn default() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }
}

impl<E, W> Hooks<E, W>
where
    E: Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, event: E, hook: F) -> &mut Self
    where
        F: Fn(&W, &mut NamedChain) + Send + Sync + 'static,
    {
        self.hooks.entry(event).or_default().push(Arc::new(hook));
        self
    }

    pub fn count(&self, event: &E) -> usize {
        self.hooks.get(event).map_or(0, Vec::len)
    }

    fn for_event(&self, event: &E) -> Vec<Hook<W>> {
        self.hooks.get(event).cloned().unwrap_or_default()
    }
}

/// Runs the hooks registered for `event` against `chain`, in registration
/// order. The hook list is copied out first so hooks may register more hooks.
pub(crate) fn fire<E, W>(hooks: &Mutex<Hooks<E, W>>, event: E, widget: &W, chain: &mut NamedChain)
where
    E: Eq + Hash,
{
    let registered = lock(hooks).for_event(&event);
    for hook in registered {
        hook(widget, chain);
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
