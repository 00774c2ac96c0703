//! Named, manually continued step sequences.
//!
//! A [`NamedChain`] is the scheduling primitive every widget operation is
//! built from. Running the chain pops the head step and hands the chain itself
//! to that step; the step decides when, and whether, to call [`NamedChain::run`]
//! again. A step may move the chain into asynchronous work (for example as a
//! [`ResponseRequest`](crate::responses::ResponseRequest) continuation) and
//! resume it later. A step that drops the chain ends the operation: no other
//! handle exists, so nothing can resume it.

use std::{collections::VecDeque, fmt};

use tracing::trace;

/// A unit of work. Receives the remaining chain as its execution context.
pub type Step = Box<dyn FnOnce(NamedChain) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    Runnable,
}

#[derive(Default)]
pub struct NamedChain {
    steps: VecDeque<(String, Step)>,
}

impl NamedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append<F>(&mut self, name: impl Into<String>, step: F) -> &mut Self
    where
        F: FnOnce(NamedChain) + Send + 'static,
    {
        let index = self.steps.len();
        self.insert_at(index, name, step)
    }

    pub fn prepend<F>(&mut self, name: impl Into<String>, step: F) -> &mut Self
    where
        F: FnOnce(NamedChain) + Send + 'static,
    {
        self.insert_at(0, name, step)
    }

    /// Inserts right after the first step named `anchor`, or at the end when
    /// no step has that name.
    pub fn insert_after<F>(&mut self, anchor: &str, name: impl Into<String>, step: F) -> &mut Self
    where
        F: FnOnce(NamedChain) + Send + 'static,
    {
        let index = self
            .position(anchor)
            .map_or(self.steps.len(), |index| index + 1);
        self.insert_at(index, name, step)
    }

    /// Inserts right before the first step named `anchor`, or at the start when
    /// no step has that name.
    pub fn insert_before<F>(&mut self, anchor: &str, name: impl Into<String>, step: F) -> &mut Self
    where
        F: FnOnce(NamedChain) + Send + 'static,
    {
        let index = self.position(anchor).unwrap_or(0);
        self.insert_at(index, name, step)
    }

    /// Inserts at `index`; an index past the end appends.
    pub fn insert_at<F>(&mut self, index: usize, name: impl Into<String>, step: F) -> &mut Self
    where
        F: FnOnce(NamedChain) + Send + 'static,
    {
        let index = index.min(self.steps.len());
        self.steps.insert(index, (name.into(), Box::new(step)));
        self
    }

    /// Removes the first step named `name`, if any.
    pub fn remove(&mut self, name: &str) -> &mut Self {
        if let Some(index) = self.position(name) {
            self.steps.remove(index);
        }
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.steps.clear();
        self
    }

    /// Pops the head step and invokes it with this chain. No-op when empty.
    ///
    /// A step calling `run` synchronously recurses, so the stack grows with
    /// the number of synchronous steps.
    pub fn run(mut self) {
        if let Some((name, step)) = self.steps.pop_front() {
            trace!(step = %name, remaining = self.steps.len(), "chain: running step");
            step(self);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn state(&self) -> ChainState {
        if self.steps.is_empty() {
            ChainState::Idle
        } else {
            ChainState::Runnable
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|(name, _)| name.as_str())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|(step_name, _)| step_name == name)
    }
}

impl fmt::Debug for NamedChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedChain")
            .field("steps", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/chain_tests.rs"]
mod tests;
