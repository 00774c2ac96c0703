//! A tab strip with exactly one active tab.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::{fire, lock, Hooks};
use crate::{chain::NamedChain, registry::InstanceRegistry, settings::TabOptions};

pub mod steps {
    pub mod show {
        pub const FIRE_EVENT: &str = "Tabs.show:fire_event";
        pub const CHANGE_ACTIVE: &str = "Tabs.show:change_active";
        pub const SHOW_TAB_CONTENT: &str = "Tabs.show:show_tab_content";
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabEvent {
    Show,
}

#[derive(Debug)]
struct TabsState {
    labels: Vec<String>,
    active: usize,
    shown_content: Option<usize>,
    clicks: usize,
}

struct TabsInner {
    state: Mutex<TabsState>,
    hooks: Mutex<Hooks<TabEvent, Tabs>>,
}

#[derive(Clone)]
pub struct Tabs {
    inner: Arc<TabsInner>,
}

impl Tabs {
    pub fn new(labels: Vec<String>, options: TabOptions) -> Self {
        Self::with_hooks(labels, options, Hooks::new())
    }

    /// Builds the tabs and shows the initially active one. `hooks` are in
    /// place before that first show runs.
    pub fn with_hooks(
        labels: Vec<String>,
        options: TabOptions,
        hooks: Hooks<TabEvent, Tabs>,
    ) -> Self {
        let active = options
            .active
            .filter(|index| *index < labels.len())
            .unwrap_or(0);
        let has_tabs = !labels.is_empty();
        let tabs = Self {
            inner: Arc::new(TabsInner {
                state: Mutex::new(TabsState {
                    labels,
                    active,
                    shown_content: None,
                    clicks: 0,
                }),
                hooks: Mutex::new(hooks),
            }),
        };

        if has_tabs {
            tabs.show(active);
        }
        tabs
    }

    /// Tabs keyed by the id of the element they belong to.
    pub fn singleton(
        registry: &InstanceRegistry,
        element_id: &str,
        labels: Vec<String>,
        options: TabOptions,
    ) -> Arc<Self> {
        registry.get_or_create(element_id, || Self::new(labels, options))
    }

    pub fn on<F>(&self, event: TabEvent, hook: F) -> &Self
    where
        F: Fn(&Tabs, &mut NamedChain) + Send + Sync + 'static,
    {
        lock(&self.inner.hooks).add(event, hook);
        self
    }

    pub fn active(&self) -> usize {
        lock(&self.inner.state).active
    }

    pub fn active_label(&self) -> Option<String> {
        let state = lock(&self.inner.state);
        state.labels.get(state.active).cloned()
    }

    /// Index of the tab whose content is currently displayed.
    pub fn shown_content(&self) -> Option<usize> {
        lock(&self.inner.state).shown_content
    }

    pub fn labels(&self) -> Vec<String> {
        lock(&self.inner.state).labels.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.state).labels.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner.state).labels.is_empty()
    }

    /// Activates tab `index`. Re-selecting the active tab does nothing once
    /// the initial show has happened.
    pub fn show(&self, index: usize) {
        {
            let mut state = lock(&self.inner.state);
            if index >= state.labels.len() {
                warn!(index, tabs = state.labels.len(), "tabs: no such tab");
                return;
            }
            let first = state.clicks == 0;
            state.clicks += 1;
            if !first && state.active == index {
                return;
            }
        }

        let mut chain = NamedChain::new();

        let tabs = self.clone();
        chain.append(steps::show::FIRE_EVENT, move |mut chain: NamedChain| {
            fire(&tabs.inner.hooks, TabEvent::Show, &tabs, &mut chain);
            chain.run();
        });

        let tabs = self.clone();
        chain.append(steps::show::CHANGE_ACTIVE, move |chain: NamedChain| {
            lock(&tabs.inner.state).active = index;
            debug!(index, "tabs: active tab changed");
            chain.run();
        });

        let tabs = self.clone();
        chain.append(steps::show::SHOW_TAB_CONTENT, move |chain: NamedChain| {
            {
                let mut state = lock(&tabs.inner.state);
                state.shown_content = Some(state.active);
            }
            chain.run();
        });

        chain.run();
    }
}

#[cfg(test)]
#[path = "../tests/tabs_tests.rs"]
mod tests;
