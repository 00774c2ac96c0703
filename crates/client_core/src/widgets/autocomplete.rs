//! Input suggestions.
//!
//! Suggestions come either from a local function or from a server url. The
//! server answers with an item of type [`AutoComplete::UPDATE_SUGGESTIONS`]
//! whose `data` field holds `[{"value": .., "display": ..}, ..]`.

use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use shared::{domain::Suggestion, protocol::ResponseItem};
use tracing::{debug, warn};

use super::{fire, lock, Hooks};
use crate::{
    chain::NamedChain,
    registry::InstanceRegistry,
    responses::{DispatchContext, ResponseDispatcher, ResponseRequest},
    settings::AutoCompleteOptions,
};

/// Step names of every autocomplete operation.
pub mod steps {
    pub mod hide {
        pub const FIRE_EVENT: &str = "AutoComplete.hide:fire_event";
        pub const RENDER: &str = "AutoComplete.hide:render";
    }

    pub mod show {
        pub const FIRE_EVENT: &str = "AutoComplete.show:fire_event";
        pub const REQUEST: &str = "AutoComplete.show:request";
        pub const RENDER: &str = "AutoComplete.show:render";
    }

    pub mod use_selected {
        pub const FIRE_EVENT: &str = "AutoComplete.use_selected:fire_event";
        pub const RENDER: &str = "AutoComplete.use_selected:render";
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoCompleteEvent {
    PreShow,
    PostShow,
    Hide,
    Selection,
}

#[derive(Clone)]
pub enum SuggestionSource {
    /// Queried with the configured query parameter and extra data.
    Remote(String),
    /// Called with the current input value.
    Local(Arc<dyn Fn(&str) -> Vec<Suggestion> + Send + Sync>),
}

impl SuggestionSource {
    pub fn local<F>(f: F) -> Self
    where
        F: Fn(&str) -> Vec<Suggestion> + Send + Sync + 'static,
    {
        Self::Local(Arc::new(f))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Esc,
    Tab,
    Up,
    Down,
    Left,
    Right,
    Other,
}

/// The input field currently driving the autocomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputField {
    pub value: String,
    /// Value of the associated hidden field, when the input has one. A
    /// selection then stores the suggestion's value here and shows its
    /// display text in the input.
    pub hidden: Option<String>,
    previous: Option<String>,
}

impl InputField {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_hidden_field(mut self) -> Self {
        self.hidden = Some(String::new());
        self
    }

    /// The value the suggestions were last fetched for.
    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }
}

#[derive(Debug, Default)]
struct AutoCompleteState {
    input: InputField,
    suggestions: Vec<Suggestion>,
    selected: Option<usize>,
    visible: bool,
    loading: bool,
}

struct AutoCompleteInner {
    dispatcher: Arc<ResponseDispatcher>,
    source: SuggestionSource,
    options: AutoCompleteOptions,
    state: Mutex<AutoCompleteState>,
    hooks: Mutex<Hooks<AutoCompleteEvent, AutoComplete>>,
}

#[derive(Clone)]
pub struct AutoComplete {
    inner: Arc<AutoCompleteInner>,
}

impl AutoComplete {
    /// Wire tag of the item that replaces the suggestion list.
    pub const UPDATE_SUGGESTIONS: &'static str = "AutoCompleteJS:update_suggestions";

    pub fn new(
        dispatcher: ResponseDispatcher,
        source: SuggestionSource,
        options: AutoCompleteOptions,
    ) -> Self {
        let inner = Arc::new(AutoCompleteInner {
            dispatcher: Arc::new(dispatcher),
            source,
            options,
            state: Mutex::new(AutoCompleteState::default()),
            hooks: Mutex::new(Hooks::new()),
        });

        let weak: Weak<AutoCompleteInner> = Arc::downgrade(&inner);
        inner
            .dispatcher
            .on_item(move |_ctx: &DispatchContext<'_>, item: &ResponseItem| {
                if item.item_type() != Self::UPDATE_SUGGESTIONS {
                    return;
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let suggestions = parse_suggestions(item.field("data"));
                lock(&inner.state).suggestions = suggestions;
            });

        Self { inner }
    }

    /// Returns the instance stored under `name`, creating it on first use.
    /// Arguments are ignored when the instance already exists.
    pub fn singleton(
        registry: &InstanceRegistry,
        name: &str,
        dispatcher: ResponseDispatcher,
        source: SuggestionSource,
        options: AutoCompleteOptions,
    ) -> Arc<Self> {
        registry.get_or_create(name, || Self::new(dispatcher, source, options))
    }

    pub fn on<F>(&self, event: AutoCompleteEvent, hook: F) -> &Self
    where
        F: Fn(&AutoComplete, &mut NamedChain) + Send + Sync + 'static,
    {
        lock(&self.inner.hooks).add(event, hook);
        self
    }

    pub fn dispatcher(&self) -> &Arc<ResponseDispatcher> {
        &self.inner.dispatcher
    }

    /// Makes `input` the field the autocomplete works on.
    pub fn focus(&self, input: InputField) {
        lock(&self.inner.state).input = input;
    }

    pub fn input(&self) -> InputField {
        lock(&self.inner.state).input.clone()
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        lock(&self.inner.state).suggestions.clone()
    }

    pub fn selected(&self) -> Option<usize> {
        lock(&self.inner.state).selected
    }

    pub fn selected_suggestion(&self) -> Option<Suggestion> {
        let state = lock(&self.inner.state);
        state
            .selected
            .and_then(|index| state.suggestions.get(index).cloned())
    }

    pub fn is_visible(&self) -> bool {
        lock(&self.inner.state).visible
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.inner.state).loading
    }

    /// Key press on the input. Returns true when the key's default action
    /// should be suppressed.
    pub fn key_down(&self, key: Key) -> bool {
        match key {
            Key::Enter | Key::Esc => true,
            Key::Tab => {
                self.use_selected();
                false
            }
            _ => false,
        }
    }

    /// Key release on the input, with the input's value after the key.
    pub fn key_up(&self, key: Key, value: &str) {
        lock(&self.inner.state).input.value = value.to_string();

        match key {
            Key::Enter => self.use_selected(),
            Key::Esc => self.hide(),
            Key::Up | Key::Down => {
                let (index, count) = {
                    let state = lock(&self.inner.state);
                    (state.selected.unwrap_or(0), state.suggestions.len())
                };
                let index = match key {
                    Key::Up if index > 0 => index - 1,
                    Key::Down if index + 1 < count => index + 1,
                    _ => index,
                };
                self.set_selection(index);
            }
            Key::Left | Key::Right => {}
            Key::Tab | Key::Other => {
                if value.chars().count() >= self.inner.options.min_length {
                    self.show();
                } else {
                    self.hide();
                }
            }
        }
    }

    /// Selects `index`; an index outside the suggestions selects the first.
    pub fn set_selection(&self, index: usize) {
        let mut state = lock(&self.inner.state);
        state.selected = if index < state.suggestions.len() {
            Some(index)
        } else if state.suggestions.is_empty() {
            None
        } else {
            Some(0)
        };
    }

    /// Suggestions for the current input. Does nothing while visible for an
    /// unchanged input.
    pub fn show(&self) {
        {
            let state = lock(&self.inner.state);
            if state.visible && state.input.previous() == Some(state.input.value.as_str()) {
                return;
            }
        }

        let mut chain = NamedChain::new();

        let autocomplete = self.clone();
        chain.append(steps::show::FIRE_EVENT, move |mut chain: NamedChain| {
            autocomplete.fire(AutoCompleteEvent::PreShow, &mut chain);
            lock(&autocomplete.inner.state).loading = true;
            chain.run();
        });

        let autocomplete = self.clone();
        chain.append(steps::show::REQUEST, move |chain: NamedChain| {
            autocomplete.request_suggestions(chain);
        });

        let autocomplete = self.clone();
        chain.append(steps::show::RENDER, move |mut chain: NamedChain| {
            let has_suggestions = {
                let mut state = lock(&autocomplete.inner.state);
                state.input.previous = Some(state.input.value.clone());
                state.loading = false;
                state.selected = (!state.suggestions.is_empty()).then_some(0);
                state.selected.is_some()
            };

            if has_suggestions {
                lock(&autocomplete.inner.state).visible = true;
                autocomplete.fire(AutoCompleteEvent::PostShow, &mut chain);
            } else {
                debug!("autocomplete: no suggestions");
                autocomplete.hide();
            }
            chain.run();
        });

        chain.run();
    }

    pub fn hide(&self) {
        let mut chain = NamedChain::new();

        let autocomplete = self.clone();
        chain.append(steps::hide::FIRE_EVENT, move |mut chain: NamedChain| {
            autocomplete.fire(AutoCompleteEvent::Hide, &mut chain);
            chain.run();
        });

        let autocomplete = self.clone();
        chain.append(steps::hide::RENDER, move |chain: NamedChain| {
            lock(&autocomplete.inner.state).visible = false;
            chain.run();
        });

        chain.run();
    }

    /// Applies the selected suggestion to the input, then hides.
    pub fn use_selected(&self) {
        let Some(suggestion) = self.selected_suggestion() else {
            debug!("autocomplete: nothing selected");
            return;
        };

        let mut chain = NamedChain::new();

        let autocomplete = self.clone();
        chain.append(steps::use_selected::FIRE_EVENT, move |mut chain: NamedChain| {
            autocomplete.fire(AutoCompleteEvent::Selection, &mut chain);
            chain.run();
        });

        let autocomplete = self.clone();
        chain.append(steps::use_selected::RENDER, move |chain: NamedChain| {
            {
                let mut state = lock(&autocomplete.inner.state);
                let input = &mut state.input;
                match input.hidden.as_mut() {
                    Some(hidden) => {
                        *hidden = suggestion.value;
                        input.value = suggestion.display;
                    }
                    None => input.value = suggestion.value,
                }
            }
            autocomplete.hide();
            chain.run();
        });

        chain.run();
    }

    /// Wraps every case-insensitive occurrence of the current input in
    /// `display` with `<span class="provided">`.
    pub fn display_text(&self, display: &str) -> String {
        let needle = lock(&self.inner.state).input.value.clone();
        highlight(display, &needle)
    }

    /// Display texts of all suggestions, highlighted.
    pub fn rendered(&self) -> Vec<String> {
        self.suggestions()
            .iter()
            .map(|suggestion| self.display_text(&suggestion.display))
            .collect()
    }

    fn request_suggestions(&self, chain: NamedChain) {
        let value = lock(&self.inner.state).input.value.clone();
        match &self.inner.source {
            SuggestionSource::Local(source) => {
                let suggestions = source(&value);
                lock(&self.inner.state).suggestions = suggestions;
                chain.run();
            }
            SuggestionSource::Remote(url) => {
                let options = &self.inner.options;
                let extra = options
                    .extra_data
                    .iter()
                    .filter(|(key, _)| **key != options.query)
                    .map(|(key, value)| (key.clone(), value.clone()));
                let request = ResponseRequest::get(url.clone())
                    .with_data(extra)
                    .with_param(options.query.clone(), value)
                    .with_chain(chain);
                self.inner.dispatcher.spawn_send(request);
            }
        }
    }

    fn fire(&self, event: AutoCompleteEvent, chain: &mut NamedChain) {
        fire(&self.inner.hooks, event, self, chain);
    }
}

fn parse_suggestions(data: Option<&Value>) -> Vec<Suggestion> {
    let Some(data) = data else {
        warn!("autocomplete: suggestions item without data");
        return Vec::new();
    };
    serde_json::from_value(data.clone()).unwrap_or_else(|error| {
        warn!(%error, "autocomplete: invalid suggestions");
        Vec::new()
    })
}

fn highlight(display: &str, needle: &str) -> String {
    if needle.is_empty() {
        return display.to_string();
    }

    // ASCII lowercasing keeps byte offsets identical to `display`.
    let haystack = display.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    let mut out = String::with_capacity(display.len());
    let mut cursor = 0;

    while let Some(found) = haystack[cursor..].find(&needle) {
        let start = cursor + found;
        let end = start + needle.len();
        out.push_str(&display[cursor..start]);
        out.push_str(r#"<span class="provided">"#);
        out.push_str(&display[start..end]);
        out.push_str("</span>");
        cursor = end;
    }
    out.push_str(&display[cursor..]);
    out
}

#[cfg(test)]
#[path = "../tests/autocomplete_tests.rs"]
mod tests;
