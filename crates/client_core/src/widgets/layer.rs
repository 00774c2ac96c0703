//! Modal content layer.
//!
//! A layer shows content fetched from the server. Content arrives as a
//! `callback` item keyed [`Layer::UPDATE_CONTENT`] whose first parameter is
//! the markup.

use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tracing::{debug, warn};

use super::{fire, lock, Hooks};
use crate::{
    chain::NamedChain,
    registry::InstanceRegistry,
    responses::{ResponseDispatcher, ResponseRequest},
    settings::LayerOptions,
    transport::Method,
};

/// Step names of every layer operation.
pub mod steps {
    pub mod fetch_url {
        pub const FIRE_EVENT: &str = "Layer.fetch_url:fire_event";
        pub const REQUEST: &str = "Layer.fetch_url:request";
        pub const WRAPUP: &str = "Layer.fetch_url:wrapup";
    }

    pub mod hide {
        pub const FIRE_EVENT: &str = "Layer.hide:fire_event";
        pub const HIDE: &str = "Layer.hide:hide";
    }

    pub mod show {
        pub const FIRE_EVENT: &str = "Layer.show:fire_event";
        pub const REQUEST: &str = "Layer.show:request";
        pub const SHOW: &str = "Layer.show:show";
    }

    pub mod submit_form {
        pub const FIRE_EVENT: &str = "Layer.submit_form:fire_event";
        pub const REQUEST: &str = "Layer.submit_form:request";
        pub const WRAPUP: &str = "Layer.submit_form:wrapup";
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerEvent {
    StartFetching,
    FinishFetching,
    StartPosting,
    FinishPosting,
    Show,
    Hide,
}

/// An intercepted form: where it posts to and what it sends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    pub method: Method,
    pub action: String,
    pub data: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct LayerState {
    visible: bool,
    content: String,
}

struct LayerInner {
    dispatcher: Arc<ResponseDispatcher>,
    options: Mutex<LayerOptions>,
    state: Mutex<LayerState>,
    hooks: Mutex<Hooks<LayerEvent, Layer>>,
}

#[derive(Clone)]
pub struct Layer {
    inner: Arc<LayerInner>,
}

impl Layer {
    /// Callback key the layer answers with [`Layer::update_content`].
    pub const UPDATE_CONTENT: &'static str = "update_content";

    pub fn new(dispatcher: ResponseDispatcher, options: LayerOptions) -> Self {
        let inner = Arc::new(LayerInner {
            dispatcher: Arc::new(dispatcher),
            options: Mutex::new(options),
            state: Mutex::new(LayerState::default()),
            hooks: Mutex::new(Hooks::new()),
        });

        let weak: Weak<LayerInner> = Arc::downgrade(&inner);
        inner
            .dispatcher
            .add_handler(Self::UPDATE_CONTENT, move |params: &[Value]| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match params.first().and_then(Value::as_str) {
                    Some(html) => Layer { inner }.update_content(html),
                    None => warn!("layer: update_content without markup"),
                }
            });

        Self { inner }
    }

    pub fn singleton(
        registry: &InstanceRegistry,
        name: Option<&str>,
        dispatcher: ResponseDispatcher,
        options: LayerOptions,
    ) -> Arc<Self> {
        registry.singleton(name, || Self::new(dispatcher, options))
    }

    pub fn on<F>(&self, event: LayerEvent, hook: F) -> &Self
    where
        F: Fn(&Layer, &mut NamedChain) + Send + Sync + 'static,
    {
        lock(&self.inner.hooks).add(event, hook);
        self
    }

    pub fn dispatcher(&self) -> &Arc<ResponseDispatcher> {
        &self.inner.dispatcher
    }

    pub fn is_visible(&self) -> bool {
        lock(&self.inner.state).visible
    }

    pub fn content(&self) -> String {
        lock(&self.inner.state).content.clone()
    }

    pub fn url(&self) -> Option<String> {
        lock(&self.inner.options).url.clone()
    }

    pub fn options(&self) -> LayerOptions {
        lock(&self.inner.options).clone()
    }

    /// Shows the layer, fetching its content first when a url is configured.
    pub fn show(&self) {
        let mut chain = NamedChain::new();

        let layer = self.clone();
        chain.append(steps::show::FIRE_EVENT, move |mut chain: NamedChain| {
            layer.fire(LayerEvent::Show, &mut chain);
            chain.run();
        });

        let layer = self.clone();
        chain.append(steps::show::REQUEST, move |chain: NamedChain| {
            match layer.url() {
                Some(url) => layer.fetch_url(&url, Some(chain)),
                None => chain.run(),
            }
        });

        let layer = self.clone();
        chain.append(steps::show::SHOW, move |chain: NamedChain| {
            {
                let mut options = lock(&layer.inner.options);
                if options.url.is_some() && !options.refetch {
                    options.url = None;
                }
            }
            lock(&layer.inner.state).visible = true;
            debug!("layer: shown");
            chain.run();
        });

        chain.run();
    }

    pub fn hide(&self) {
        let mut chain = NamedChain::new();

        let layer = self.clone();
        chain.append(steps::hide::FIRE_EVENT, move |mut chain: NamedChain| {
            layer.fire(LayerEvent::Hide, &mut chain);
            chain.run();
        });

        let layer = self.clone();
        chain.append(steps::hide::HIDE, move |chain: NamedChain| {
            lock(&layer.inner.state).visible = false;
            debug!("layer: hidden");
            chain.run();
        });

        chain.run();
    }

    /// Loads `url` into the layer. When `parent` is given it is resumed during
    /// wrap-up, before the rest of this operation's own chain.
    pub fn fetch_url(&self, url: &str, parent: Option<NamedChain>) {
        let mut chain = NamedChain::new();

        let layer = self.clone();
        chain.append(steps::fetch_url::FIRE_EVENT, move |mut chain: NamedChain| {
            layer.fire(LayerEvent::StartFetching, &mut chain);
            chain.run();
        });

        let layer = self.clone();
        let url = url.to_string();
        chain.append(steps::fetch_url::REQUEST, move |chain: NamedChain| {
            layer
                .inner
                .dispatcher
                .spawn_send(ResponseRequest::get(url).with_chain(chain));
        });

        let layer = self.clone();
        chain.append(steps::fetch_url::WRAPUP, move |mut chain: NamedChain| {
            layer.fire(LayerEvent::FinishFetching, &mut chain);
            if let Some(parent) = parent {
                parent.run();
            }
            chain.run();
        });

        chain.run();
    }

    pub fn submit_form(&self, form: FormSubmission) {
        let mut chain = NamedChain::new();

        let layer = self.clone();
        chain.append(steps::submit_form::FIRE_EVENT, move |mut chain: NamedChain| {
            layer.fire(LayerEvent::StartPosting, &mut chain);
            chain.run();
        });

        let layer = self.clone();
        chain.append(steps::submit_form::REQUEST, move |chain: NamedChain| {
            let FormSubmission {
                method,
                action,
                data,
            } = form;
            let request = ResponseRequest {
                method,
                url: action,
                data,
                extra_data: None,
                chain: Some(chain),
            };
            layer.inner.dispatcher.spawn_send(request);
        });

        let layer = self.clone();
        chain.append(steps::submit_form::WRAPUP, move |mut chain: NamedChain| {
            layer.fire(LayerEvent::FinishPosting, &mut chain);
            chain.run();
        });

        chain.run();
    }

    pub fn update_content(&self, html: &str) {
        debug!(bytes = html.len(), "layer: content updated");
        lock(&self.inner.state).content = html.to_string();
    }

    fn fire(&self, event: LayerEvent, chain: &mut NamedChain) {
        fire(&self.inner.hooks, event, self, chain);
    }
}

#[cfg(test)]
#[path = "../tests/layer_tests.rs"]
mod tests;
