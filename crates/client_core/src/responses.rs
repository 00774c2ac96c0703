//! Server-driven response dispatching.
//!
//! A [`ResponseDispatcher`] sends one request through its [`Transport`],
//! parses the body into an [`Envelope`] and applies every item in order:
//! built-in item types act on the [`Page`], `callback` items fan out to the
//! handlers registered under their key, and every item is offered to the
//! registered [`ResponseListener`]s. After processing, the request's
//! continuation chain (if any) is resumed exactly once.
//!
//! Only one request per dispatcher is outstanding: a newer `send` cancels the
//! older one, which then reports [`DispatchOutcome::Superseded`] and drops its
//! continuation.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use serde_json::Value;
use shared::{
    html::extract_scripts,
    protocol::{Envelope, ResponseItem},
};
use tokio::{
    runtime::Handle,
    sync::{broadcast, oneshot, Mutex as AsyncMutex},
    task::JoinHandle,
};
use tracing::{debug, trace, warn};

use crate::{
    chain::NamedChain,
    error::DispatchError,
    page::{HeadlessPage, Page},
    transport::{Method, Transport, TransportRequest},
};

/// Callback handler: receives the item's parameters.
pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Allow-listed target for `function_call` items: receives scope and
/// parameters.
pub type AllowedFunction = Arc<dyn Fn(&Value, &[Value]) + Send + Sync>;

#[derive(Debug, Default)]
pub struct ResponseRequest {
    pub method: Method,
    pub url: String,
    pub data: Vec<(String, String)>,
    /// Visible to listeners for the duration of this request's processing.
    pub extra_data: Option<Value>,
    /// Resumed once after all items have been processed.
    pub chain: Option<NamedChain>,
}

impl ResponseRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.push((key.into(), value.into()));
        self
    }

    pub fn with_data<I, K, V>(mut self, data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.data
            .extend(data.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_extra_data(mut self, extra_data: Value) -> Self {
        self.extra_data = Some(extra_data);
        self
    }

    pub fn with_chain(mut self, chain: NamedChain) -> Self {
        self.chain = Some(chain);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The body was applied; the continuation (if any) has been resumed.
    Processed { items: usize },
    /// No usable response. Failure listeners ran and the continuation was
    /// dropped.
    Failed,
    /// A newer request on the same dispatcher cancelled this one.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    StartProcessing { items: Vec<ResponseItem> },
    ProcessItem { index: usize, item: ResponseItem },
    FinishProcessing { items: Vec<ResponseItem> },
    Failure,
}

/// What listeners can see of the request being processed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchContext<'a> {
    pub extra_data: Option<&'a Value>,
}

/// Observer of response processing. Notifications are delivered
/// synchronously and in order: `start_processing`, one `process_item` per
/// item, `finish_processing`; or a single `failure`.
pub trait ResponseListener: Send + Sync {
    fn start_processing(&self, ctx: &DispatchContext<'_>, items: &[ResponseItem]) {
        let _ = (ctx, items);
    }

    fn process_item(&self, ctx: &DispatchContext<'_>, item: &ResponseItem) {
        let _ = (ctx, item);
    }

    fn finish_processing(&self, ctx: &DispatchContext<'_>, items: &[ResponseItem]) {
        let _ = (ctx, items);
    }

    fn failure(&self, ctx: &DispatchContext<'_>) {
        let _ = ctx;
    }
}

/// Adapts a closure into a listener that only cares about single items.
pub struct ItemListener<F>(pub F);

impl<F> ResponseListener for ItemListener<F>
where
    F: Fn(&DispatchContext<'_>, &ResponseItem) + Send + Sync,
{
    fn process_item(&self, ctx: &DispatchContext<'_>, item: &ResponseItem) {
        (self.0)(ctx, item)
    }
}

pub struct ResponseDispatcher {
    transport: Arc<dyn Transport>,
    page: Arc<dyn Page>,
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
    functions: RwLock<HashMap<String, AllowedFunction>>,
    listeners: RwLock<Vec<Arc<dyn ResponseListener>>>,
    inflight: Mutex<Option<(u64, oneshot::Sender<()>)>>,
    next_request: AtomicU64,
    processing: AsyncMutex<()>,
    events: broadcast::Sender<DispatchEvent>,
}

/// Claim on the dispatcher's single in-flight slot.
struct Ticket {
    id: u64,
    cancel: oneshot::Receiver<()>,
}

impl ResponseDispatcher {
    pub fn new(transport: Arc<dyn Transport>, page: Arc<dyn Page>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            transport,
            page,
            handlers: RwLock::new(HashMap::new()),
            functions: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            inflight: Mutex::new(None),
            next_request: AtomicU64::new(1),
            processing: AsyncMutex::new(()),
            events,
        }
    }

    pub fn headless(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, Arc::new(HeadlessPage))
    }

    /// Registers a callback handler. Several handlers may share a key; they run
    /// in registration order.
    pub fn add_handler<F>(&self, key: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let key = key.into();
        debug!(key = %key, "responses: handler registered");
        write(&self.handlers)
            .entry(key)
            .or_default()
            .push(Arc::new(handler));
    }

    pub fn has_handler(&self, key: &str) -> bool {
        read(&self.handlers)
            .get(key)
            .is_some_and(|handlers| !handlers.is_empty())
    }

    /// Allow-lists `name` as a `function_call` target. Items naming anything
    /// else are logged and ignored.
    pub fn allow_function<F>(&self, name: impl Into<String>, function: F)
    where
        F: Fn(&Value, &[Value]) + Send + Sync + 'static,
    {
        write(&self.functions).insert(name.into(), Arc::new(function));
    }

    pub fn add_listener(&self, listener: Arc<dyn ResponseListener>) {
        write(&self.listeners).push(listener);
    }

    pub fn on_item<F>(&self, f: F)
    where
        F: Fn(&DispatchContext<'_>, &ResponseItem) + Send + Sync + 'static,
    {
        self.add_listener(Arc::new(ItemListener(f)));
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// Issues `request`, cancelling any request still outstanding on this
    /// dispatcher, and processes its response.
    ///
    /// Transport failures and empty bodies are reported to failure listeners
    /// and yield [`DispatchOutcome::Failed`]. A body that is not a valid
    /// envelope is an error and nothing is processed. In every case other than
    /// `Processed` the continuation is dropped unexecuted.
    pub async fn send(&self, request: ResponseRequest) -> Result<DispatchOutcome, DispatchError> {
        let ticket = self.begin();
        self.complete(ticket, request).await
    }

    /// Spawns [`ResponseDispatcher::send`] onto the current runtime. Used by
    /// chain steps, which cannot await. The request supersedes any outstanding
    /// one before this returns. Outside a runtime the request is dropped
    /// together with its continuation and `None` is returned.
    pub fn spawn_send(
        self: &Arc<Self>,
        request: ResponseRequest,
    ) -> Option<JoinHandle<Result<DispatchOutcome, DispatchError>>> {
        let Ok(runtime) = Handle::try_current() else {
            warn!(url = %request.url, "responses: no async runtime; request dropped");
            return None;
        };
        let ticket = self.begin();
        let dispatcher = Arc::clone(self);
        Some(runtime.spawn(async move {
            let outcome = dispatcher.complete(ticket, request).await;
            if let Err(error) = &outcome {
                warn!(%error, "responses: dispatch failed");
            }
            outcome
        }))
    }

    /// Claims the next request id and cancels whatever is still in flight.
    fn begin(&self) -> Ticket {
        let id = self.next_request.fetch_add(1, Ordering::SeqCst);
        let (cancel_tx, cancel) = oneshot::channel();
        let outstanding = self.inflight().replace((id, cancel_tx));
        if let Some((previous, previous_cancel)) = outstanding {
            debug!(previous, request_id = id, "responses: cancelling outstanding request");
            let _ = previous_cancel.send(());
        }
        Ticket { id, cancel }
    }

    async fn complete(
        &self,
        ticket: Ticket,
        request: ResponseRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Ticket { id: request_id, cancel } = ticket;
        let ResponseRequest {
            method,
            url,
            data,
            extra_data,
            chain,
        } = request;
        let transport_request = TransportRequest { method, url, data };

        let response = tokio::select! {
            biased;
            _ = cancel => {
                debug!(request_id, url = %transport_request.url, "responses: request superseded");
                return Ok(DispatchOutcome::Superseded);
            }
            response = self.transport.request(&transport_request) => response,
        };

        {
            let mut inflight = self.inflight();
            if matches!(&*inflight, Some((id, _)) if *id == request_id) {
                *inflight = None;
            }
        }

        let body = match response {
            Ok(body) => body,
            Err(error) => {
                warn!(%error, url = %transport_request.url, "responses: request failed");
                None
            }
        };
        self.handle_response(body.as_deref(), extra_data, chain)
            .await
    }

    /// Processes a response body that has already been received.
    pub async fn handle_response(
        &self,
        body: Option<&str>,
        extra_data: Option<Value>,
        chain: Option<NamedChain>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let envelope = match body {
            Some(body) => Envelope::parse_optional(body).map_err(|error| {
                warn!(%error, "responses: discarding malformed response");
                DispatchError::from(error)
            })?,
            None => None,
        };

        let guard = self.processing.lock().await;
        let ctx = DispatchContext {
            extra_data: extra_data.as_ref(),
        };

        let Some(envelope) = envelope else {
            debug!("responses: empty response");
            for listener in self.listeners() {
                listener.failure(&ctx);
            }
            let _ = self.events.send(DispatchEvent::Failure);
            drop(guard);
            drop(chain);
            return Ok(DispatchOutcome::Failed);
        };

        let items = envelope.into_items();
        let listeners = self.listeners();

        for listener in &listeners {
            listener.start_processing(&ctx, &items);
        }
        let _ = self.events.send(DispatchEvent::StartProcessing {
            items: items.clone(),
        });

        for (index, item) in items.iter().enumerate() {
            self.apply(item);
            for listener in &listeners {
                listener.process_item(&ctx, item);
            }
            let _ = self.events.send(DispatchEvent::ProcessItem {
                index,
                item: item.clone(),
            });
        }

        for listener in &listeners {
            listener.finish_processing(&ctx, &items);
        }
        let _ = self.events.send(DispatchEvent::FinishProcessing {
            items: items.clone(),
        });

        drop(guard);
        drop(extra_data);

        if let Some(chain) = chain {
            chain.run();
        }
        Ok(DispatchOutcome::Processed { items: items.len() })
    }

    fn apply(&self, item: &ResponseItem) {
        match item {
            ResponseItem::Alert { message } => self.page.alert(message),
            ResponseItem::Callback { key, parameters } => {
                let handlers = read(&self.handlers)
                    .get(key.as_str())
                    .cloned()
                    .unwrap_or_default();
                if handlers.is_empty() {
                    debug!(%key, "responses: no handler for callback");
                }
                for handler in handlers {
                    handler(parameters);
                }
            }
            ResponseItem::ElementReplace { element_id, html } => {
                let (markup, scripts) = extract_scripts(html);
                self.page.replace_element(element_id, &markup);
                if !scripts.is_empty() {
                    self.page.run_scripts(&scripts);
                }
            }
            ResponseItem::ElementUpdate { element_id, html } => {
                let (markup, scripts) = extract_scripts(html);
                self.page.update_element(element_id, &markup);
                if !scripts.is_empty() {
                    self.page.run_scripts(&scripts);
                }
            }
            ResponseItem::FunctionCall {
                function,
                scope,
                parameters,
            } => {
                let target = read(&self.functions).get(function).cloned();
                match target {
                    Some(target) => target(scope, parameters),
                    None => warn!(function, "responses: function_call target not allowed"),
                }
            }
            ResponseItem::Redirect { url } => self.page.redirect_post(url),
            ResponseItem::Reload => self.page.reload(),
            ResponseItem::Other { item_type, .. } => {
                trace!(item_type, "responses: left to listeners");
            }
        }
    }

    fn listeners(&self) -> Vec<Arc<dyn ResponseListener>> {
        read(&self.listeners).clone()
    }

    fn inflight(&self) -> MutexGuard<'_, Option<(u64, oneshot::Sender<()>)>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tests/responses_tests.rs"]
mod tests;
