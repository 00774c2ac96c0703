use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use shared::domain::ElementId;
use tokio::sync::oneshot;

use crate::{
    error::TransportError,
    page::Page,
    transport::{Transport, TransportRequest},
};

pub(crate) enum Reply {
    Body(Option<String>),
    Error(String),
    /// Held until the sender fires; a dropped sender never resolves.
    Gated(oneshot::Receiver<Option<String>>),
}

/// Answers requests from a queue of canned replies and records every request.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn reply(&self, body: &str) {
        self.push(Reply::Body(Some(body.to_string())));
    }

    pub(crate) fn reply_empty(&self) {
        self.push(Reply::Body(None));
    }

    pub(crate) fn reply_error(&self, message: &str) {
        self.push(Reply::Error(message.to_string()));
    }

    pub(crate) fn reply_gated(&self) -> oneshot::Sender<Option<String>> {
        let (tx, rx) = oneshot::channel();
        self.push(Reply::Gated(rx));
        tx
    }

    pub(crate) fn push(&self, reply: Reply) {
        self.replies.lock().expect("replies").push_back(reply);
    }

    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().expect("requests").clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, request: &TransportRequest) -> Result<Option<String>, TransportError> {
        self.requests.lock().expect("requests").push(request.clone());
        let reply = self.replies.lock().expect("replies").pop_front();
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Error(message)) => Err(TransportError::Unavailable(message)),
            Some(Reply::Gated(rx)) => match rx.await {
                Ok(body) => Ok(body),
                Err(_) => std::future::pending().await,
            },
            None => Ok(None),
        }
    }
}

/// Records page calls as short strings, in order.
#[derive(Default)]
pub(crate) struct RecordingPage {
    calls: Mutex<Vec<String>>,
}

impl RecordingPage {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls").push(call);
    }
}

impl Page for RecordingPage {
    fn alert(&self, message: &str) {
        self.record(format!("alert:{message}"));
    }

    fn replace_element(&self, element_id: &ElementId, html: &str) {
        self.record(format!("replace:{element_id}:{html}"));
    }

    fn update_element(&self, element_id: &ElementId, html: &str) {
        self.record(format!("update:{element_id}:{html}"));
    }

    fn run_scripts(&self, scripts: &[String]) {
        self.record(format!("scripts:{}", scripts.join("|")));
    }

    fn redirect_post(&self, url: &str) {
        self.record(format!("redirect:{url}"));
    }

    fn reload(&self) {
        self.record("reload".to_string());
    }
}

pub(crate) type Log = Arc<Mutex<Vec<String>>>;

pub(crate) fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn entries(log: &Log) -> Vec<String> {
    log.lock().expect("log").clone()
}

pub(crate) fn push(log: &Log, entry: impl Into<String>) {
    log.lock().expect("log").push(entry.into());
}

/// Polls `condition` until it holds; panics after roughly a second.
pub(crate) async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

pub(crate) fn scripted_dispatcher(
    transport: &Arc<ScriptedTransport>,
) -> crate::responses::ResponseDispatcher {
    crate::responses::ResponseDispatcher::headless(Arc::clone(transport) as Arc<dyn Transport>)
}
