use std::{collections::HashMap, fs, path::Path};

use anyhow::Context;
use shared::protocol::Envelope;
use tokio::sync::RwLock;
use tracing::info;

/// Envelopes stored by session key, replayed by `/responses?session_key=`.
#[derive(Default)]
pub(crate) struct AppState {
    sessions: RwLock<HashMap<String, Envelope>>,
}

impl AppState {
    pub(crate) async fn store(&self, key: &str, envelope: Envelope) {
        info!(key, items = envelope.len(), "session stored");
        self.sessions
            .write()
            .await
            .insert(key.to_string(), envelope);
    }

    pub(crate) async fn session(&self, key: &str) -> Option<Envelope> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Stores every `<key>.json` file in `dir` under `<key>`.
    pub(crate) async fn load_fixtures(&self, dir: &Path) -> anyhow::Result<usize> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("failed to read fixtures dir '{}'", dir.display()))?;

        let mut loaded = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read fixture '{}'", path.display()))?;
            let envelope = Envelope::parse(&raw)
                .with_context(|| format!("invalid fixture '{}'", path.display()))?;
            self.store(key, envelope).await;
            loaded += 1;
        }
        Ok(loaded)
    }
}
