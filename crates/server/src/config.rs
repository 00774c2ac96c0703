use std::{collections::HashMap, fs};

use serde::Deserialize;

pub const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Deserialize, PartialEq)]
pub struct Settings {
    pub server_bind: String,
    /// Envelope files (`<key>.json`) preloaded as sessions at startup.
    pub fixtures_dir: Option<String>,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            fixtures_dir: None,
            max_body_bytes: 1024 * 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    let raw = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from(raw.as_deref(), |key| std::env::var(key).ok())
}

/// Builds settings from an optional `server.toml` body, then applies
/// environment overrides looked up through `env`. Unparseable values are
/// ignored.
pub fn settings_from<F>(raw: Option<&str>, env: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = Settings::default();

    if let Some(raw) = raw {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) {
            if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
                settings.server_bind = v.to_string();
            }
            if let Some(v) = file_cfg.get("fixtures_dir").and_then(toml::Value::as_str) {
                settings.fixtures_dir = Some(v.to_string());
            }
            if let Some(v) = file_cfg
                .get("max_body_bytes")
                .and_then(toml::Value::as_integer)
                .and_then(|v| usize::try_from(v).ok())
            {
                settings.max_body_bytes = v;
            }
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("FIXTURES_DIR") {
        settings.fixtures_dir = Some(v);
    }
    if let Some(v) = env("APP__FIXTURES_DIR") {
        settings.fixtures_dir = Some(v);
    }

    if let Some(v) = env("APP__MAX_BODY_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_body_bytes = parsed;
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
