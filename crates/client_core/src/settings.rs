//! Client and widget configuration.
//!
//! Settings come from `client.toml` (when present) and are then adjusted by
//! environment overrides. Every field has a default matching the widgets'
//! built-in behaviour, so an empty file is a valid configuration.

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

pub const SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub transport: TransportSettings,
    pub autocomplete: AutoCompleteOptions,
    pub layer: LayerOptions,
    pub tabs: TabOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Relative request URLs are resolved against this.
    pub base_url: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoCompleteOptions {
    /// Minimum input length before suggestions are fetched.
    pub min_length: usize,
    /// Name of the request parameter carrying the user's input.
    pub query: String,
    /// Extra parameters sent with every suggestion request.
    pub extra_data: BTreeMap<String, String>,
}

impl Default for AutoCompleteOptions {
    fn default() -> Self {
        Self {
            min_length: 3,
            query: "query".to_string(),
            extra_data: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerOptions {
    /// Content is fetched from here when the layer is shown.
    pub url: Option<String>,
    /// Fetch on every show. When false the url is forgotten after the first
    /// successful show.
    pub refetch: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabOptions {
    /// Initially active tab. Falls back to the first tab when unset or out of
    /// range.
    pub active: Option<usize>,
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies `APP__BASE_URL` and `APP__REQUEST_TIMEOUT_MS` as looked up by
    /// `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("APP__BASE_URL") {
            self.transport.base_url = Some(v);
        }
        if let Some(v) = lookup("APP__REQUEST_TIMEOUT_MS") {
            self.transport.request_timeout_ms =
                v.parse().map_err(|_| SettingsError::InvalidOverride {
                    key: "APP__REQUEST_TIMEOUT_MS",
                    value: v.clone(),
                })?;
        }
        Ok(())
    }
}

pub fn load_settings_from(path: &Path) -> Result<Settings, SettingsError> {
    let mut settings = if path.exists() {
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Settings::from_toml_str(&raw)?
    } else {
        Settings::default()
    };

    settings.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(settings)
}

pub fn load_settings() -> Result<Settings, SettingsError> {
    load_settings_from(Path::new(SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_widget_defaults() {
        let settings = Settings::from_toml_str("").expect("settings");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.autocomplete.min_length, 3);
        assert_eq!(settings.autocomplete.query, "query");
        assert!(!settings.layer.refetch);
        assert_eq!(settings.transport.request_timeout_ms, 30_000);
    }

    #[test]
    fn parses_partial_sections() {
        let settings = Settings::from_toml_str(
            r#"
            [transport]
            base_url = "http://127.0.0.1:8080"

            [autocomplete]
            min_length = 1
            extra_data = { scope = "users" }

            [layer]
            url = "/layer"
            refetch = true

            [tabs]
            active = 2
            "#,
        )
        .expect("settings");

        assert_eq!(
            settings.transport.base_url.as_deref(),
            Some("http://127.0.0.1:8080")
        );
        assert_eq!(settings.transport.request_timeout_ms, 30_000);
        assert_eq!(settings.autocomplete.min_length, 1);
        assert_eq!(settings.autocomplete.query, "query");
        assert_eq!(
            settings.autocomplete.extra_data.get("scope").map(String::as_str),
            Some("users")
        );
        assert_eq!(settings.layer.url.as_deref(), Some("/layer"));
        assert!(settings.layer.refetch);
        assert_eq!(settings.tabs.active, Some(2));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(|key| match key {
                "APP__BASE_URL" => Some("http://example.test".to_string()),
                "APP__REQUEST_TIMEOUT_MS" => Some("250".to_string()),
                _ => None,
            })
            .expect("overrides");

        assert_eq!(
            settings.transport.base_url.as_deref(),
            Some("http://example.test")
        );
        assert_eq!(settings.transport.request_timeout_ms, 250);
    }

    #[test]
    fn rejects_non_numeric_timeout_override() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(|key| (key == "APP__REQUEST_TIMEOUT_MS").then(|| "soon".to_string()))
            .expect_err("must fail");
        assert!(matches!(
            err,
            SettingsError::InvalidOverride {
                key: "APP__REQUEST_TIMEOUT_MS",
                ..
            }
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings =
            load_settings_from(Path::new("definitely/not/here/client.toml")).expect("settings");
        assert_eq!(settings.layer, LayerOptions::default());
    }
}
