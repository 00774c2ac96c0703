use std::{fmt, str::FromStr, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderValue, ACCEPT},
    Client,
};
use tracing::debug;
use url::Url;

use crate::{error::TransportError, settings::TransportSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = TransportError;

    /// Form methods are case-insensitive; an empty method means GET.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("get") {
            Ok(Self::Get)
        } else if value.eq_ignore_ascii_case("post") {
            Ok(Self::Post)
        } else {
            Err(TransportError::Unavailable(format!(
                "unsupported method '{value}'"
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    /// Sent as the query string for GET and as a form body for POST.
    pub data: Vec<(String, String)>,
}

/// Issues one request and yields its body. `Ok(None)` means the server sent
/// nothing usable, which the dispatcher treats as a failed request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: &TransportRequest) -> Result<Option<String>, TransportError>;
}

pub struct MissingTransport;

#[async_trait]
impl Transport for MissingTransport {
    async fn request(&self, request: &TransportRequest) -> Result<Option<String>, TransportError> {
        Err(TransportError::Unavailable(format!(
            "no transport configured for {}",
            request.url
        )))
    }
}

pub struct HttpTransport {
    http: Client,
    base_url: Option<Url>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            base_url: None,
        }
    }

    pub fn from_settings(settings: &TransportSettings) -> Result<Self, TransportError> {
        let base_url = settings
            .base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|source| TransportError::InvalidUrl {
                    url: raw.to_string(),
                    source,
                })
            })
            .transpose()?;
        let http = Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Absolute URLs pass through; relative ones are joined onto the base URL.
    pub fn resolve(&self, raw: &str) -> Result<Url, TransportError> {
        let parsed = match &self.base_url {
            Some(base) => base.join(raw),
            None => Url::parse(raw),
        };
        parsed.map_err(|source| TransportError::InvalidUrl {
            url: raw.to_string(),
            source,
        })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: &TransportRequest) -> Result<Option<String>, TransportError> {
        let url = self.resolve(&request.url)?;
        debug!(method = %request.method, %url, "transport: sending request");

        let builder = match request.method {
            Method::Get => self.http.get(url).query(&request.data),
            Method::Post => self.http.post(url).form(&request.data),
        };
        let response = builder
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(body))
    }
}
