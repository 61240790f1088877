use std::time::{Duration, Instant};

use async_trait::async_trait;
use http::StatusCode;
use metrics::{counter, histogram};
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

const SESSIONS_PATH: &str = "chatkit/sessions";
const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "chatkit_beta=v1";

/// Raw upstream answer. `body` is `{}` when the response was not JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Value,
}

impl UpstreamReply {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.body.get("client_secret").and_then(Value::as_str)
    }
}

#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn create_session(
        &self,
        api_key: &str,
        document: &Value,
    ) -> Result<UpstreamReply, SessionApiError>;
}

#[derive(Debug, Error)]
pub enum SessionApiError {
    #[error("session api configuration error: {0}")]
    Config(anyhow::Error),
    #[error("session api transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

pub struct ReqwestSessionApi {
    client: Client,
    base_url: Url,
    timeout: Option<Duration>,
}

impl ReqwestSessionApi {
    pub fn new(client: Client, base_url: &str) -> Result<Self, SessionApiError> {
        // Trailing slash keeps the versioned path segment when joining.
        let normalized = format!("{}/", base_url.trim().trim_end_matches('/'));
        let url = Url::parse(&normalized).map_err(|err| SessionApiError::Config(err.into()))?;
        Ok(Self {
            client,
            base_url: url,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> Result<Url, SessionApiError> {
        self.base_url
            .join(SESSIONS_PATH)
            .map_err(|err| SessionApiError::Config(err.into()))
    }
}

#[async_trait]
impl SessionApi for ReqwestSessionApi {
    async fn create_session(
        &self,
        api_key: &str,
        document: &Value,
    ) -> Result<UpstreamReply, SessionApiError> {
        let url = self.endpoint()?;
        let started = Instant::now();
        let mut request = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .header(BETA_HEADER, BETA_VALUE)
            .json(document);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|err| {
            counter!(
                "chatkit_session_errors_total",
                "kind" => "upstream_transport"
            )
            .increment(1);
            SessionApiError::Transport(err)
        })?;

        let status = response.status();
        histogram!(
            "chatkit_upstream_roundtrip_seconds",
            "status" => status.as_str().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        // The status is already known; a body that cannot be read counts as `{}`.
        let body = match response.bytes().await {
            Ok(bytes) => decode_body(&bytes),
            Err(err) => {
                warn!(%status, error = %err, "upstream body could not be read");
                Value::Object(Map::new())
            }
        };
        Ok(UpstreamReply::new(status, body))
    }
}

/// Upstream bodies that fail to parse are treated as an empty object.
pub fn decode_body(bytes: &[u8]) -> Value {
    serde_json::from_slice::<Value>(bytes).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Stands in when the upstream base URL could not be parsed at startup, so
/// each request fails with a server error instead of the process refusing to
/// boot.
pub struct UnavailableSessionApi {
    reason: String,
}

impl UnavailableSessionApi {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SessionApi for UnavailableSessionApi {
    async fn create_session(
        &self,
        _api_key: &str,
        _document: &Value,
    ) -> Result<UpstreamReply, SessionApiError> {
        Err(SessionApiError::Config(anyhow::anyhow!(
            "upstream base url unusable: {}",
            self.reason
        )))
    }
}

/// Canned upstream used by tests and local development.
pub struct MockSessionApi {
    pub calls: Mutex<Vec<(String, Value)>>,
    pub reply: UpstreamReply,
}

impl MockSessionApi {
    pub fn new(reply: UpstreamReply) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reply,
        }
    }

    pub fn replying(status: StatusCode, body: Value) -> Self {
        Self::new(UpstreamReply::new(status, body))
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl SessionApi for MockSessionApi {
    async fn create_session(
        &self,
        api_key: &str,
        document: &Value,
    ) -> Result<UpstreamReply, SessionApiError> {
        self.calls
            .lock()
            .await
            .push((api_key.to_string(), document.clone()));
        Ok(self.reply.clone())
    }
}
