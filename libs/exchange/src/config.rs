use std::fmt;
use std::time::Duration;

use serde_json::Value;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const SESSION_CONFIG_VAR: &str = "CHATKIT_SESSION_CONFIG";
pub const API_BASE_VAR: &str = "OPENAI_BASE_URL";
pub const UPSTREAM_TIMEOUT_VAR: &str = "CHATKIT_UPSTREAM_TIMEOUT_SECS";

/// Session document as configured at startup, parsed once.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionConfigSetting {
    Missing,
    Invalid(String),
    Valid(Value),
}

impl SessionConfigSetting {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            None => Self::Missing,
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(value) => Self::Valid(value),
                Err(err) => Self::Invalid(err.to_string()),
            },
        }
    }
}

/// Server-side settings for the credential exchange. Built once at process
/// startup and handed to the router.
#[derive(Clone, PartialEq)]
pub struct ExchangeConfig {
    api_key: Option<String>,
    session_config: SessionConfigSetting,
    api_base: String,
    upstream_timeout: Option<Duration>,
}

impl ExchangeConfig {
    pub fn new(api_key: Option<String>, session_config: SessionConfigSetting) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            session_config,
            api_base: DEFAULT_API_BASE.to_string(),
            upstream_timeout: None,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut config = Self::new(
            non_empty(API_KEY_VAR),
            SessionConfigSetting::parse(lookup(SESSION_CONFIG_VAR).as_deref()),
        );
        if let Some(base) = non_empty(API_BASE_VAR) {
            config = config.with_api_base(base);
        }
        let timeout = non_empty(UPSTREAM_TIMEOUT_VAR)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        config.upstream_timeout = timeout;
        config
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = Some(timeout);
        self
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn session_config(&self) -> &SessionConfigSetting {
        &self.session_config
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream_timeout
    }
}

impl fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session_config = match &self.session_config {
            SessionConfigSetting::Missing => "missing",
            SessionConfigSetting::Invalid(_) => "invalid",
            SessionConfigSetting::Valid(_) => "valid",
        };
        f.debug_struct("ExchangeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("session_config", &session_config)
            .field("api_base", &self.api_base)
            .field("upstream_timeout", &self.upstream_timeout)
            .finish()
    }
}
