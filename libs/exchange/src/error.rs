use axum::response::{IntoResponse, Response};
use axum::{Json, http::StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::config::{API_KEY_VAR, SESSION_CONFIG_VAR};

pub const LABEL_MISSING_API_KEY: &str = "Missing OPENAI_API_KEY";
pub const LABEL_MISSING_SESSION_CONFIG: &str = "Missing CHATKIT_SESSION_CONFIG";
pub const LABEL_INVALID_SESSION_CONFIG: &str = "Invalid CHATKIT_SESSION_CONFIG";
pub const LABEL_UPSTREAM: &str = "OpenAI API error";
pub const LABEL_UNEXPECTED: &str = "Failed to create ChatKit session";
pub const LABEL_MISSING_CLIENT_SECRET: &str = "Missing client secret in response";
pub const LABEL_METHOD_NOT_ALLOWED: &str = "Method Not Allowed";

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("OPENAI_API_KEY is not configured")]
    MissingApiKey,
    #[error("CHATKIT_SESSION_CONFIG is not configured")]
    MissingSessionConfig,
    #[error("CHATKIT_SESSION_CONFIG is not valid JSON: {0}")]
    InvalidSessionConfig(String),
    #[error("upstream returned status {status}")]
    Upstream { status: StatusCode, details: Value },
    #[error("upstream response did not include a client secret")]
    MissingClientSecret,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    Unexpected(#[source] anyhow::Error),
}

impl ExchangeError {
    pub fn status(&self) -> StatusCode {
        match self {
            ExchangeError::MissingApiKey
            | ExchangeError::MissingSessionConfig
            | ExchangeError::InvalidSessionConfig(_)
            | ExchangeError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ExchangeError::Upstream { status, .. } => *status,
            ExchangeError::MissingClientSecret => StatusCode::BAD_GATEWAY,
            ExchangeError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Stable label carried in the `error` field of the response body.
    pub fn label(&self) -> &'static str {
        match self {
            ExchangeError::MissingApiKey => LABEL_MISSING_API_KEY,
            ExchangeError::MissingSessionConfig => LABEL_MISSING_SESSION_CONFIG,
            ExchangeError::InvalidSessionConfig(_) => LABEL_INVALID_SESSION_CONFIG,
            ExchangeError::Upstream { .. } => LABEL_UPSTREAM,
            ExchangeError::MissingClientSecret => LABEL_MISSING_CLIENT_SECRET,
            ExchangeError::MethodNotAllowed => LABEL_METHOD_NOT_ALLOWED,
            ExchangeError::Unexpected(_) => LABEL_UNEXPECTED,
        }
    }

    /// Metric label for `chatkit_session_errors_total`.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::MissingApiKey => "missing_api_key",
            ExchangeError::MissingSessionConfig => "missing_session_config",
            ExchangeError::InvalidSessionConfig(_) => "invalid_session_config",
            ExchangeError::Upstream { .. } => "upstream_status",
            ExchangeError::MissingClientSecret => "missing_client_secret",
            ExchangeError::MethodNotAllowed => "method_not_allowed",
            ExchangeError::Unexpected(_) => "unexpected",
        }
    }

    fn body(self) -> ErrorBody {
        let error = self.label();
        match self {
            ExchangeError::MissingApiKey => ErrorBody::message(
                error,
                format!("Set {API_KEY_VAR} in the server environment and restart."),
            ),
            ExchangeError::MissingSessionConfig => ErrorBody::message(
                error,
                format!(
                    "Set {SESSION_CONFIG_VAR} (JSON) in the server environment to create a session."
                ),
            ),
            ExchangeError::InvalidSessionConfig(message) => ErrorBody::message(error, message),
            ExchangeError::Upstream { details, .. } => ErrorBody {
                error,
                message: None,
                details: Some(details),
            },
            ExchangeError::Unexpected(err) => ErrorBody::message(error, format!("{err:#}")),
            ExchangeError::MissingClientSecret | ExchangeError::MethodNotAllowed => ErrorBody {
                error,
                message: None,
                details: None,
            },
        }
    }
}

impl IntoResponse for ExchangeError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self.body())).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ErrorBody {
    fn message(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: Some(message.into()),
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;

    async fn body_json(err: ExchangeError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_api_key_is_server_error_with_hint() {
        let (status, body) = body_json(ExchangeError::MissingApiKey).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Missing OPENAI_API_KEY");
        assert!(body["message"].as_str().unwrap().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn invalid_config_echoes_parser_message() {
        let (status, body) =
            body_json(ExchangeError::InvalidSessionConfig("expected value at line 1".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({
                "error": "Invalid CHATKIT_SESSION_CONFIG",
                "message": "expected value at line 1"
            })
        );
    }

    #[tokio::test]
    async fn upstream_error_passes_status_and_details() {
        let (status, body) = body_json(ExchangeError::Upstream {
            status: StatusCode::TOO_MANY_REQUESTS,
            details: json!({"error": "rate_limited"}),
        })
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body,
            json!({"error": "OpenAI API error", "details": {"error": "rate_limited"}})
        );
    }

    #[tokio::test]
    async fn method_not_allowed_has_bare_label() {
        let (status, body) = body_json(ExchangeError::MethodNotAllowed).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, json!({"error": "Method Not Allowed"}));
    }

    #[tokio::test]
    async fn unexpected_error_carries_message() {
        let (status, body) =
            body_json(ExchangeError::Unexpected(anyhow::anyhow!("connection refused"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"error": "Failed to create ChatKit session", "message": "connection refused"})
        );
    }
}
