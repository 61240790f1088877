use std::{any::Any, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use metrics::counter;
use reqwest::Client;
use serde::Serialize;
use tower_http::{
    catch_panic::CatchPanicLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    client::{ReqwestSessionApi, SessionApi, SessionApiError, UnavailableSessionApi},
    config::{ExchangeConfig, SessionConfigSetting},
    error::ExchangeError,
};

pub const SESSION_PATH: &str = "/api/chatkit-session";
pub const SESSION_ALIAS_PATH: &str = "/api/create-session";

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ExchangeConfig>,
    pub sessions: Arc<dyn SessionApi>,
}

impl AppState {
    /// Wires the reqwest upstream client from `config`. An unusable base URL
    /// is logged here and reported per request.
    pub fn new(config: ExchangeConfig, http_client: Client) -> Self {
        let sessions: Arc<dyn SessionApi> =
            match ReqwestSessionApi::new(http_client, config.api_base()) {
                Ok(api) => Arc::new(api.with_timeout(config.upstream_timeout())),
                Err(err) => {
                    error!(error = %err, api_base = config.api_base(), "invalid upstream base url");
                    Arc::new(UnavailableSessionApi::new(err.to_string()))
                }
            };
        Self {
            config: Arc::new(config),
            sessions,
        }
    }

    pub fn with_session_api(mut self, sessions: Arc<dyn SessionApi>) -> Self {
        self.sessions = sessions;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(SESSION_PATH, any(session_endpoint))
        .route(SESSION_ALIAS_PATH, any(session_endpoint))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
pub struct SessionCredential {
    pub client_secret: String,
}

async fn session_endpoint(State(state): State<AppState>, method: Method) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    if method != Method::POST {
        return reject(ExchangeError::MethodNotAllowed);
    }

    let span = info_span!("chatkit.exchange", action = "sessions.create");
    match exchange_session(&state).instrument(span).await {
        Ok(credential) => Json(credential).into_response(),
        Err(err) => reject(err),
    }
}

fn reject(err: ExchangeError) -> Response {
    let status = err.status();
    counter!("chatkit_session_errors_total", "kind" => err.kind()).increment(1);
    debug!(kind = %err.kind(), %status, "session exchange rejected");
    err.into_response()
}

/// Runs the POST flow: checks the configured key and session document in
/// order, calls the upstream once and relays only `client_secret`.
pub async fn exchange_session(state: &AppState) -> Result<SessionCredential, ExchangeError> {
    let config = state.config.as_ref();
    let api_key = config.api_key().ok_or_else(|| {
        error!("OPENAI_API_KEY is not configured");
        ExchangeError::MissingApiKey
    })?;
    let document = match config.session_config() {
        SessionConfigSetting::Valid(document) => document,
        SessionConfigSetting::Missing => {
            error!("CHATKIT_SESSION_CONFIG is not configured");
            return Err(ExchangeError::MissingSessionConfig);
        }
        SessionConfigSetting::Invalid(message) => {
            error!(%message, "CHATKIT_SESSION_CONFIG is not valid JSON");
            return Err(ExchangeError::InvalidSessionConfig(message.clone()));
        }
    };

    let reply = state
        .sessions
        .create_session(api_key, document)
        .await
        .map_err(|err| {
            warn!(error = %err, "session creation failed before reaching upstream");
            ExchangeError::Unexpected(unexpected(err))
        })?;

    if !reply.status.is_success() {
        warn!(status = %reply.status, "upstream rejected session creation");
        return Err(ExchangeError::Upstream {
            status: reply.status,
            details: reply.body,
        });
    }

    let client_secret = reply.client_secret().ok_or_else(|| {
        warn!(status = %reply.status, "upstream response had no client_secret");
        ExchangeError::MissingClientSecret
    })?;

    counter!("chatkit_sessions_created_total").increment(1);
    info!("issued chatkit client secret");
    Ok(SessionCredential {
        client_secret: client_secret.to_string(),
    })
}

fn unexpected(err: SessionApiError) -> anyhow::Error {
    match err {
        SessionApiError::Transport(source) => anyhow::Error::new(source),
        SessionApiError::Config(source) => source,
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "request handler panicked".to_string()
    };
    error!(%message, "session exchange handler panicked");
    counter!("chatkit_session_errors_total", "kind" => "panic").increment(1);
    ExchangeError::Unexpected(anyhow::anyhow!(message)).into_response()
}
