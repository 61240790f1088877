//! Credential exchange for embedded ChatKit sessions.
//!
//! The framed chat application POSTs here; the handler forwards the
//! server-configured session document to the upstream provider using the
//! long-lived API key and relays back only the short-lived `client_secret`.

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod http;

pub use client::{
    MockSessionApi, ReqwestSessionApi, SessionApi, SessionApiError, UnavailableSessionApi,
    UpstreamReply,
};
pub use config::{ExchangeConfig, SessionConfigSetting};
pub use crate::http::{
    AppState, SESSION_ALIAS_PATH, SESSION_PATH, SessionCredential, exchange_session, router,
};
pub use error::ExchangeError;
