//! Logging setup for ChatKit embed services, driven by `RUST_LOG` and
//! `LOG_FORMAT`.

use anyhow::Result;

mod config;
mod tracing_init;

pub use config::{LogFormat, TelemetryConfig};
pub use tracing_init::init_telemetry;

/// Installs the shared subscriber configured from the environment.
pub fn install(service_name: &str) -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(
        service_name,
        env!("CARGO_PKG_VERSION"),
    ))
}
