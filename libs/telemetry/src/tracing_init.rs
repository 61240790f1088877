use once_cell::sync::OnceCell;

use anyhow::Result;
use tracing_subscriber::layer::Layer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, TelemetryConfig};

static INIT: OnceCell<()> = OnceCell::new();

/// Installs the global subscriber once; later calls are no-ops.
pub fn init_telemetry(cfg: TelemetryConfig) -> Result<()> {
    INIT.get_or_try_init(|| init_tracing(&cfg))?;
    Ok(())
}

fn init_tracing(cfg: &TelemetryConfig) -> Result<()> {
    let fmt_layer = match cfg.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.default_directive.as_str()));

    // A subscriber installed by the host (tests, embedding binaries) wins.
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .ok();

    tracing::info!(
        service = %cfg.service_name,
        version = %cfg.service_version,
        "telemetry initialised"
    );
    Ok(())
}
