mod config;

use anyhow::Result;
use axum::serve;
use chatkit_exchange::{AppState, router};
use chatkit_telemetry::install as init_telemetry;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry("chatkit-session-server")?;

    let config = ServerConfig::load();
    for warning in config.warnings() {
        warn!("{warning}");
    }
    info!(exchange = ?config.exchange, "exchange configuration loaded");

    let state = AppState::new(config.exchange.clone(), reqwest::Client::new());
    let app = router(state);
    let listener = TcpListener::bind(config.addr).await?;
    info!("chatkit-session-server listening on {}", config.addr);

    serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
