use std::path::PathBuf;

use eventgate::config::Configuration;
use eventgate::{app, initialize_state, telemetry};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Read configuration file.
    let mut config = Configuration::default();
    if let Ok(path) = std::env::var("EVENTGATE_CONFIG") {
        config = config.path(PathBuf::from(path));
    }
    let config = config.read()?;

    // Set logger with tracing.
    telemetry::setup_tracing(&config.telemetry)?;
    match config.source() {
        Some(path) => tracing::info!(path = %path.display(), "read configuration"),
        None => tracing::warn!("no configuration file, using defaults"),
    }

    let mut state = initialize_state(config.clone());
    if config.telemetry.prometheus {
        state = state.with_metrics(telemetry::setup_metrics_recorder()?);
    }

    let port = match std::env::var("PORT") {
        Ok(port) => Some(port.parse::<u16>()?),
        Err(_) => None,
    };
    let addr = config.socket_addr(port)?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        name = %config.name,
        version = env!("CARGO_PKG_VERSION"),
        "server listening on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("received Ctrl+C, shutting down");
        })
        .await?;

    Ok(())
}
