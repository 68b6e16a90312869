use std::sync::Arc;

use anyhow::Context;
use chatrelay::{AppState, Relay, config::Config, store::SqliteStore, telemetry};
use tracing::{info, info_span};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init()?;

    let config = Config::from_env().context("load configuration")?;

    let store = SqliteStore::connect(&config.database_url, config.db_max_connections)
        .await
        .with_context(|| format!("connect to {}", config.database_url))?;
    store.migrate().await.context("run migrations")?;

    let relay = Relay::new(Arc::new(store), info_span!("relay")).with_push_timeout(config.push_timeout);
    let app_state = AppState {
        relay: Arc::new(relay),
    };

    let app = chatrelay::app(app_state, &config.allow_origins);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "chat relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;

    info!("chat relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(%err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
