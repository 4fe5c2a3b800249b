use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use parley_api::AppStateInner;
use parley_db::Database;
use parley_gateway::{ConnectionRegistry, Dispatcher};
use parley_server::config::Config;
use parley_server::{GatewayState, app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parley=debug,parley_server=debug,parley_gateway=debug,parley_api=debug,parley_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // An unreachable store is fatal, never run degraded
    let db = Arc::new(
        Database::open(&config.db_path)
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );

    let dispatcher = Dispatcher::new(ConnectionRegistry::new(), db.clone(), config.delivery);
    let app_state = AppStateInner::new(db.clone(), db);
    let gateway = GatewayState::new(
        dispatcher,
        &config.cors_origin,
        config.jwt_secret.as_deref(),
    );

    let app = app(app_state, gateway);

    let addr = config.bind_addr().await?;
    info!("Parley server listening on {}", addr);
    info!(
        "Delivery mode: {:?}, gateway origin: {}, token verification: {}",
        config.delivery,
        config.cors_origin,
        if config.jwt_secret.is_some() { "on" } else { "off" }
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
