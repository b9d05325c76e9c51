use clap::Parser;
use powchain_core::CancelToken;
use powchain_node::{app, AppState, NodeConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = NodeConfig::parse();
    let addr = config.validate()?;
    let state = AppState::new(config)?;
    let shutdown = state.shutdown_token().clone();
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("powchain-node listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    info!("powchain-node stopped");
    Ok(())
}

/// Resolve on Ctrl-C and abort any mine still running.
async fn shutdown_signal(shutdown: CancelToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        // Without a signal handler, never trigger shutdown.
        std::future::pending::<()>().await;
    }
    info!("shutdown requested, aborting in-flight mining");
    shutdown.cancel();
}
