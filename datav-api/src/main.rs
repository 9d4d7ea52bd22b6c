//! # datav API Server
//!
//! Serves dashboard and team lifecycle endpoints over PostgreSQL.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/datav JWT_SECRET=... cargo run -p datav-api
//! ```

use datav_api::{
    app::{build_router, AppState},
    config::Config,
};
use datav_shared::db::{migrations, pool};
use datav_shared::history::HistoryRecorder;
use datav_shared::store::{PgStore, Store};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datav_api=debug,datav_shared=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("datav API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let db = pool::create_pool(config.pool_config()).await?;
    migrations::run_migrations(&db).await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(db.clone()));
    let (history, history_task) =
        HistoryRecorder::spawn(store.clone(), config.core.history.queue_capacity);

    let state = AppState::new(store, history, &config.core, config.jwt.secret.clone())
        .with_pool(db.clone())
        .with_cors_origins(config.api.cors_origins.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!("Server listening on http://{}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // the router owned the last producers; the consumer drains and exits
    if let Err(e) = history_task.await {
        tracing::error!(error = %e, "History consumer failed");
    }
    pool::close_pool(db).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
