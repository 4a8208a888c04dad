//! prompt-match server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints, the
//! background discovery worker and the cleanup timer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use prompt_match::api;
use prompt_match::app_state::AppState;
use prompt_match::config::{LogFormat, MatchConfig};
use prompt_match::domain::{ConnectionRegistry, NotificationDispatcher};
use prompt_match::persistence::Stores;
use prompt_match::persistence::memory::MemoryStore;
use prompt_match::persistence::postgres::PostgresStore;
use prompt_match::service::{DiscoveryQueue, MatchService, tasks};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = MatchConfig::from_env().context("invalid LISTEN_ADDR")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting prompt-match");

    // Build persistence layer
    let stores = if config.persistence_enabled {
        let store = PostgresStore::connect(
            &config.database_url,
            config.database_max_connections,
            config.database_min_connections,
            Duration::from_secs(config.database_connect_timeout_secs),
        )
        .await
        .context("connecting to PostgreSQL")?;
        store.migrate().await.context("running migrations")?;
        tracing::info!("using PostgreSQL store");
        Stores::from_backend(Arc::new(store))
    } else {
        tracing::warn!("persistence disabled, using in-memory store");
        Stores::from_backend(Arc::new(MemoryStore::new()))
    };

    // Build domain + service layer
    let registry = Arc::new(ConnectionRegistry::new(config.notification_buffer));
    let service = Arc::new(MatchService::new(
        stores,
        NotificationDispatcher::new(registry),
        config.policy,
    ));

    // Background work
    let (discovery, _worker) =
        DiscoveryQueue::spawn(Arc::clone(&service), config.discovery_queue_capacity);
    let _cleanup = tasks::spawn_cleanup_timer(
        Arc::clone(&service),
        Duration::from_secs(config.cleanup_interval_secs),
    );

    // Build router
    let app = api::build_app(AppState::new(service, discovery))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
