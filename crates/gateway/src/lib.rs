//! HTTP API gateway for Delve.
//!
//! Accepts research requests, hands them to the background task manager
//! and lets clients poll for status and results.
//!
//! Built on Axum.

pub mod events;
pub mod research;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use delve_agent::AgentSettings;
use delve_core::event::EventBus;
use delve_tasks::{AgentExecutor, InMemoryTaskStore, TaskManager, TaskManagerConfig};

pub use research::{GatewayState, SharedState};

/// Largest accepted request body.
const BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Build the router with all routes and layers.
///
/// CORS is fully permissive; the API carries no credentials.
pub fn build_router(state: SharedState) -> Router {
    research::research_router(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and run until Ctrl-C.
///
/// Running tasks are interrupted on shutdown and recorded as failed.
pub async fn start(config: delve_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = delve_providers::router::build_from_config(&config)
        .default()
        .ok_or_else(|| format!("No provider named '{}' could be built", config.default_provider))?;

    let settings = AgentSettings::from_config(&config);
    tokio::fs::create_dir_all(&settings.reports_dir).await?;

    let events = Arc::new(EventBus::default());
    let event_log = events::spawn_event_logger(&events);
    let executor = AgentExecutor::new(provider, settings).with_event_bus(Arc::clone(&events));
    let tasks = Arc::new(TaskManager::new(
        Arc::new(InMemoryTaskStore::new()),
        Arc::new(executor),
        events,
        TaskManagerConfig::from(&config.gateway),
    ));

    let state = Arc::new(GatewayState {
        tasks: Arc::clone(&tasks),
    });
    let app = build_router(state);

    info!(addr = %addr, model = %config.default_model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    tasks.shutdown().await;
    event_log.abort();
    info!("Gateway stopped");
    Ok(())
}
