//! Server assembly: store, roster, engine, escalation sweep, and the axum
//! router, wired from a [`SluiceConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::SluiceConfig;
use crate::workorder::api::{self, AppState};
use crate::workorder::clock::{SystemClock, UuidIdGenerator};
use crate::workorder::engine::WorkOrderEngine;
use crate::workorder::escalation::TimeoutEscalationScheduler;
use crate::workorder::events::{BroadcastEventSink, DomainEvent};
use crate::workorder::roster::SqliteRoster;
use crate::workorder::store::{DbHandle, WorkOrderDb};

/// Build the application router over shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router().with_state(state)
}

/// Start the API server and, when enabled, the escalation sweep.
pub async fn start_server(config: SluiceConfig) -> Result<()> {
    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let db = WorkOrderDb::new(&config.database.path)
        .context("Failed to initialize workorder database")?;
    let store = DbHandle::new(db);
    let roster = Arc::new(
        SqliteRoster::open(&config.database.path).context("Failed to open roster connection")?,
    );

    // Downstream consumers (push delivery, dashboards) subscribe to the
    // receiving side; the engine publishes fire-and-forget.
    let (events_tx, _events_rx) = broadcast::channel::<DomainEvent>(256);
    let events = Arc::new(BroadcastEventSink::new(events_tx));

    let clock = Arc::new(SystemClock);
    let engine = Arc::new(WorkOrderEngine::new(
        store.clone(),
        roster.clone(),
        events,
        clock.clone(),
        Arc::new(UuidIdGenerator),
    ));

    let escalation = config.escalation.to_escalation_config();
    if config.escalation.enabled {
        let scheduler = TimeoutEscalationScheduler::new(
            engine.clone(),
            roster.clone(),
            clock.clone(),
            escalation.clone(),
        );
        tokio::spawn(scheduler.run());
        info!(
            interval_secs = escalation.sweep_interval_secs,
            deadline_hours = escalation.deadline_hours,
            "escalation sweep started"
        );
    }

    let state = Arc::new(AppState {
        engine,
        store,
        clock,
        escalation,
    });

    let mut app = build_router(state);
    if config.server.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(addr = %listener.local_addr()?, "sluice API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
