//! HTTP surface: two listeners over one shared pool
//!
//! The public listener serves `/public`, `/health`, and `/db-health`;
//! the internal listener serves `/internal` and `/health`. Both share
//! one `AppState` and stop on the same shutdown signal. Every failure
//! is mapped to a structured JSON body at this boundary; a failed
//! request never takes a listener down.

use crate::api_models::{DbHealthResponse, EndpointResponse, ErrorResponse, HealthResponse};
use crate::config::Config;
use crate::db::executor::{BindValue, QueryExecutor};
use crate::db::pool::ConnectionPool;
use crate::error::{GatewayError, Result};
use crate::health::{ConnectionPoolHealth, DatabaseHealth};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Fixed query run by the tenant endpoints
const TENANT_QUERY: &str = "SELECT NOW() as current_time, $1 as tenant";

/// Fixed query run by the database health probe
const DB_HEALTH_QUERY: &str = "SELECT 1 as health_check, NOW() as db_time";

/// State shared by both listeners
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<QueryExecutor>,
    pub tenant: String,
}

impl AppState {
    pub fn new(pool: ConnectionPool, tenant: String) -> Self {
        Self {
            executor: Arc::new(QueryExecutor::new(pool)),
            tenant,
        }
    }
}

/// Request failure carrying the tenant tag for the error body
pub struct ApiError {
    error: GatewayError,
    tenant: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.error);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::from_error(&self.error, &self.tenant)),
        )
            .into_response()
    }
}

/// Router for the public listener
pub fn public_router(state: AppState) -> Router {
    Router::new()
        .route("/public", get(handle_public))
        .route("/health", get(handle_health))
        .route("/db-health", get(handle_db_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router for the internal listener
pub fn internal_router(state: AppState) -> Router {
    Router::new()
        .route("/internal", get(handle_internal))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_public(
    State(state): State<AppState>,
) -> std::result::Result<Json<EndpointResponse>, ApiError> {
    tenant_query(&state, "public").await
}

async fn handle_internal(
    State(state): State<AppState>,
) -> std::result::Result<Json<EndpointResponse>, ApiError> {
    tenant_query(&state, "internal").await
}

/// Run the fixed tenant query and shape the response
async fn tenant_query(
    state: &AppState,
    endpoint: &'static str,
) -> std::result::Result<Json<EndpointResponse>, ApiError> {
    let params = [BindValue::Text(state.tenant.clone())];

    let result = state
        .executor
        .execute(TENANT_QUERY, &params)
        .await
        .map_err(|error| ApiError {
            error,
            tenant: state.tenant.clone(),
        })?;

    let data = result
        .first_row()
        .cloned()
        .map(Value::Object)
        .unwrap_or(Value::Null);

    Ok(Json(EndpointResponse::success(&state.tenant, endpoint, data)))
}

/// Liveness probe; identical on both listeners and never touches the pool
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(&state.tenant))
}

/// Database probe: one round trip plus pool pressure
async fn handle_db_health(State(state): State<AppState>) -> Response {
    let started = Instant::now();

    match state.executor.execute(DB_HEALTH_QUERY, &[]).await {
        Ok(result) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            let pool = ConnectionPoolHealth::from_stats(&state.executor.pool().stats());
            let database = DatabaseHealth::evaluate(latency_ms, pool);
            let data = result.first_row().cloned().map(Value::Object);

            (
                StatusCode::OK,
                Json(DbHealthResponse::healthy(&state.tenant, data, database)),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Database health probe failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DbHealthResponse::unhealthy(&state.tenant, &e)),
            )
                .into_response()
        }
    }
}

/// Bind both listeners and serve until a termination signal arrives
///
/// On SIGTERM/Ctrl+C both listeners finish in-flight requests, then the
/// pool is drained before returning.
pub async fn serve(config: Config, pool: ConnectionPool) -> Result<()> {
    let state = AppState::new(pool.clone(), config.tenant.name.clone());

    let public_addr = format!("{}:{}", config.server.host, config.server.public_port);
    let internal_addr = format!("{}:{}", config.server.host, config.server.internal_port);

    let public_listener = TcpListener::bind(&public_addr).await?;
    let internal_listener = TcpListener::bind(&internal_addr).await?;
    info!(tenant = %state.tenant, "Public listener on {}", public_addr);
    info!(tenant = %state.tenant, "Internal listener on {}", internal_addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let public_server = axum::serve(public_listener, public_router(state.clone()))
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let internal_server = axum::serve(internal_listener, internal_router(state))
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    tokio::try_join!(public_server, internal_server)?;

    info!("Listeners stopped, draining connection pool");
    pool.close().await;

    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // Either the flag flips or the sender is gone; both mean stop.
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Wait for a termination signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting shutdown");
        }
    }
}
