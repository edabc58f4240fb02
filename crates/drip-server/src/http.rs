//! HTTP API surface.
//!
//! The route table is a thin layer over [`FaucetState`]: withdrawal requests
//! are validated, submitted to the queue, and the handler awaits the
//! per-request result handle. All backpressure and ordering behavior lives in
//! [`crate::withdraw`], not here.

use crate::{
    config::DripConfig,
    error::{ApiError, SubmitError},
    state::FaucetState,
    withdraw::{WithdrawalOutcome, WithdrawalRequest},
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Response after an accepted withdrawal
#[derive(Debug, Serialize)]
pub struct WithdrawResponse {
    pub message: String,
    pub transaction_id: String,
    pub amount: i64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub wallet_id: String,
    pub queue_capacity: usize,
    pub withdrawal_count: u64,
    pub total_withdrawn: i64,
    pub wallet_balance: i64,
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<FaucetState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/withdraw", post(withdraw))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Root endpoint - provides basic information
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Drip Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /withdraw": "Request a withdrawal to an address (provide address)",
            "GET /health": "Health check",
        }
    }))
}

/// Health check endpoint
async fn health(State(state): State<Arc<FaucetState>>) -> Json<HealthResponse> {
    let snapshot = state.metrics.snapshot();

    Json(HealthResponse {
        status: "healthy".to_string(),
        wallet_id: state.wallet.handle.wallet_id.to_string(),
        queue_capacity: state.queue.capacity(),
        withdrawal_count: snapshot.withdrawal_count,
        total_withdrawn: snapshot.total_withdrawn,
        wallet_balance: snapshot.wallet_balance,
    })
}

/// Submit a withdrawal and wait for its outcome
async fn withdraw(
    State(state): State<Arc<FaucetState>>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<Json<WithdrawResponse>, ApiError> {
    if request.address.trim().is_empty() {
        return Err(ApiError::InvalidAddress("address is empty".to_string()));
    }

    info!(address = %request.address, "withdrawal requested");

    let handle = state.queue.submit(request).map_err(|e| match e {
        SubmitError::QueueFull => ApiError::Unavailable,
        SubmitError::WorkerGone => ApiError::Internal(e.to_string()),
    })?;

    match handle.await {
        Ok(WithdrawalOutcome::Success(tx)) => Ok(Json(WithdrawResponse {
            message: format!("Withdrawal of {} submitted as {}", tx.amount, tx.id),
            transaction_id: tx.id,
            amount: tx.amount,
        })),
        Ok(WithdrawalOutcome::Failure(reason)) => Err(ApiError::WithdrawalFailed(reason)),
        Err(_) => Err(ApiError::Internal(
            "worker dropped the result channel".to_string(),
        )),
    }
}

/// Bind and serve the API for the process lifetime
pub async fn start_server(config: &DripConfig, state: Arc<FaucetState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let bind_addr = format!("{}:{}", config.http.bind_address, config.http.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

    info!("Drip server listening on {}", bind_addr);
    info!("Endpoints:");
    info!("  GET  /          - Server information");
    info!("  GET  /health    - Health check");
    info!("  POST /withdraw  - Submit a withdrawal");

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
