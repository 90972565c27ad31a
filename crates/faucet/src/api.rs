//! HTTP API for faucet service

use crate::error::FaucetError;
use crate::service::{FaucetRequest, FaucetResponse, FaucetService, FaucetStatus};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::{debug, error};

/// Faucet handler: `POST /` with `{"chain-id": ..., "address": ...}`
pub async fn faucet_handler(
    State(service): State<Arc<FaucetService>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<FaucetResponse>), FaucetError> {
    let request = match parse_request(body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Rejected faucet request: {}", e);
            service.metrics().record_outcome(e.kind());
            return Err(e);
        }
    };
    debug!("Faucet request for {} on {}", request.address, request.chain_id);

    let response = service.dispense(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

fn parse_request(body: Result<Bytes, BytesRejection>) -> Result<FaucetRequest, FaucetError> {
    let body = body.map_err(|e| FaucetError::BodyUnreadable(e.body_text()))?;
    serde_json::from_slice(&body).map_err(|e| FaucetError::MalformedRequest(e.to_string()))
}

/// Status handler
pub async fn status_handler(State(service): State<Arc<FaucetService>>) -> Json<FaucetStatus> {
    Json(service.status().await)
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Prometheus metrics handler
pub async fn metrics_handler(State(service): State<Arc<FaucetService>>) -> Result<String, StatusCode> {
    match service.metrics().gather() {
        Ok(text) => Ok(text),
        Err(err) => {
            error!("Failed to gather metrics: {}", err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Build the faucet router
pub fn router(service: Arc<FaucetService>) -> Router {
    let mut app = Router::new()
        .route("/", post(faucet_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler));

    if service.config().metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.with_state(service)
}
