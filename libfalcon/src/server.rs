//! HTTP API
//!
//! - `GET /health`: liveness, version and per-platform health checks
//! - `GET /config`: which platforms are configured
//! - `POST /publish`: dispatch a message and return the aggregated result
//!
//! Validation failures answer `400` with `{"error": <kind>, "message": ...}`.
//! Per-platform failures are not HTTP errors: `/publish` answers `200` with
//! the dispatch result, whose `success` flag tells whether every target
//! accepted the message.

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::error::ValidationError;
use crate::types::{DispatchResult, PlatformId, PublishRequest};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// Wire shape of `POST /publish`
#[derive(Debug, Deserialize)]
pub struct PublishPayload {
    #[serde(default, alias = "text")]
    pub message: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Base64-encoded image bytes
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub targets: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl PublishPayload {
    /// Decode into a transport-neutral request
    ///
    /// Blank `image_url` or `image_data` fields count as absent.
    pub fn into_request(self) -> Result<PublishRequest, ApiError> {
        let image_url = self.image_url.filter(|url| !url.trim().is_empty());
        let image_data = match self.image_data.filter(|data| !data.trim().is_empty()) {
            Some(encoded) => Some(
                base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| ApiError::InvalidImageData(e.to_string()))?,
            ),
            None => None,
        };

        Ok(PublishRequest {
            text: self.message,
            image_url,
            image_data,
            targets: self.targets,
            metadata: self.metadata,
        })
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("image_data is not valid base64: {0}")]
    InvalidImageData(String),

    #[error("Malformed request body: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(e) => e.kind(),
            ApiError::InvalidImageData(_) => "invalid_image_data",
            ApiError::BadRequest(_) => "invalid_request",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("Rejected publish request: {}", self);
        let body = ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    configured_targets: Vec<PlatformId>,
    target_status: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct ConfigResponse {
    bluesky_configured: bool,
    discord_configured: bool,
    configured_targets: Vec<PlatformId>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.dispatcher().registry();
    let target_status = registry
        .health_check_all()
        .await
        .into_iter()
        .map(|(id, healthy)| (id.to_string(), serde_json::Value::Bool(healthy)))
        .collect();

    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        configured_targets: registry.configured_targets(),
        target_status,
    })
}

async fn config_status(State(state): State<AppState>) -> Json<ConfigResponse> {
    let registry = state.dispatcher().registry();
    Json(ConfigResponse {
        bluesky_configured: registry.is_configured(PlatformId::Bluesky),
        discord_configured: registry.is_configured(PlatformId::Discord),
        configured_targets: registry.configured_targets(),
    })
}

async fn publish(
    State(state): State<AppState>,
    payload: Result<Json<PublishPayload>, JsonRejection>,
) -> Result<Json<DispatchResult>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let request = payload.into_request()?;
    let result = state.dispatcher().dispatch(request).await?;
    Ok(Json(result))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config", get(config_status))
        .route("/publish", post(publish))
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Falcon Messenger listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
