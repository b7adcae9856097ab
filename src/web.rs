//
// web.rs
// PDT-Tools-rs
//
// Axum-based HTTP server exposing the treatment dosimetry and fluorescence analysis APIs.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt::Display;
use std::net::SocketAddr;

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::{
    dosimetry,
    error::ValidationError,
    fluorescence,
    models::{FluorescenceRequest, FluorescenceResponse, TreatmentRequest, TreatmentResponse},
};

/// Error body is always `{"msg": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    msg: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "msg": self.msg }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        warn!(error = %err, "Rejected request");
        bad_request(err)
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Routes without the listener, so tests can drive them directly.
pub fn router() -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/treatment/calculate", post(treatment_handler))
        .route("/api/analysis/fluorescence", post(fluorescence_handler))
        .layer(CorsLayer::permissive())
}

/// Bootstraps the Axum HTTP server and wires up API routes.
pub async fn start_server(host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;
    Ok(())
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// An empty body is treated as `{}` so it fails on missing parameters, not on syntax.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

async fn treatment_handler(body: Bytes) -> ApiResult<Json<TreatmentResponse>> {
    let request: TreatmentRequest = parse_body(&body)?;
    let response = dosimetry::calculate_treatment(&request)?;

    debug!(?response, "Treatment calculated");
    info!(
        photosensitizer = request.photosensitizer.as_deref().unwrap_or_default(),
        tissue_type = request.tissue_type.as_deref().unwrap_or_default(),
        is_safe = response.safety_thresholds.is_safe,
        "Treatment calculation served"
    );
    Ok(Json(response))
}

async fn fluorescence_handler(body: Bytes) -> ApiResult<Json<FluorescenceResponse>> {
    let request: FluorescenceRequest = parse_body(&body)?;

    // Full-image samples can be large; keep them off the async workers.
    let response = tokio::task::spawn_blocking(move || fluorescence::analyze_fluorescence(&request))
        .await
        .map_err(internal_error)??;

    info!(
        pixels = response.pre_treatment.pixel_count,
        compared = response.comparison.is_some(),
        "Fluorescence analysis served"
    );
    Ok(Json(response))
}

fn bad_request<E: Display>(err: E) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        msg: err.to_string(),
    }
}

fn internal_error<E: Display>(err: E) -> ApiError {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        msg: err.to_string(),
    }
}
