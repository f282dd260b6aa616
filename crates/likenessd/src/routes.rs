use crate::dto::{self, PredictRequest, PredictResponse};
use crate::engine::{EngineError, EngineHandle};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use likeness_core::ImageRequest;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::Instrument;
use uuid::Uuid;

/// Multipart field carrying the uploaded photo.
const UPLOAD_FIELD: &str = "image";

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub status: Arc<ServiceStatus>,
}

/// Snapshot of what was loaded at startup.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub version: &'static str,
    pub age_model_loaded: bool,
    pub similarity_model_loaded: bool,
    pub gallery_root: String,
}

/// Build all routes for the API.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/age", post(predict_age))
        .route("/api/age/upload", post(upload_age))
        .route("/api/similarity", post(predict_similarity))
        .route("/api/similarity/upload", post(upload_similarity))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        // Static front ends call the API from another origin.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn request_span(service: &'static str) -> tracing::Span {
    tracing::info_span!("predict", service, request_id = %Uuid::new_v4())
}

fn engine_unavailable(e: EngineError) -> StatusCode {
    tracing::error!(error = %e, "inference engine unavailable");
    StatusCode::SERVICE_UNAVAILABLE
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus::clone(&state.status))
}

async fn predict_age(
    State(state): State<AppState>,
    Json(body): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, StatusCode> {
    run_age(&state, body.into_image_request()).await
}

async fn upload_age(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PredictResponse>, StatusCode> {
    let request = read_upload(multipart).await?;
    run_age(&state, request).await
}

async fn predict_similarity(
    State(state): State<AppState>,
    Json(body): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, StatusCode> {
    run_similarity(&state, body.into_image_request()).await
}

async fn upload_similarity(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PredictResponse>, StatusCode> {
    let request = read_upload(multipart).await?;
    run_similarity(&state, request).await
}

async fn run_age(
    state: &AppState,
    request: ImageRequest,
) -> Result<Json<PredictResponse>, StatusCode> {
    let reply = state
        .engine
        .predict_age(request)
        .instrument(request_span("age"))
        .await
        .map_err(engine_unavailable)?;
    Ok(Json(PredictResponse::single(dto::age_json(reply))))
}

async fn run_similarity(
    state: &AppState,
    request: ImageRequest,
) -> Result<Json<PredictResponse>, StatusCode> {
    let reply = state
        .engine
        .find_lookalikes(request)
        .instrument(request_span("similarity"))
        .await
        .map_err(engine_unavailable)?;
    // PNG encoding is CPU-bound; keep it off the async workers.
    let value = tokio::task::spawn_blocking(move || dto::similarity_json(reply))
        .await
        .map_err(blocking_failed)?
        .map_err(|e| {
            tracing::error!(error = %e, "failed to encode gallery images");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(PredictResponse::single(value)))
}

fn blocking_failed(e: tokio::task::JoinError) -> StatusCode {
    tracing::error!(error = %e, "blocking task failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Extract the uploaded photo from a multipart form.
///
/// A form without an `image` field (or with an empty one) is "no input".
/// Bytes that do not decode as an image are rejected before reaching a service.
async fn read_upload(mut multipart: Multipart) -> Result<ImageRequest, StatusCode> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!(error = %e, "malformed multipart body");
        StatusCode::BAD_REQUEST
    })? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let bytes = field.bytes().await.map_err(|e| {
            tracing::warn!(error = %e, "failed to read upload");
            StatusCode::BAD_REQUEST
        })?;
        if bytes.is_empty() {
            return Ok(ImageRequest::Empty);
        }
        let size = bytes.len();
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(blocking_failed)?
            .map_err(|e| {
                tracing::warn!(error = %e, size, "upload is not a decodable image");
                StatusCode::BAD_REQUEST
            })?;
        return Ok(ImageRequest::Decoded(image));
    }
    Ok(ImageRequest::Empty)
}
