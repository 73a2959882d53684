use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{RecommendRequest, Track, UpdateModelRequest},
    services::{dataset, recommender::Recommendation},
};

use super::{
    extract::{AppJson, OptionalJson},
    state::ModelSummary,
    AppState,
};

/// Message returned when the queried artist/track pair is not in the dataset
pub const SONG_NOT_FOUND: &str = "Song not found in the model.";

// Request/Response types

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Track>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub model_version: Option<u64>,
    pub model_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ModelResponse {
    pub model_version: u64,
    pub model_date: DateTime<Utc>,
    pub dataset_id: String,
    pub rule_count: usize,
}

impl From<&ModelSummary> for ModelResponse {
    fn from(summary: &ModelSummary) -> Self {
        Self {
            model_version: summary.record.version,
            model_date: summary.record.created_at,
            dataset_id: summary.dataset_id.clone(),
            rule_count: summary.rule_count,
        }
    }
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Recommends tracks that co-occur with the queried one
///
/// An unknown track is a normal response carrying an error message, not a failure status.
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    AppJson(request): AppJson<RecommendRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let query = request.into_query()?;

    tracing::info!(
        request_id = %request_id,
        artist_name = %query.artist_name,
        track_name = %query.track_name,
        "Processing recommendation request"
    );

    let snapshot = state.snapshot().await;
    let outcome =
        snapshot
            .recommender
            .recommend(&snapshot.catalog, &query.artist_name, &query.track_name);

    let (recommendations, error) = match outcome {
        Recommendation::Found(tracks) => {
            tracing::info!(
                request_id = %request_id,
                count = tracks.len(),
                "Recommendations found"
            );
            (Some(tracks), None)
        }
        Recommendation::NotFound => {
            tracing::info!(request_id = %request_id, "Queried track not in dataset");
            (None, Some(SONG_NOT_FOUND.to_string()))
        }
    };

    let version = snapshot.version();
    Ok(Json(RecommendationResponse {
        recommendations,
        error,
        model_version: version.map(|r| r.version),
        model_date: version.map(|r| r.created_at),
    }))
}

/// Mines a new model from the requested (or default) dataset and starts serving it
///
/// An empty body selects the default dataset; a malformed one is rejected.
pub async fn update_model(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    OptionalJson(request): OptionalJson<UpdateModelRequest>,
) -> AppResult<Json<ModelResponse>> {
    let request = request.unwrap_or_default();

    tracing::info!(
        request_id = %request_id,
        dataset_id = ?request.dataset_id,
        "Processing model update request"
    );

    let summary = state.update_model(request.dataset_id.as_deref()).await?;

    tracing::info!(
        request_id = %request_id,
        version = summary.record.version,
        "Model update completed"
    );

    Ok(Json(ModelResponse::from(&summary)))
}

/// Lists every track in the reference file
pub async fn list_tracks(State(state): State<AppState>) -> AppResult<Json<Vec<Track>>> {
    let tracks = dataset::load_track_list(state.tracks_path()).await?;
    Ok(Json(tracks))
}

/// Reports the version of the model being served
pub async fn model_info(State(state): State<AppState>) -> AppResult<Json<ModelResponse>> {
    let snapshot = state.snapshot().await;
    snapshot
        .model
        .as_ref()
        .map(|summary| Json(ModelResponse::from(summary)))
        .ok_or_else(|| AppError::NotFound("No model has been mined yet".to_string()))
}
