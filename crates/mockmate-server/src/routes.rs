//! # HTTP Routes
//!
//! Streaming endpoints answer with the channel producer's frames as an
//! `text/event-stream` body. Their synchronous twins run the same turn and
//! answer with one [`TurnOutcome`] JSON object. Domain failures on the
//! synchronous side map to `{"detail": message}` with the error's status.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use mockmate_core::{AnswerTurn, DomainError, SessionId, StartInterview, TurnOutcome, TurnRequest};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::health::{self, HealthResponse};
use crate::metrics::SYNC_TURNS_TOTAL;
use crate::producer::ChannelProducer;
use crate::sessions::{HistoryItem, SessionCollaborator, SessionDetail};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Turn driver for both streaming and synchronous endpoints.
    pub producer: ChannelProducer,
    /// When the server started.
    pub start_time: Instant,
    /// Name of the text generator in use.
    pub generator_name: Arc<str>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    fn sessions(&self) -> &Arc<dyn SessionCollaborator> {
        self.producer.sessions()
    }
}

/// A [`DomainError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        warn!(kind = self.0.kind(), status = status.as_u16(), error = %self.0, "request failed");
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

/// Body of `POST /api/interview/end`.
#[derive(Debug, Deserialize)]
pub struct EndRequest {
    /// Session to end.
    pub session_id: SessionId,
}

/// Query of `GET /api/interview/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Owner of the sessions.
    #[serde(default)]
    pub user_id: Option<String>,
}

fn event_stream(state: &AppState, request: TurnRequest) -> Response {
    let body = Body::from_stream(state.producer.frames(request).map(Ok::<_, Infallible>));
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response()
}

async fn sync_turn(state: &AppState, request: TurnRequest) -> Result<Json<TurnOutcome>, ApiError> {
    match state.producer.respond_sync(&request).await {
        Ok(outcome) => {
            metrics::counter!(SYNC_TURNS_TOTAL, "outcome" => "ok").increment(1);
            Ok(Json(outcome))
        }
        Err(e) => {
            metrics::counter!(SYNC_TURNS_TOTAL, "outcome" => e.kind()).increment(1);
            Err(e.into())
        }
    }
}

/// POST /api/interview/start
pub async fn start_stream(State(state): State<AppState>, Json(body): Json<StartInterview>) -> Response {
    event_stream(&state, TurnRequest::Start(body))
}

/// POST /api/interview/start/sync
pub async fn start_sync(
    State(state): State<AppState>,
    Json(body): Json<StartInterview>,
) -> Result<Json<TurnOutcome>, ApiError> {
    sync_turn(&state, TurnRequest::Start(body)).await
}

/// POST /api/interview/respond-stream
pub async fn respond_stream(State(state): State<AppState>, Json(body): Json<AnswerTurn>) -> Response {
    event_stream(&state, TurnRequest::Answer(body))
}

/// POST /api/interview/respond
pub async fn respond_sync(
    State(state): State<AppState>,
    Json(body): Json<AnswerTurn>,
) -> Result<Json<TurnOutcome>, ApiError> {
    sync_turn(&state, TurnRequest::Answer(body)).await
}

/// POST /api/interview/end
pub async fn end_interview(
    State(state): State<AppState>,
    Json(body): Json<EndRequest>,
) -> Result<Json<Value>, ApiError> {
    let feedback = state.sessions().end(&body.session_id).await?;
    info!(session_id = %body.session_id, "interview ended");
    Ok(Json(json!({ "final_feedback": feedback })))
}

/// GET /api/interview/history?user_id=
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryItem>>, ApiError> {
    let user_id = query
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| DomainError::InvalidRequest("user_id is required".into()))?;
    Ok(Json(state.sessions().history(&user_id).await))
}

/// GET /api/interview/session/{id}
pub async fn session_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetail>, ApiError> {
    let detail = state.sessions().detail(&SessionId::from_raw(id)).await?;
    Ok(Json(detail))
}

/// GET /api/health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.sessions().active_count(),
        &state.generator_name,
    ))
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
