//! HTTP handlers for subscribe, poll and publish.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use longpoll_core::{ClientId, HubError, PollOutcome, SweepReport};
use longpoll_telemetry::MetricsRecorder;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::health::{self, HealthResponse, StatsResponse};
use crate::server::AppState;

/// Error surfaced to HTTP callers as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Hub(HubError),
    BadRequest(String),
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self::Hub(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Hub(HubError::MissingClientId) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Hub(HubError::ClientNotFound) => StatusCode::NOT_FOUND,
            Self::Hub(HubError::MailboxFull) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Hub(err) => err.to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

/// `POST /publish/{clientId}` body.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub message: String,
}

impl PublishRequest {
    /// Parse and validate a raw body. `message` is required and non-empty.
    pub fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        let req: Self = serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;
        if req.message.is_empty() {
            return Err(ApiError::BadRequest("message is required".into()));
        }
        Ok(req)
    }
}

/// GET /subscribe/{clientId}
pub async fn subscribe_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id = ClientId::parse(raw_id)?;
    if state.hub.subscribe(&client_id) {
        record_clients_active(&state);
    }
    Ok(Json(json!({ "clientId": client_id })))
}

/// GET /poll/{clientId}
///
/// Holds the request until an event arrives, the poll timeout elapses, the
/// client is evicted, or the server starts shutting down.
pub async fn poll_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let client_id = ClientId::parse(raw_id)?;
    let started = Instant::now();

    let outcome = tokio::select! {
        outcome = state.hub.poll(&client_id) => outcome,
        () = state.shutdown.cancelled() => PollOutcome::TimedOut,
    };

    record_clients_active(&state);
    state
        .metrics
        .counter_inc("polls_total", &[("outcome", outcome.as_str())], 1);
    state.metrics.histogram_observe(
        "poll_wait_ms",
        &[],
        started.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(match outcome {
        PollOutcome::Delivered(event) => {
            tracing::debug!(client_id = %client_id, "Event delivered");
            (StatusCode::OK, Json(event)).into_response()
        }
        PollOutcome::TimedOut | PollOutcome::Evicted => StatusCode::NO_CONTENT.into_response(),
    })
}

/// POST /publish/{clientId}
pub async fn publish_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let result = ClientId::parse(raw_id)
        .map_err(ApiError::from)
        .and_then(|id| PublishRequest::from_body(&body).map(|req| (id, req)))
        .and_then(|(id, req)| {
            state
                .hub
                .publish(&id, req.message)
                .map_err(ApiError::from)
                .map(|_| id)
        });

    match result {
        Ok(client_id) => {
            state
                .metrics
                .counter_inc("publish_total", &[("result", "accepted")], 1);
            tracing::debug!(client_id = %client_id, "Event published");
            Ok(Json(json!({ "message": "Event published." })))
        }
        Err(err) => {
            let label = match &err {
                ApiError::Hub(hub) => hub.error_kind(),
                ApiError::BadRequest(_) => "bad_request",
            };
            state
                .metrics
                .counter_inc("publish_total", &[("result", label)], 1);
            Err(err)
        }
    }
}

/// GET /poll and /publish without an id.
pub async fn missing_client_id() -> ApiError {
    ApiError::Hub(HubError::MissingClientId)
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.registry().len(),
    ))
}

/// GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let registry = state.hub.registry();
    Json(StatsResponse {
        uptime_secs: state.start_time.elapsed().as_secs(),
        clients: registry.len(),
        clients_evicted_total: registry.evicted_total(),
        metrics: state.metrics.snapshot(),
    })
}

fn record_clients_active(state: &AppState) {
    state
        .metrics
        .gauge_set("clients_active", &[], state.hub.registry().len() as f64);
}

/// Sweeper callback: count evictions and refresh the client gauge.
pub fn record_sweep(metrics: &MetricsRecorder, report: SweepReport) {
    metrics.counter_inc("clients_evicted_total", &[], report.removed as u64);
    metrics.gauge_set("clients_active", &[], report.remaining as f64);
}
