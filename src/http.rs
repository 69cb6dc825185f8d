//! HTTP API boundary.
//!
//! Two thin endpoints: start a run, fetch its report. Validation and
//! forwarding only; all real work happens in the pipeline stages.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::artifacts::{names, FinalReport};
use crate::event::Event;
use crate::router::EventRouter;
use crate::store::{get_artifact, put_artifact, TraceStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TraceStore>,
    pub pipeline: Arc<EventRouter>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("report not found for trace: {0}")]
    ReportNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ReportNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (code, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/research", post(start_research))
        .route("/report", get(get_report))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    seed_topic: String,
}

#[derive(Debug, Serialize)]
struct StartResponse {
    trace_id: String,
}

async fn start_research(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    if request.seed_topic.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "seed_topic must be a non-empty string".to_string(),
        ));
    }

    let trace_id = Uuid::new_v4().to_string();

    // The topic is stored exactly as submitted so the final report
    // echoes it back verbatim, and it must be durable before the
    // first event fires.
    put_artifact(
        state.store.as_ref(),
        &trace_id,
        names::SEED_TOPIC,
        &request.seed_topic,
    )
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(trace_id = %trace_id, topic = %request.seed_topic, "starting research run");

    let pipeline = state.pipeline.clone();
    let initial = Event::TopicSeeded {
        trace_id: trace_id.clone(),
    };
    tokio::spawn(async move {
        pipeline.run(initial).await;
    });

    Ok(Json(StartResponse { trace_id }))
}

#[derive(Debug, Deserialize)]
struct ReportParams {
    trace_id: String,
}

async fn get_report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<FinalReport>, ApiError> {
    match get_artifact::<FinalReport>(state.store.as_ref(), &params.trace_id, names::FINAL_REPORT)
        .await
    {
        Ok(Some(report)) => Ok(Json(report)),
        // Still running, or an identifier we never issued: the caller
        // only sees absence either way.
        Ok(None) => Err(ApiError::ReportNotFound(params.trace_id)),
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}
