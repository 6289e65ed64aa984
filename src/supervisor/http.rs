//! The supervisor's HTTP control surface: spawn/pause/resume/kill a job's
//! worker process and read back its status.
//!
//! Grounded on the axum router/middleware idiom already used for the crawl
//! worker's result-ingestion client.

use crate::error::SupervisorError;
use crate::model::{Job, WorkerRecord};
use crate::supervisor::process::ProcessManager;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ProcessManager>,
    pub api_key: Option<String>,
}

#[must_use]
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/spawn", post(spawn))
        .route("/pause/:job_id", post(pause))
        .route("/resume/:job_id", post(resume))
        .route("/kill/:job_id", post(kill))
        .route("/status/:job_id", get(status))
        .route("/jobs", get(jobs))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

async fn require_bearer(State(state): State<AppState>, request: axum::extract::Request, next: Next) -> Result<Response, ApiError> {
    let Some(expected) = &state.api_key else {
        return Ok(next.run(request).await);
    };
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if provided == Some(expected.as_str()) {
        Ok(next.run(request).await)
    } else {
        Err(ApiError(SupervisorError::Unauthorized))
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn spawn(State(state): State<AppState>, Json(job): Json<Job>) -> Result<Json<SpawnResponse>, ApiError> {
    state.manager.spawn(&job)?;
    Ok(Json(SpawnResponse { job_id: job.id }))
}

async fn pause(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<StatusCode, ApiError> {
    state.manager.pause(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn resume(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<StatusCode, ApiError> {
    state.manager.resume(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn kill(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<StatusCode, ApiError> {
    state.manager.kill(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn status(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<Json<StatusResponse>, ApiError> {
    let (record, log_tail) = state.manager.status(&job_id).await?;
    Ok(Json(StatusResponse { record, log_tail }))
}

async fn jobs(State(state): State<AppState>) -> Json<Vec<WorkerRecord>> {
    Json(state.manager.list().await)
}

#[derive(Serialize)]
struct SpawnResponse {
    job_id: String,
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    record: WorkerRecord,
    log_tail: Vec<String>,
}

struct ApiError(SupervisorError);

impl From<SupervisorError> for ApiError {
    fn from(err: SupervisorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            SupervisorError::Unauthorized => StatusCode::UNAUTHORIZED,
            SupervisorError::NotFound(_) => StatusCode::NOT_FOUND,
            SupervisorError::AlreadyTracked(_) | SupervisorError::NotRunning(_) | SupervisorError::NotPaused(_) | SupervisorError::AlreadyTerminal(_) => {
                StatusCode::CONFLICT
            }
            SupervisorError::SpawnFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let state = AppState { manager: Arc::new(ProcessManager::new("/bin/true".into(), "https://api.example.com".into(), None)), api_key: None };
        let app = router(state);
        let response = app
            .oneshot(axum::http::Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
