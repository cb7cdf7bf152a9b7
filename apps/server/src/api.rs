//! HTTP surface: the synchronous generation trigger and the SSE progress
//! stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use repodocs_core::{DocsService, GenerateRequest};
use repodocs_jobs::JobEvent;
use repodocs_shared::{JobId, ProgressEvent, RepodocsError, UpstreamKind};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DocsService>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/docs/generate", post(generate))
        .route("/docs/generate-progress", get(generate_progress))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// POST /docs/generate
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    owner: String,
    repo: String,
    #[serde(default)]
    include_tests: bool,
}

/// Synchronous trigger: exactly one coordinator start per request,
/// keyed by the identity of its (owner, repo, credential) triple.
async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GenerateBody>,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "missing bearer credential");
    };

    let request = GenerateRequest {
        owner: body.owner,
        repo: body.repo,
        token,
        include_tests: body.include_tests,
    };

    match state.service.generate(request).await {
        Ok(docs) => Json(docs).into_response(),
        Err(err) => error_response(status_for(&err), &err.to_string()),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Map domain errors onto response statuses.
fn status_for(err: &RepodocsError) -> StatusCode {
    match err {
        RepodocsError::Validation { .. } => StatusCode::BAD_REQUEST,
        RepodocsError::Upstream { kind, .. } => match kind {
            UpstreamKind::NotFound => StatusCode::NOT_FOUND,
            UpstreamKind::Unauthorized => StatusCode::UNAUTHORIZED,
            UpstreamKind::Forbidden => StatusCode::FORBIDDEN,
            UpstreamKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            UpstreamKind::Other(_) => StatusCode::BAD_GATEWAY,
        },
        RepodocsError::CoordinatorTimeout => StatusCode::GATEWAY_TIMEOUT,
        RepodocsError::Synthesis { .. } | RepodocsError::Network(_) => StatusCode::BAD_GATEWAY,
        RepodocsError::Config { .. } | RepodocsError::Io { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

// ---------------------------------------------------------------------------
// GET /docs/generate-progress
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    owner: Option<String>,
    repo: Option<String>,
    token: Option<String>,
}

/// SSE progress stream keyed by the same identity the trigger uses.
///
/// Sends an immediate connected acknowledgment, then forwards progress
/// events, with periodic keep-alive comments. Disconnecting detaches the
/// subscription but never cancels the in-flight job.
async fn generate_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Response {
    let (Some(owner), Some(repo), Some(token)) = (query.owner, query.repo, query.token) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing parameters");
    };

    let job_id = JobId::derive(&owner, &repo, &token);
    info!(%job_id, "progress stream client connected");
    let rx = state.service.bus().subscribe(&job_id);

    Sse::new(progress_stream(job_id, rx))
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("heartbeat"),
        )
        .into_response()
}

fn progress_stream(
    job_id: JobId,
    mut rx: tokio::sync::broadcast::Receiver<JobEvent<repodocs_shared::GeneratedDocs>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let connected = ProgressEvent::new(Some(0), "Connected to progress stream");
        match serde_json::to_string(&connected) {
            Ok(json) => yield Ok(Event::default().data(json)),
            Err(e) => warn!(%job_id, error = %e, "failed to serialize connected event"),
        }

        loop {
            match rx.recv().await {
                Ok(JobEvent::Progress(event)) => match serde_json::to_string(&event) {
                    Ok(json) => yield Ok(Event::default().data(json)),
                    Err(e) => warn!(%job_id, error = %e, "failed to serialize progress event"),
                },
                // Terminal outcomes are delivered to coordinator waiters,
                // not to stream observers.
                Ok(JobEvent::Completed(_)) | Ok(JobEvent::Failed(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%job_id, skipped, "progress stream lagged");
                }
                Err(RecvError::Closed) => {
                    debug!(%job_id, "job channel closed, ending progress stream");
                    break;
                }
            }
        }
    }
}
