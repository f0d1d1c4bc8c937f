//! HTTP server for the transcription API
//!
//! Provides /version, /health, /user, /transcribe, /jobs, /jobs/{job_id},
//! /stats and /clear-cache. The job routes sit behind a version gate that
//! rejects callers declaring a different `X-API-Version` with
//! 426 Upgrade Required.

use crate::capabilities::demo_input;
use crate::error::ServiceError;
use crate::service::TranscriptionService;
use crate::types::{
    ClearCacheResponse, ErrorResponse, HealthResponse, ServiceStats, TranscriptionJobResponse,
    TranscriptionStatusResponse, UserResponse, VersionResponse,
};
use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub const API_VERSION_HEADER: &str = "x-api-version";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared state for the HTTP server
pub struct ServerState {
    pub service: TranscriptionService,
    pub cors_origins: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(service: TranscriptionService, cors_origins: Vec<String>) -> Self {
        Self {
            service,
            cors_origins,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// A service error rendered with the server version
struct ApiError {
    version: String,
    error: ServiceError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.error, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                version: self.version,
                detail: self.error.to_string(),
            }),
        )
            .into_response()
    }
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    let gated = Router::new()
        .route("/transcribe", post(start_transcription))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{job_id}", get(get_job))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            verify_version,
        ));

    Router::new()
        .route("/version", get(version))
        .route("/health", get(health))
        .route("/user", get(get_user))
        .route("/stats", get(stats))
        .route("/clear-cache", post(clear_cache))
        .merge(gated)
        .layer(middleware::map_response_with_state(
            state.clone(),
            add_version_header,
        ))
        .layer(cors_layer(&state.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
            .expose_headers([header::HeaderName::from_static(API_VERSION_HEADER)])
    }
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Reject requests whose declared version differs from ours
async fn verify_version(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let client_version = header_value(request.headers(), API_VERSION_HEADER);

    match state.service.check_version(client_version) {
        Ok(()) => next.run(request).await,
        Err(error) => ApiError {
            version: state.service.version().to_string(),
            error,
        }
        .into_response(),
    }
}

async fn add_version_header(State(state): State<SharedState>, mut response: Response) -> Response {
    if let Ok(value) = HeaderValue::from_str(state.service.version()) {
        response.headers_mut().insert(API_VERSION_HEADER, value);
    }
    response
}

async fn version(State(state): State<SharedState>) -> Json<VersionResponse> {
    info!(version = %state.service.version(), "Version requested");
    Json(VersionResponse {
        version: state.service.version().to_string(),
    })
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.service.version().to_string(),
        uptime_secs,
    })
}

async fn get_user(State(state): State<SharedState>, headers: HeaderMap) -> Json<UserResponse> {
    let user_id = state
        .service
        .get_user(header_value(&headers, USER_ID_HEADER))
        .await;

    Json(UserResponse {
        version: state.service.version().to_string(),
        user_id,
    })
}

/// Submit a job. The request body is the raw input; an empty body
/// submits a demo input.
async fn start_transcription(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<TranscriptionJobResponse> {
    let input = if body.is_empty() {
        demo_input()
    } else {
        body.to_vec()
    };

    let submitted = state
        .service
        .submit(header_value(&headers, USER_ID_HEADER), input)
        .await;

    Json(TranscriptionJobResponse {
        version: state.service.version().to_string(),
        job_id: submitted.job_id,
        status: submitted.status,
    })
}

async fn get_job(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TranscriptionStatusResponse>, ApiError> {
    let version = state.service.version().to_string();

    match state
        .service
        .get_job(&job_id, header_value(&headers, USER_ID_HEADER))
        .await
    {
        Ok(job) => Ok(Json(TranscriptionStatusResponse { version, job })),
        Err(error) => Err(ApiError { version, error }),
    }
}

async fn list_jobs(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Json<Vec<TranscriptionStatusResponse>> {
    let version = state.service.version();
    let jobs = state
        .service
        .list_jobs(header_value(&headers, USER_ID_HEADER))
        .await
        .into_iter()
        .map(|job| TranscriptionStatusResponse {
            version: version.to_string(),
            job,
        })
        .collect();

    Json(jobs)
}

async fn stats(State(state): State<SharedState>) -> Json<ServiceStats> {
    info!("Cache statistics requested");
    Json(state.service.cache_stats().await)
}

async fn clear_cache(State(state): State<SharedState>) -> Json<ClearCacheResponse> {
    state.service.clear_caches().await;

    Json(ClearCacheResponse {
        status: "success".to_string(),
        message: "All caches cleared".to_string(),
    })
}
