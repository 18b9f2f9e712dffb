//! HTTP server: GitHub webhook receiver and JSON read API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/webhook` | GitHub push deliveries |
//! | `GET`  | `/api/repos` | Registered repositories |
//! | `POST` | `/api/repos` | Register a repository (and its webhook) |
//! | `GET`  | `/api/events/{owner}/{repo}` | 50 most recent events of a repository |
//! | `GET`  | `/api/all-events` | 100 most recent events across repositories |
//! | `GET`  | `/api/commit/{owner}/{repo}/{sha}` | Full stored commit record |
//! | `GET`  | `/api/file/{owner}/{repo}/{sha}?path=` | File content at a commit |
//! | `GET`  | `/api/compare/{owner}/{repo}/{sha}?path=` | File before/after a commit |
//! | `GET`  | `/api/report/{owner}/{repo}` | Evolution report |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "commit record not found: acme/widgets@abc" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `already_exists` / `cycle_detected` / `depth_exceeded` (409),
//! `upstream_error` (502), `internal` (500).
//!
//! # Webhook
//!
//! When `WEBHOOK_SECRET` is set, deliveries without a valid
//! `X-Hub-Signature-256` are rejected with 401. Every other delivery is
//! acknowledged with 200, including non-push events and malformed payloads,
//! so GitHub never retries them.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use commit_chronicle_core::error::ChronicleError;
use commit_chronicle_core::evolution::{build_report, EvolutionReport};
use commit_chronicle_core::host::CommitHost;
use commit_chronicle_core::ingest::{ingest_push, IngestSummary};
use commit_chronicle_core::models::{CommitRecord, EventSummary, RepoName, Repository};
use commit_chronicle_core::push::PushEvent;
use commit_chronicle_core::reconstruct::{FileComparison, Reconstructor, ResolvedContent};
use commit_chronicle_core::store::CommitStore;

use crate::config::{self, Config};
use crate::github::GitHubClient;
use crate::repos::{register_repository, Registration};
use crate::sqlite_store;
use crate::webhook::{verify_signature, EVENT_HEADER, SIGNATURE_HEADER};

const REPO_EVENTS_LIMIT: usize = 50;
const ALL_EVENTS_LIMIT: usize = 100;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<dyn CommitStore>,
    host: Arc<dyn CommitHost>,
    webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn CommitStore>,
        host: Arc<dyn CommitHost>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            host,
            webhook_secret: webhook_secret.map(Arc::from),
        }
    }
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind`, backed by the SQLite store and the GitHub
/// client. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn CommitStore> = Arc::new(sqlite_store::open(config).await?);
    let host: Arc<dyn CommitHost> =
        Arc::new(GitHubClient::new(&config.github, config::github_token())?);
    let secret = config::webhook_secret();
    if secret.is_none() {
        warn!("WEBHOOK_SECRET not set; webhook deliveries will not be verified");
    }

    let bind_addr = config.server.bind.clone();
    let app = build_router(AppState::new(config.clone(), store, host, secret));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    println!("Commit Chronicle listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble the router with CORS enabled for all origins.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/webhook", post(handle_webhook))
        .route("/api/repos", get(handle_list_repos).post(handle_add_repo))
        .route("/api/events/{owner}/{repo}", get(handle_events))
        .route("/api/all-events", get(handle_all_events))
        .route("/api/commit/{owner}/{repo}/{sha}", get(handle_commit))
        .route("/api/file/{owner}/{repo}/{sha}", get(handle_file))
        .route("/api/compare/{owner}/{repo}/{sha}", get(handle_compare))
        .route("/api/report/{owner}/{repo}", get(handle_report))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

impl From<ChronicleError> for AppError {
    fn from(err: ChronicleError) -> Self {
        let message = err.to_string();
        match err {
            ChronicleError::RecordNotFound { .. } | ChronicleError::CommitNotFound { .. } => {
                not_found(message)
            }
            ChronicleError::CycleDetected { .. } => {
                AppError::new(StatusCode::CONFLICT, "cycle_detected", message)
            }
            ChronicleError::DepthExceeded { .. } => {
                AppError::new(StatusCode::CONFLICT, "depth_exceeded", message)
            }
            ChronicleError::MalformedPayload(_) => bad_request(message),
            ChronicleError::RemoteFetchFailure(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "upstream_error", message)
            }
            ChronicleError::Store(e) => e.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        warn!(error = %err, "internal error");
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", format!("{:#}", err))
    }
}

fn repo_name(owner: &str, repo: &str) -> Result<RepoName, AppError> {
    if owner.is_empty() || repo.is_empty() {
        return Err(bad_request("owner and repo must not be empty"));
    }
    Ok(RepoName::new(owner, repo))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /webhook ============

/// Acknowledgement body for webhook deliveries.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum WebhookAck {
    Ignored { event: String },
    Malformed { reason: String },
    Processed(IngestSummary),
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    if let Some(secret) = &state.webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if !verify_signature(secret.as_bytes(), &body, signature) {
            warn!("rejected webhook delivery with invalid signature");
            return Err(AppError::new(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "invalid webhook signature",
            ));
        }
    }

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if event != "push" {
        info!(event = %event, "ignored webhook event");
        return Ok(Json(WebhookAck::Ignored { event }));
    }

    let push = match PushEvent::from_slice(&body) {
        Ok(push) => push,
        Err(e) => {
            warn!(error = %e, "dropping malformed push payload");
            return Ok(Json(WebhookAck::Malformed {
                reason: e.to_string(),
            }));
        }
    };

    let summary = ingest_push(state.host.as_ref(), state.store.as_ref(), &push).await?;
    Ok(Json(WebhookAck::Processed(summary)))
}

// ============ /api/repos ============

#[derive(Serialize)]
struct RepoView {
    full_name: String,
    owner: String,
    repo_name: String,
    repo_url: String,
    webhook_id: Option<i64>,
    webhook_active: bool,
    created_at: DateTime<Utc>,
}

impl From<Repository> for RepoView {
    fn from(r: Repository) -> Self {
        Self {
            full_name: r.repo.full_name(),
            owner: r.repo.owner,
            repo_name: r.repo.name,
            repo_url: r.repo_url,
            webhook_active: r.webhook_id.is_some(),
            webhook_id: r.webhook_id,
            created_at: r.created_at,
        }
    }
}

async fn handle_list_repos(State(state): State<AppState>) -> Result<Json<Vec<RepoView>>, AppError> {
    let repos = state.store.list_repositories().await?;
    Ok(Json(repos.into_iter().map(RepoView::from).collect()))
}

#[derive(Deserialize)]
struct AddRepoRequest {
    repo_url: String,
}

async fn handle_add_repo(
    State(state): State<AppState>,
    Json(req): Json<AddRepoRequest>,
) -> Result<(StatusCode, Json<RepoView>), AppError> {
    let repo = RepoName::from_url(&req.repo_url)
        .ok_or_else(|| bad_request(format!("not a repository URL: {}", req.repo_url)))?;

    let webhook_url = state.config.server.webhook_url();
    if webhook_url.is_none() {
        warn!(repo = %repo, "server.public_url not set; skipping webhook registration");
    }

    match register_repository(
        state.store.as_ref(),
        state.host.as_ref(),
        repo,
        &req.repo_url,
        webhook_url.as_deref(),
        state.webhook_secret.as_deref(),
    )
    .await?
    {
        Registration::Added(repository) => Ok((StatusCode::CREATED, Json(repository.into()))),
        Registration::AlreadyExists(repo) => Err(AppError::new(
            StatusCode::CONFLICT,
            "already_exists",
            format!("repository already added: {}", repo),
        )),
    }
}

// ============ Event feeds ============

async fn handle_events(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<Vec<EventSummary>>, AppError> {
    let repo = repo_name(&owner, &repo)?;
    Ok(Json(state.store.recent_events(&repo, REPO_EVENTS_LIMIT).await?))
}

async fn handle_all_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventSummary>>, AppError> {
    Ok(Json(state.store.all_recent_events(ALL_EVENTS_LIMIT).await?))
}

async fn handle_commit(
    State(state): State<AppState>,
    Path((owner, repo, sha)): Path<(String, String, String)>,
) -> Result<Json<CommitRecord>, AppError> {
    let repo = repo_name(&owner, &repo)?;
    let record = state
        .store
        .get_record(&repo, &sha)
        .await?
        .ok_or_else(|| not_found(format!("commit not found: {}@{}", repo, sha)))?;
    Ok(Json(record))
}

// ============ Reconstruction ============

#[derive(Deserialize)]
struct FileQuery {
    path: Option<String>,
}

impl FileQuery {
    fn require_path(self) -> Result<String, AppError> {
        self.path
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| bad_request("query parameter 'path' is required"))
    }
}

#[derive(Serialize)]
struct FileResponse {
    filename: String,
    commit_sha: String,
    #[serde(flatten)]
    resolved: ResolvedContent,
}

async fn handle_file(
    State(state): State<AppState>,
    Path((owner, repo, sha)): Path<(String, String, String)>,
    Query(query): Query<FileQuery>,
) -> Result<Json<FileResponse>, AppError> {
    let repo = repo_name(&owner, &repo)?;
    let path = query.require_path()?;
    let resolved = Reconstructor::new(state.store.as_ref())
        .with_max_depth(state.config.reconstruction.max_depth)
        .get_file_at_commit(&repo, &sha, &path)
        .await?
        .ok_or_else(|| not_found(format!("{} does not exist at {}", path, sha)))?;
    Ok(Json(FileResponse {
        filename: path,
        commit_sha: sha,
        resolved,
    }))
}

async fn handle_compare(
    State(state): State<AppState>,
    Path((owner, repo, sha)): Path<(String, String, String)>,
    Query(query): Query<FileQuery>,
) -> Result<Json<FileComparison>, AppError> {
    let repo = repo_name(&owner, &repo)?;
    let path = query.require_path()?;
    let comparison = Reconstructor::new(state.store.as_ref())
        .with_max_depth(state.config.reconstruction.max_depth)
        .get_file_comparison(&repo, &sha, &path)
        .await?;
    Ok(Json(comparison))
}

// ============ Evolution ============

async fn handle_report(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<EvolutionReport>, AppError> {
    let repo = repo_name(&owner, &repo)?;
    let records = state.store.list_records(&repo).await?;
    if records.is_empty() {
        return Err(not_found(format!("no commits found for {}", repo)));
    }
    // Similarity scoring is CPU-bound; keep it off the async workers.
    let report = tokio::task::spawn_blocking(move || build_report(&repo, &records))
        .await
        .map_err(|e| anyhow::anyhow!("report task failed: {}", e))?;
    Ok(Json(report))
}
