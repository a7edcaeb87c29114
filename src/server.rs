//! HTTP front end.
//!
//! Exposes forecasts and quotes as a JSON API for dashboards.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/quote/{company}` | Live price for a ticker or company URL |
//! | `POST` | `/index` | Build, load or rebuild the index for a company |
//! | `POST` | `/forecast` | Grounded answer plus live price |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `index_error` (409), `config_error` (500),
//! `internal` (500).
//!
//! # Concurrency
//!
//! Core calls block, so every one runs on `spawn_blocking`. The index
//! handle sits behind an `RwLock`: forecasts share a read guard's clone of
//! the handle, builds hold the write guard for the whole build.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::HarnessError;
use crate::index::IndexHandle;
use crate::models::{ForecastReport, MarketQuote};
use crate::pipeline::Harness;

#[derive(Clone)]
struct AppState {
    harness: Arc<Harness>,
    index: Arc<RwLock<Option<IndexHandle>>>,
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(harness: Harness) -> anyhow::Result<()> {
    let bind_addr = harness.config().server.bind.clone();
    let app = router(Arc::new(harness));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(harness: Arc<Harness>) -> Router {
    let state = AppState {
        harness,
        index: Arc::new(RwLock::new(None)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/quote/{company}", get(handle_quote))
        .route("/index", post(handle_index))
        .route("/forecast", post(handle_forecast))
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

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<HarnessError> for AppError {
    fn from(err: HarnessError) -> Self {
        let message = err.to_string();
        match err {
            HarnessError::EmptyQuestion => bad_request(message),
            HarnessError::IndexLoad(_) | HarnessError::Index(_) => AppError {
                status: StatusCode::CONFLICT,
                code: "index_error".to_string(),
                message,
            },
            HarnessError::Config(_) => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "config_error".to_string(),
                message,
            },
            HarnessError::Io(_) | HarnessError::Other(_) => internal(message),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        internal(format!("worker failed: {}", err))
    }
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

// ============ GET /quote/{company} ============

async fn handle_quote(
    State(state): State<AppState>,
    Path(company): Path<String>,
) -> Result<Json<MarketQuote>, AppError> {
    let harness = state.harness.clone();
    let quote = tokio::task::spawn_blocking(move || harness.quote(&company)).await?;
    Ok(Json(quote))
}

// ============ POST /index ============

#[derive(Deserialize)]
struct IndexRequest {
    company: String,
    #[serde(default)]
    rebuild: bool,
}

#[derive(Serialize)]
struct IndexResponse {
    entries: usize,
    empty: bool,
}

async fn handle_index(
    State(state): State<AppState>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, AppError> {
    if req.company.trim().is_empty() {
        return Err(bad_request("company must not be empty"));
    }

    let mut slot = state.index.write().await;
    let harness = state.harness.clone();
    let handle = tokio::task::spawn_blocking(move || {
        if req.rebuild {
            harness.discover_and_download(&req.company);
            harness.rebuild_index()
        } else {
            harness.build_or_load_index(&req.company)
        }
    })
    .await??;

    let response = IndexResponse {
        entries: handle.len(),
        empty: handle.is_empty(),
    };
    *slot = Some(handle);
    Ok(Json(response))
}

// ============ POST /forecast ============

#[derive(Deserialize)]
struct ForecastRequest {
    company: String,
    question: String,
}

async fn handle_forecast(
    State(state): State<AppState>,
    Json(req): Json<ForecastRequest>,
) -> Result<Json<ForecastReport>, AppError> {
    if req.company.trim().is_empty() {
        return Err(bad_request("company must not be empty"));
    }
    if req.question.trim().is_empty() {
        return Err(HarnessError::EmptyQuestion.into());
    }

    let handle = current_or_build(&state, &req.company).await?;
    let harness = state.harness.clone();
    let report = tokio::task::spawn_blocking(move || {
        harness.forecast(&req.company, &req.question, &handle)
    })
    .await??;
    Ok(Json(report))
}

/// The shared handle, building it under the write lock on first use.
async fn current_or_build(state: &AppState, company: &str) -> Result<IndexHandle, AppError> {
    if let Some(handle) = state.index.read().await.as_ref() {
        return Ok(handle.clone());
    }

    let mut slot = state.index.write().await;
    // Another request may have built it while we waited.
    if let Some(handle) = slot.as_ref() {
        return Ok(handle.clone());
    }
    let harness = state.harness.clone();
    let company = company.to_string();
    let handle =
        tokio::task::spawn_blocking(move || harness.build_or_load_index(&company)).await??;
    *slot = Some(handle.clone());
    Ok(handle)
}
