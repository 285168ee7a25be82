// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! API server
//!
//! Exposes the download pipeline over HTTP.
//!
//! # Endpoints
//!
//! - `GET /download` - Run a download job and stream or report the artifact
//! - `GET /health` - Health check (downloader availability, storage headroom)
//!
//! # Example
//!
//! ```no_run
//! use ripserve::server::Server;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = Server::new(3000);
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::trace::TraceLayer;

use crate::config::ToolPaths;
use crate::fetch::{DownloadJob, Fetcher};
use crate::storage::{self, StorageRoot};
use crate::types::MediaFormat;

/// Server state shared across handlers.
pub struct AppState {
    /// Download pipeline driver.
    pub fetcher: Fetcher,
    /// Storage root the retention subsystem watches.
    pub storage: StorageRoot,
}

/// API server configuration.
#[derive(Debug)]
pub struct Server {
    /// Port to listen on.
    port: u16,
    /// Address to bind to (defaults to 127.0.0.1 for security).
    bind_address: String,
    /// Base downloads directory.
    storage_root: PathBuf,
    /// External tool locations.
    tools: ToolPaths,
}

impl Default for Server {
    fn default() -> Self {
        Self::new(3000)
    }
}

impl Server {
    /// Create a new server with the specified port.
    /// By default, binds to 127.0.0.1 (localhost only) for security.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            bind_address: "127.0.0.1".to_string(),
            storage_root: PathBuf::from("downloads"),
            tools: ToolPaths::default(),
        }
    }

    /// Set the bind address.
    /// Use "0.0.0.0" to allow network access, "127.0.0.1" (default) for localhost only.
    pub fn with_bind_address(mut self, addr: impl Into<String>) -> Self {
        self.bind_address = addr.into();
        self
    }

    /// Set the base downloads directory.
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    /// Set the external tool locations.
    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    /// Build the router with all routes.
    pub fn build_router(&self) -> Router {
        let state = Arc::new(AppState {
            fetcher: Fetcher::new(self.tools.clone()),
            storage: StorageRoot::new(&self.storage_root),
        });

        // Rate limiting: downloads are expensive, so keep bursts modest.
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(1)
                .burst_size(30)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .expect("Failed to build governor config"),
        );

        Router::new()
            .route("/download", get(download_handler))
            .route("/health", get(health_handler))
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http())
            .layer(GovernorLayer {
                config: governor_conf,
            })
            .with_state(state)
    }

    /// Start the server with graceful shutdown.
    pub async fn start(&self) -> Result<()> {
        let router = self.build_router();
        let addr = format!("{}:{}", self.bind_address, self.port);

        tracing::info!("Starting server on {}", addr);

        // Security warning if binding to all interfaces
        if self.bind_address == "0.0.0.0" {
            tracing::warn!(
                "Server is binding to 0.0.0.0 which exposes the download endpoint to the network. \
                Use 127.0.0.1 (default) for local-only access."
            );
        }

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                anyhow::anyhow!(
                    "Port {} is already in use. This usually means another ripserve instance \
                    is running. Try stopping other instances or use a different port with --port",
                    self.port
                )
            } else {
                anyhow::anyhow!("Failed to bind to {}: {}", addr, e)
            }
        })?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    /// Get the port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters accepted by the download endpoint.
#[derive(Deserialize)]
struct DownloadParams {
    url: Option<String>,
    format: Option<String>,
    /// Truthy: deliver the artifact as an attachment.
    dl: Option<String>,
    /// Truthy: deliver the artifact inline for playback.
    play: Option<String>,
}

/// Generic error payload.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Status payload for a finished job when no streaming was requested (or no
/// path could be resolved).
#[derive(Serialize)]
struct DownloadReport {
    success: bool,
    format: &'static str,
    output_dir: String,
    file_path: Option<String>,
    finished_at: String,
    stdout: String,
    stderr: String,
}

/// Status payload for a job whose external tool exited non-zero. Both
/// captured streams are surfaced verbatim so the failure can be diagnosed
/// without server access.
#[derive(Serialize)]
struct FailureReport {
    success: bool,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: &'static str,
    downloader: String,
    free_ratio: Option<f64>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Download handler.
///
/// Validates parameters, runs a retention pass, drives one job through the
/// external tool, and renders the outcome as a stream or a status payload.
async fn download_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> Response {
    let format = match params.format.as_deref() {
        None => MediaFormat::Video,
        Some(raw) => match MediaFormat::from_param(raw) {
            Some(format) => format,
            None => return bad_request("format must be mp3 or mp4"),
        },
    };

    let url = match params.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => return bad_request("query param \"url\" is required"),
    };

    let want_attachment = truthy(params.dl.as_deref());
    let want_inline = truthy(params.play.as_deref());

    // Make room before taking on new bytes. Internal retention failures
    // never block the job.
    storage::reclaim(&state.storage);

    let job = DownloadJob::new(url, format, &state.storage);
    let outcome = match state.fetcher.run(&job).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(%err, "could not launch the downloader");
            return internal_error("could not launch the downloader");
        }
    };

    if !outcome.success() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(FailureReport {
                success: false,
                exit_code: outcome.exit_code,
                stdout: outcome.stdout,
                stderr: outcome.stderr,
            }),
        )
            .into_response();
    }

    if want_attachment || want_inline {
        if let Some(path) = &outcome.resolved_path {
            match stream_artifact(path, format, want_attachment).await {
                Ok(response) => return response,
                Err(err) => {
                    tracing::error!(path = %path.display(), %err, "resolved artifact could not be read");
                    return internal_error("downloaded file could not be read");
                }
            }
        }
        // Fall through to the status payload: the job succeeded but the
        // tool never announced where the artifact went.
    }

    (
        StatusCode::OK,
        Json(DownloadReport {
            success: true,
            format: format.as_str(),
            output_dir: job.target_dir.display().to_string(),
            file_path: outcome.resolved_path.map(|p| p.display().to_string()),
            finished_at: chrono::Utc::now().to_rfc3339(),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        }),
    )
        .into_response()
}

/// Health check handler.
///
/// Checks if the downloader runs at all and reports current storage
/// headroom when the volume is readable.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let downloader = if state.fetcher.probe().await {
        "ok".to_string()
    } else {
        "unavailable".to_string()
    };

    let free_ratio = storage::usage::probe(state.storage.base()).map(|u| u.free_ratio());

    let status = if downloader == "ok" {
        "ok".to_string()
    } else {
        "degraded".to_string()
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        downloader,
        free_ratio,
    })
}

async fn not_found_handler() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "not found".to_string(),
        }),
    )
        .into_response()
}

// =============================================================================
// Utilities
// =============================================================================

/// Flag parameters are truthy when present and not "0"/"false".
fn truthy(value: Option<&str>) -> bool {
    match value {
        Some(v) => !v.is_empty() && v != "0" && v != "false",
        None => false,
    }
}

/// Stream a resolved artifact back to the requester.
///
/// Fails with the underlying I/O error when the file is missing or
/// unreadable; the caller maps that to a terminal error response.
async fn stream_artifact(
    path: &Path,
    format: MediaFormat,
    as_attachment: bool,
) -> std::io::Result<Response> {
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    if as_attachment {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Ok(value) =
            HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((StatusCode::OK, headers, body).into_response())
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn internal_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    // On Unix, listen for SIGINT and SIGTERM
    // On Windows, fall back to Ctrl+C only
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
    }

    tracing::info!("Shutting down server; in-flight jobs are abandoned");
}
