use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use chrono::Utc;
use tokio_util::io::ReaderStream;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use haul_core::{AppError, GroupingMode, JobState, Provider, Quality, SubmitRequest};

use crate::auth::require_admin_token;
use crate::dto::{
    CleanupResponse, CredentialUploadResponse, DownloadListResponse, DownloadResponse,
    HealthResponse, ListDownloadsQuery, SubmitDownloadRequest, SubmitDownloadResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Largest accepted credential upload.
const MAX_CREDENTIAL_BYTES: usize = 1024 * 1024;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/v1/credentials/{provider}", put(upload_credential))
        .route("/v1/cleanup", post(run_cleanup))
        .layer(RequestBodyLimitLayer::new(MAX_CREDENTIAL_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ));

    let downloads = Router::new()
        .route("/v1/downloads", post(submit_download).get(list_downloads))
        .route("/v1/downloads/{id}", get(get_download))
        .route("/v1/downloads/{id}/file", get(download_file));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(downloads).merge(admin).with_state(state)
}

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/downloads",
    request_body = SubmitDownloadRequest,
    responses(
        (status = 202, description = "Download accepted", body = SubmitDownloadResponse),
        (status = 400, description = "Invalid URL or unsupported provider", body = crate::dto::ErrorResponse),
    ),
    tag = "downloads"
)]
pub async fn submit_download(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<SubmitDownloadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let quality = body
        .quality
        .as_deref()
        .map(str::parse::<Quality>)
        .transpose()
        .map_err(AppError::InvalidInput)?
        .unwrap_or_default();
    let grouping = body
        .grouping
        .as_deref()
        .map(str::parse::<GroupingMode>)
        .transpose()
        .map_err(AppError::InvalidInput)?
        .unwrap_or_default();

    let mut request = SubmitRequest::new(body.url)
        .with_quality(quality)
        .with_grouping(grouping);
    if let Some(strict) = body.strict {
        request = request.with_strict(strict);
    }

    let receipt = state.orchestrator.submit(request).await?;

    Ok((
        StatusCode::ACCEPTED,
        axum::Json(SubmitDownloadResponse::from(receipt)),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/downloads",
    params(ListDownloadsQuery),
    responses(
        (status = 200, description = "Known downloads, newest first", body = DownloadListResponse),
        (status = 400, description = "Unknown status filter", body = crate::dto::ErrorResponse),
    ),
    tag = "downloads"
)]
pub async fn list_downloads(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDownloadsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status_filter = query
        .status
        .as_deref()
        .map(str::parse::<JobState>)
        .transpose()
        .map_err(AppError::InvalidInput)?;

    let limit = query.limit.unwrap_or(50).min(500);
    let matching: Vec<_> = state
        .orchestrator
        .list_jobs()
        .await?
        .into_iter()
        .filter(|view| status_filter.is_none_or(|s| view.state == s))
        .collect();
    let total = matching.len();
    let downloads = matching
        .into_iter()
        .take(limit)
        .map(DownloadResponse::from)
        .collect();

    Ok(axum::Json(DownloadListResponse { downloads, total }))
}

#[utoipa::path(
    get,
    path = "/v1/downloads/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Download status", body = DownloadResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
    ),
    tag = "downloads"
)]
pub async fn get_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.orchestrator.get_status(id).await?;
    Ok(axum::Json(DownloadResponse::from(view)))
}

#[utoipa::path(
    get,
    path = "/v1/downloads/{id}/file",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Artifact bytes, sent as an attachment"),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Download not completed yet", body = crate::dto::ErrorResponse),
        (status = 410, description = "Artifact expired and was removed", body = crate::dto::ErrorResponse),
    ),
    tag = "downloads"
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let artifact = state.orchestrator.fetch_artifact(id).await?;

    let headers = [
        (header::CONTENT_TYPE, content_type_for(&artifact.file_name).to_string()),
        (header::CONTENT_LENGTH, artifact.size.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                header_safe_file_name(&artifact.file_name)
            ),
        ),
    ];
    let body = Body::from_stream(ReaderStream::new(artifact.file));

    Ok((headers, body))
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "opus" | "ogg" => "audio/ogg",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn header_safe_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/v1/credentials/{provider}",
    params(
        ("provider" = String, Path, description = "Provider name, e.g. youtube")
    ),
    request_body(content = String, description = "Netscape cookie file", content_type = "text/plain"),
    responses(
        (status = 201, description = "Credential installed", body = CredentialUploadResponse),
        (status = 400, description = "Invalid cookie file or unsupported provider", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin endpoints disabled"),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn upload_credential(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let provider: Provider = provider
        .parse()
        .map_err(|_| AppError::UnsupportedProvider(provider.clone()))?;

    let path = state
        .orchestrator
        .credentials()
        .install(provider, &body)
        .await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let response = CredentialUploadResponse {
        provider: provider.to_string(),
        file_name,
        message: format!("Cookies for {provider} uploaded successfully"),
    };

    Ok((StatusCode::CREATED, axum::Json(response)))
}

#[utoipa::path(
    post,
    path = "/v1/cleanup",
    responses(
        (status = 200, description = "Sweep report", body = CleanupResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin endpoints disabled"),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn run_cleanup(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.sweeper.sweep(Utc::now()).await;
    tracing::info!(?report, "Manual cleanup completed");
    axum::Json(CleanupResponse::from(report))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dir_status = match state.orchestrator.artifacts().entries().await {
        Ok(_) => "ok",
        Err(_) => "error",
    };
    let stats = state.sweeper.stats().await;

    let status = if dir_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if dir_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        },
        downloads_dir: dir_status,
        sweeper_running: state.sweeper_running(),
        current_files: stats.current_files,
        total_jobs: stats.total_jobs,
        in_flight: state.orchestrator.in_flight(),
        retention_hours: stats.retention_hours,
        sweep_interval_minutes: stats.sweep_interval_minutes,
    };

    (status, axum::Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a_b.mp4"), "video/mp4");
        assert_eq!(content_type_for("A.WEBM"), "video/webm");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_header_safe_file_name() {
        assert_eq!(header_safe_file_name("my \"clip\".mp4"), "my _clip_.mp4");
        assert_eq!(header_safe_file_name("café.mp4"), "caf_.mp4");
    }
}
