use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use haul_core::{JobView, SubmitReceipt, SweepReport};

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SubmitDownloadRequest {
    /// Media URL to acquire
    pub url: String,
    /// One of 360p, 480p, 720p, 1080p, 1440p, best (default: 720p)
    pub quality: Option<String>,
    /// "single" or "collection" (default: single)
    pub grouping: Option<String>,
    /// Reject URLs of unrecognised providers (falls back to HAUL_STRICT_PROVIDERS)
    pub strict: Option<bool>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SubmitDownloadResponse {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

impl From<SubmitReceipt> for SubmitDownloadResponse {
    fn from(receipt: SubmitReceipt) -> Self {
        Self {
            job_id: receipt.job_id,
            status: receipt.state.to_string(),
            message: receipt.message,
            expires_at: receipt.expires_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DownloadResponse {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
    pub url: String,
    pub provider: String,
    pub quality: String,
    pub grouping: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub filename: Option<String>,
    pub size_bytes: Option<u64>,
    pub title: Option<String>,
    pub duration_secs: Option<u64>,
    pub format: Option<String>,
    pub thumbnail: Option<String>,
    pub source_url: Option<String>,
    /// Failure category, e.g. VIDEO_NOT_FOUND
    pub error_category: Option<String>,
    pub suggestion: Option<String>,
}

impl From<JobView> for DownloadResponse {
    fn from(view: JobView) -> Self {
        Self {
            job_id: view.job_id,
            status: view.state.to_string(),
            message: view.message,
            url: view.url,
            provider: view.provider.to_string(),
            quality: view.quality.to_string(),
            grouping: view.grouping.to_string(),
            created_at: view.created_at,
            expires_at: view.expires_at,
            completed_at: view.completed_at,
            filename: view.filename,
            size_bytes: view.size_bytes,
            title: view.title,
            duration_secs: view.duration_secs,
            format: view.format,
            thumbnail: view.thumbnail,
            source_url: view.source_url,
            error_category: view.error_category.map(|c| c.as_str().to_string()),
            suggestion: view.suggestion,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListDownloadsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DownloadListResponse {
    pub downloads: Vec<DownloadResponse>,
    /// Jobs matching the filter, before `limit` is applied.
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CredentialUploadResponse {
    pub provider: String,
    pub file_name: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CleanupResponse {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub jobs_cleaned_up: usize,
    pub records_expired: usize,
    pub errors: usize,
}

impl From<SweepReport> for CleanupResponse {
    fn from(report: SweepReport) -> Self {
        Self {
            files_deleted: report.files_deleted,
            bytes_freed: report.bytes_freed,
            jobs_cleaned_up: report.jobs_cleaned_up,
            records_expired: report.records_expired,
            errors: report.errors,
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub downloads_dir: &'static str,
    pub sweeper_running: bool,
    pub current_files: usize,
    pub total_jobs: usize,
    pub in_flight: usize,
    pub retention_hours: i64,
    pub sweep_interval_minutes: u64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
