use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::failure::{ErrorCategory, FailureReport};
use crate::provider::Provider;

/// Lifecycle state of an acquisition job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Initiated,
    Processing,
    Completed,
    Failed,
    CleanedUp,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Initiated => "initiated",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::CleanedUp => "cleaned_up",
        }
    }

    /// Terminal for the worker: no further worker-driven transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::CleanedUp
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "initiated" => Ok(JobState::Initiated),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "cleaned_up" => Ok(JobState::CleanedUp),
            _ => Err(format!("Unknown job state: {}", s)),
        }
    }
}

/// Requested video quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "best")]
    Best,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::P360 => "360p",
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::P1440 => "1440p",
            Quality::Best => "best",
        }
    }

    /// Maximum height in pixels, or `None` for unconstrained best.
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Quality::P360 => Some(360),
            Quality::P480 => Some(480),
            Quality::P720 => Some(720),
            Quality::P1080 => Some(1080),
            Quality::P1440 => Some(1440),
            Quality::Best => None,
        }
    }

    /// Engine format selector: at most the requested height, mp4 preferred,
    /// degrading to whatever is best.
    pub fn format_selector(&self) -> String {
        match self.max_height() {
            None => "best[ext=mp4]/best".to_string(),
            Some(h) => format!(
                "best[ext=mp4][height<={h}]/best[ext=mp4]/mp4[height<={h}]/mp4/best[height<={h}]/best"
            ),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "360p" | "360" => Ok(Quality::P360),
            "480p" | "480" => Ok(Quality::P480),
            "720p" | "720" => Ok(Quality::P720),
            "1080p" | "1080" => Ok(Quality::P1080),
            "1440p" | "1440" => Ok(Quality::P1440),
            "best" => Ok(Quality::Best),
            _ => Err(format!("Unknown quality: {}", s)),
        }
    }
}

/// Whether the URL names one item or a collection (playlist, album).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    #[default]
    Single,
    #[serde(alias = "playlist", alias = "album")]
    Collection,
}

impl GroupingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingMode::Single => "single",
            GroupingMode::Collection => "collection",
        }
    }
}

impl fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GroupingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(GroupingMode::Single),
            "collection" | "playlist" | "album" => Ok(GroupingMode::Collection),
            _ => Err(format!("Unknown grouping mode: {}", s)),
        }
    }
}

/// A downloaded file backing a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Number of files written for this job (more than one for collections).
    pub file_count: usize,
}

/// Descriptive metadata of a successful acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub duration_secs: u64,
    pub format: String,
    /// Empty when the engine reported no thumbnail.
    pub thumbnail: String,
    pub source_url: String,
    pub uploader: Option<String>,
}

/// One tracked acquisition request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub url: String,
    pub provider: Provider,
    pub quality: Quality,
    pub grouping: GroupingMode,
    pub state: JobState,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub artifact: Option<Artifact>,
    pub media: Option<MediaMetadata>,
    /// Name of the strategy profile that produced the artifact.
    pub profile: Option<String>,
    pub failure: Option<ErrorCategory>,
    /// Raw engine text of the last failure. Operator-facing only.
    pub error_detail: Option<String>,
}

impl Job {
    pub fn new(
        url: impl Into<String>,
        provider: Provider,
        quality: Quality,
        grouping: GroupingMode,
        retention: TimeDelta,
    ) -> Self {
        let url = url.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            message: format!(
                "{} download initiated ({}) for: {}",
                capitalize(grouping.as_str()),
                quality,
                url
            ),
            url,
            provider,
            quality,
            grouping,
            state: JobState::Initiated,
            created_at: now,
            expires_at: now + retention,
            started_at: None,
            completed_at: None,
            artifact: None,
            media: None,
            profile: None,
            failure: None,
            error_detail: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn failure_report(&self) -> Option<FailureReport> {
        self.failure.map(FailureReport::from)
    }

    /// Caller-facing projection. Raw engine output is never included.
    pub fn view(&self) -> JobView {
        let media = self.media.as_ref().filter(|_| self.state == JobState::Completed);
        let report = self.failure_report();
        JobView {
            job_id: self.id,
            state: self.state,
            message: self.message.clone(),
            url: self.url.clone(),
            provider: self.provider,
            quality: self.quality,
            grouping: self.grouping,
            created_at: self.created_at,
            expires_at: self.expires_at,
            completed_at: self.completed_at,
            filename: self.artifact.as_ref().map(|a| a.file_name.clone()),
            size_bytes: self.artifact.as_ref().map(|a| a.size_bytes),
            title: media.map(|m| m.title.clone()),
            duration_secs: media.map(|m| m.duration_secs),
            format: media.map(|m| m.format.clone()),
            thumbnail: media.map(|m| m.thumbnail.clone()),
            source_url: media.map(|m| m.source_url.clone()),
            error_category: report.as_ref().map(|r| r.category),
            suggestion: report.map(|r| r.suggestion.to_string()),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Partial update merged into a stored job. Unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub state: Option<JobState>,
    pub message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Applied only when later than the stored value.
    pub expires_at: Option<DateTime<Utc>>,
    pub artifact: Option<Option<Artifact>>,
    pub media: Option<Option<MediaMetadata>>,
    pub profile: Option<String>,
    pub failure: Option<ErrorCategory>,
    pub error_detail: Option<String>,
    /// Guard: apply only if the job is currently in this state.
    pub only_if: Option<JobState>,
}

impl JobUpdate {
    pub fn processing(now: DateTime<Utc>) -> Self {
        Self {
            state: Some(JobState::Processing),
            message: Some("Downloading video...".to_string()),
            started_at: Some(now),
            only_if: Some(JobState::Initiated),
            ..Default::default()
        }
    }

    pub fn completed(
        artifact: Artifact,
        media: MediaMetadata,
        profile: impl Into<String>,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            state: Some(JobState::Completed),
            message: Some(format!("Video downloaded successfully: {}", media.title)),
            completed_at: Some(now),
            expires_at: Some(expires_at),
            artifact: Some(Some(artifact)),
            media: Some(Some(media)),
            profile: Some(profile.into()),
            only_if: Some(JobState::Processing),
            ..Default::default()
        }
    }

    pub fn failed(report: &FailureReport, detail: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            state: Some(JobState::Failed),
            message: Some(report.user_message.to_string()),
            completed_at: Some(now),
            failure: Some(report.category),
            error_detail: Some(detail.into()),
            media: Some(None),
            only_if: Some(JobState::Processing),
            ..Default::default()
        }
    }

    /// `completed → cleaned_up`: clears the artifact and the metadata.
    pub fn cleaned_up(message: impl Into<String>) -> Self {
        Self {
            state: Some(JobState::CleanedUp),
            message: Some(message.into()),
            artifact: Some(None),
            media: Some(None),
            only_if: Some(JobState::Completed),
            ..Default::default()
        }
    }

    /// Merge into `job`. Returns false, leaving the job untouched, if the guard fails.
    pub fn apply(self, job: &mut Job) -> bool {
        if let Some(required) = self.only_if
            && job.state != required
        {
            return false;
        }
        if let Some(state) = self.state {
            job.state = state;
        }
        if let Some(message) = self.message {
            job.message = message;
        }
        if let Some(started_at) = self.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(completed_at) = self.completed_at {
            job.completed_at = Some(completed_at);
        }
        if let Some(expires_at) = self.expires_at {
            job.expires_at = job.expires_at.max(expires_at);
        }
        if let Some(artifact) = self.artifact {
            job.artifact = artifact;
        }
        if let Some(media) = self.media {
            job.media = media;
        }
        if let Some(profile) = self.profile {
            job.profile = Some(profile);
        }
        if let Some(failure) = self.failure {
            job.failure = Some(failure);
        }
        if let Some(detail) = self.error_detail {
            job.error_detail = Some(detail);
        }
        true
    }
}

/// Caller-facing job status.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub state: JobState,
    pub message: String,
    pub url: String,
    pub provider: Provider,
    pub quality: Quality,
    pub grouping: GroupingMode,
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
    pub error_category: Option<ErrorCategory>,
    pub suggestion: Option<String>,
}

/// Request to start an acquisition.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub url: String,
    pub quality: Quality,
    pub grouping: GroupingMode,
    /// Overrides the orchestrator's strict-provider setting when set.
    pub strict: Option<bool>,
}

impl SubmitRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: Quality::default(),
            grouping: GroupingMode::default(),
            strict: None,
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_grouping(mut self, grouping: GroupingMode) -> Self {
        self.grouping = grouping;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }
}

/// Returned by a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    pub job_id: Uuid,
    pub state: JobState,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::classify_failure;

    fn make_job() -> Job {
        Job::new(
            "https://vimeo.com/1",
            Provider::Vimeo,
            Quality::P720,
            GroupingMode::Single,
            TimeDelta::hours(5),
        )
    }

    fn make_media() -> MediaMetadata {
        MediaMetadata {
            title: "Clip".into(),
            duration_secs: 12,
            format: "mp4".into(),
            thumbnail: String::new(),
            source_url: "https://vimeo.com/1".into(),
            uploader: None,
        }
    }

    fn make_artifact() -> Artifact {
        Artifact {
            file_name: "x.mp4".into(),
            path: PathBuf::from("/tmp/x.mp4"),
            size_bytes: 3,
            file_count: 1,
        }
    }

    #[test]
    fn test_job_state_roundtrip() {
        for state in [
            JobState::Initiated,
            JobState::Processing,
            JobState::Completed,
            JobState::Failed,
            JobState::CleanedUp,
        ] {
            let parsed: JobState = state.as_str().parse().unwrap();
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Initiated.is_terminal());
        assert!(!JobState::Processing.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::CleanedUp.is_terminal());
    }

    #[test]
    fn test_format_selectors() {
        assert_eq!(Quality::Best.format_selector(), "best[ext=mp4]/best");
        let selector = Quality::P480.format_selector();
        assert!(selector.starts_with("best[ext=mp4][height<=480]/"));
        assert!(selector.ends_with("/best"));
    }

    #[test]
    fn test_quality_and_grouping_serde() {
        let q: Quality = serde_json::from_str("\"1080p\"").unwrap();
        assert_eq!(q, Quality::P1080);
        let g: GroupingMode = serde_json::from_str("\"playlist\"").unwrap();
        assert_eq!(g, GroupingMode::Collection);
        assert_eq!("album".parse::<GroupingMode>().unwrap(), GroupingMode::Collection);
        assert_eq!(
            serde_json::to_string(&JobState::CleanedUp).unwrap(),
            "\"cleaned_up\""
        );
    }

    #[test]
    fn test_new_job_expiry_window() {
        let job = make_job();
        assert_eq!(job.state, JobState::Initiated);
        assert_eq!(job.expires_at - job.created_at, TimeDelta::hours(5));
        assert!(job.message.starts_with("Single download initiated (720p)"));
    }

    #[test]
    fn test_guard_rejects_wrong_state() {
        let mut job = make_job();
        let applied = JobUpdate::cleaned_up("gone").apply(&mut job);
        assert!(!applied);
        assert_eq!(job.state, JobState::Initiated);
    }

    #[test]
    fn test_update_is_merge() {
        let mut job = make_job();
        let url_before = job.url.clone();
        assert!(JobUpdate::processing(Utc::now()).apply(&mut job));
        assert_eq!(job.state, JobState::Processing);
        assert_eq!(job.url, url_before);
        assert!(job.started_at.is_some());
        assert!(job.artifact.is_none());
    }

    #[test]
    fn test_expires_at_never_decreases() {
        let mut job = make_job();
        let original = job.expires_at;
        let update = JobUpdate {
            expires_at: Some(original - TimeDelta::hours(1)),
            ..Default::default()
        };
        update.apply(&mut job);
        assert_eq!(job.expires_at, original);
    }

    #[test]
    fn test_cleanup_clears_artifact_and_metadata() {
        let mut job = make_job();
        JobUpdate::processing(Utc::now()).apply(&mut job);
        let now = Utc::now();
        JobUpdate::completed(make_artifact(), make_media(), "default", now, now).apply(&mut job);
        assert!(job.view().title.is_some());

        assert!(JobUpdate::cleaned_up("expired").apply(&mut job));
        assert_eq!(job.state, JobState::CleanedUp);
        assert!(job.artifact.is_none());
        assert!(job.media.is_none());
        let view = job.view();
        assert!(view.title.is_none());
        assert!(view.filename.is_none());
    }

    #[test]
    fn test_failed_view_hides_raw_detail() {
        let mut job = make_job();
        JobUpdate::processing(Utc::now()).apply(&mut job);
        let raw = "ERROR: [youtube] abc: Video unavailable";
        let report = classify_failure(raw);
        JobUpdate::failed(&report, raw, Utc::now()).apply(&mut job);

        let view = job.view();
        assert_eq!(view.state, JobState::Failed);
        assert_eq!(view.error_category, Some(ErrorCategory::YoutubeUnavailable));
        assert!(view.suggestion.is_some());
        assert!(view.title.is_none());
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("ERROR: [youtube]"));
    }
}
