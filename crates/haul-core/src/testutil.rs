//! Test utilities: mock engine, recording reporter and job fixtures.
//!
//! Handwritten mocks use `Arc<Mutex<_>>` so tests can assert on recorded calls.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use crate::artifact::ArtifactDir;
use crate::config::EngineSettings;
use crate::engine::{EngineRequest, ExtractedMedia, ExtractionEngine};
use crate::error::AppError;
use crate::job::{Artifact, GroupingMode, Job, JobState, JobView, MediaMetadata, Quality};
use crate::job_store::JobStore;
use crate::orchestrator::{AcquisitionEvent, AcquisitionReporter, Orchestrator};
use crate::provider::Provider;
use crate::strategy::EngineConfig;

// ---------------------------------------------------------------------------
// MockEngine
// ---------------------------------------------------------------------------

pub fn sample_media() -> ExtractedMedia {
    ExtractedMedia {
        title: "Test Clip".to_string(),
        duration_secs: 42,
        format: "mp4".to_string(),
        thumbnail: Some("https://example.com/thumb.jpg".to_string()),
        source_url: Some("https://example.com/watch/1".to_string()),
        uploader: Some("tester".to_string()),
    }
}

/// Mock engine with a queue of outcomes.
///
/// Each call pops the first outcome. An empty queue falls back to success,
/// or to `fallback_error` when set. Successful calls write a small file at
/// the request's output template unless disabled.
#[derive(Clone)]
pub struct MockEngine {
    outcomes: Arc<Mutex<Vec<Result<ExtractedMedia, AppError>>>>,
    fallback_error: Option<String>,
    write_files: bool,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<EngineRequest>>>,
}

impl MockEngine {
    pub fn succeeding() -> Self {
        Self::with_outcomes(Vec::new())
    }

    pub fn with_outcomes(outcomes: Vec<Result<ExtractedMedia, AppError>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes)),
            fallback_error: None,
            write_files: true,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every call fails with `message`.
    pub fn always_failing(message: &str) -> Self {
        Self {
            fallback_error: Some(message.to_string()),
            ..Self::succeeding()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report success without writing an artifact.
    pub fn without_files(mut self) -> Self {
        self.write_files = false;
        self
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Profile names in call order.
    pub fn profiles(&self) -> Vec<&'static str> {
        self.requests.lock().unwrap().iter().map(|r| r.profile).collect()
    }

    fn next_outcome(&self) -> Result<ExtractedMedia, AppError> {
        let mut outcomes = self.outcomes.lock().unwrap();
        if !outcomes.is_empty() {
            return outcomes.remove(0);
        }
        match &self.fallback_error {
            Some(message) => Err(AppError::ExtractionFailed(message.clone())),
            None => Ok(sample_media()),
        }
    }
}

impl ExtractionEngine for MockEngine {
    async fn acquire(&self, request: &EngineRequest) -> Result<ExtractedMedia, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let media = self.next_outcome()?;
        if self.write_files {
            let path = request
                .config
                .output_template
                .replace("%(title)s", &media.title.replace(' ', "_"))
                .replace("%(ext)s", &media.format);
            tokio::fs::write(&path, b"fake media bytes").await?;
        }
        Ok(media)
    }
}

/// Engine request for `url` with default settings and no output file.
pub fn make_request(url: &str) -> EngineRequest {
    EngineRequest {
        url: url.to_string(),
        profile: "default",
        config: EngineConfig::base(Provider::Unknown, "best", "", &EngineSettings::default()),
        grouping: GroupingMode::Single,
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter that records event names.
#[derive(Default)]
pub struct MockReporter {
    events: Mutex<Vec<&'static str>>,
}

impl MockReporter {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

impl AcquisitionReporter for MockReporter {
    fn report(&self, event: AcquisitionEvent<'_>) {
        self.events.lock().unwrap().push(event.name());
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A job in `state`, five-hour retention.
pub fn make_job(state: JobState) -> Job {
    let mut job = Job::new(
        "https://vimeo.com/76979871",
        Provider::Vimeo,
        Quality::P720,
        GroupingMode::Single,
        TimeDelta::hours(5),
    );
    job.state = state;
    job
}

/// A completed job whose artifact lives in `dir` (the file is not created).
pub fn make_completed_job(dir: &Path, ext: &str) -> Job {
    let mut job = make_job(JobState::Completed);
    let file_name = format!("{}Test_Clip.{ext}", ArtifactDir::prefix(job.id, Utc::now()));
    job.started_at = Some(Utc::now());
    job.completed_at = Some(Utc::now());
    job.artifact = Some(Artifact {
        path: dir.join(&file_name),
        file_name,
        size_bytes: 5,
        file_count: 1,
    });
    let media = sample_media();
    job.media = Some(MediaMetadata {
        title: media.title,
        duration_secs: media.duration_secs,
        format: media.format,
        thumbnail: media.thumbnail.unwrap_or_default(),
        source_url: job.url.clone(),
        uploader: media.uploader,
    });
    job.profile = Some("default".to_string());
    job
}

/// Poll until the job leaves `initiated`/`processing`. Panics after five seconds.
pub async fn wait_for_terminal<S, E>(orchestrator: &Orchestrator<S, E>, id: Uuid) -> JobView
where
    S: JobStore,
    E: ExtractionEngine,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let view = orchestrator.get_status(id).await.unwrap();
        if view.state.is_terminal() {
            return view;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} stuck in {}",
            view.state
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
