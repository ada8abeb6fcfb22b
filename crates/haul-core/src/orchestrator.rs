use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::artifact::ArtifactDir;
use crate::config::OrchestratorConfig;
use crate::credential::CredentialStore;
use crate::engine::{EngineRequest, ExtractedMedia, ExtractionEngine};
use crate::error::AppError;
use crate::failure::{ErrorCategory, classify_failure};
use crate::job::{
    Artifact, Job, JobState, JobUpdate, JobView, MediaMetadata, SubmitReceipt, SubmitRequest,
};
use crate::job_store::JobStore;
use crate::provider::{PlatformClassifier, Provider, is_valid_url};
use crate::strategy::{EngineConfig, StrategyProfile, StrategyRegistry};

/// Lifecycle events emitted by the orchestrator.
#[derive(Debug, Clone)]
pub enum AcquisitionEvent<'a> {
    JobAccepted {
        job_id: Uuid,
        provider: Provider,
        url: &'a str,
    },
    JobStarted {
        job_id: Uuid,
        provider: Provider,
        profiles: usize,
    },
    AttemptStarted {
        job_id: Uuid,
        profile: &'a str,
        attempt: usize,
    },
    AttemptFailed {
        job_id: Uuid,
        profile: &'a str,
        error: &'a str,
    },
    JobCompleted {
        job_id: Uuid,
        profile: &'a str,
        file_name: &'a str,
    },
    JobFailed {
        job_id: Uuid,
        category: ErrorCategory,
        error: &'a str,
    },
    ArtifactExpired {
        job_id: Uuid,
    },
}

impl AcquisitionEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            AcquisitionEvent::JobAccepted { .. } => "job_accepted",
            AcquisitionEvent::JobStarted { .. } => "job_started",
            AcquisitionEvent::AttemptStarted { .. } => "attempt_started",
            AcquisitionEvent::AttemptFailed { .. } => "attempt_failed",
            AcquisitionEvent::JobCompleted { .. } => "job_completed",
            AcquisitionEvent::JobFailed { .. } => "job_failed",
            AcquisitionEvent::ArtifactExpired { .. } => "artifact_expired",
        }
    }
}

/// Receives orchestrator events (decoupled logging).
pub trait AcquisitionReporter: Send + Sync {
    fn report(&self, event: AcquisitionEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl AcquisitionReporter for TracingReporter {
    fn report(&self, event: AcquisitionEvent<'_>) {
        match event {
            AcquisitionEvent::JobAccepted {
                job_id,
                provider,
                url,
            } => {
                tracing::info!(%job_id, %provider, %url, "Job accepted");
            }
            AcquisitionEvent::JobStarted {
                job_id,
                provider,
                profiles,
            } => {
                tracing::info!(%job_id, %provider, %profiles, "Processing job");
            }
            AcquisitionEvent::AttemptStarted {
                job_id,
                profile,
                attempt,
            } => {
                tracing::info!(%job_id, %profile, %attempt, "Trying extraction profile");
            }
            AcquisitionEvent::AttemptFailed {
                job_id,
                profile,
                error,
            } => {
                tracing::warn!(%job_id, %profile, %error, "Extraction profile failed");
            }
            AcquisitionEvent::JobCompleted {
                job_id,
                profile,
                file_name,
            } => {
                tracing::info!(%job_id, %profile, %file_name, "Job completed");
            }
            AcquisitionEvent::JobFailed {
                job_id,
                category,
                error,
            } => {
                tracing::error!(%job_id, %category, %error, "All extraction profiles failed");
            }
            AcquisitionEvent::ArtifactExpired { job_id } => {
                tracing::info!(%job_id, "Artifact expired");
            }
        }
    }
}

/// An open artifact ready to be streamed to a caller.
#[derive(Debug)]
pub struct ArtifactStream {
    pub file: tokio::fs::File,
    pub file_name: String,
    pub size: u64,
}

/// Drives acquisition jobs from submission to a terminal state.
///
/// Cloning is cheap; clones share the store, the engine and the worker pool.
#[derive(Clone)]
pub struct Orchestrator<S, E> {
    store: S,
    engine: E,
    classifier: Arc<PlatformClassifier>,
    registry: Arc<StrategyRegistry>,
    credentials: CredentialStore,
    artifacts: ArtifactDir,
    config: Arc<OrchestratorConfig>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    reporter: Arc<dyn AcquisitionReporter>,
}

impl<S, E> Orchestrator<S, E>
where
    S: JobStore,
    E: ExtractionEngine,
{
    pub fn new(
        store: S,
        engine: E,
        credentials: CredentialStore,
        artifacts: ArtifactDir,
        config: OrchestratorConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            store,
            engine,
            classifier: Arc::new(PlatformClassifier::default()),
            registry: Arc::new(StrategyRegistry::default()),
            credentials,
            artifacts,
            config: Arc::new(config),
            permits,
            tracker: TaskTracker::new(),
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_classifier(mut self, classifier: PlatformClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn AcquisitionReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn artifacts(&self) -> &ArtifactDir {
        &self.artifacts
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn classifier(&self) -> &PlatformClassifier {
        &self.classifier
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Validate the request, record an `initiated` job and schedule its worker.
    ///
    /// Returns without waiting for the acquisition. Rejected requests leave
    /// no job record behind.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitReceipt, AppError> {
        let url = request.url.trim();
        if !is_valid_url(url) {
            return Err(AppError::InvalidInput(format!(
                "'{url}' is not a valid http(s) URL"
            )));
        }

        let provider = self.classifier.classify(url);
        let strict = request.strict.unwrap_or(self.config.strict_providers);
        if strict && !provider.is_known() {
            return Err(AppError::UnsupportedProvider(url.to_string()));
        }

        let job = Job::new(
            url,
            provider,
            request.quality,
            request.grouping,
            self.config.retention,
        );
        let receipt = SubmitReceipt {
            job_id: job.id,
            state: job.state,
            message: job.message.clone(),
            expires_at: job.expires_at,
        };
        self.store.create(job).await?;

        self.reporter.report(AcquisitionEvent::JobAccepted {
            job_id: receipt.job_id,
            provider,
            url,
        });

        let this = self.clone();
        let job_id = receipt.job_id;
        self.tracker.spawn(async move { this.run_job(job_id).await });

        Ok(receipt)
    }

    /// Current view of a job. A completed job whose artifact is gone is
    /// moved to `cleaned_up` first.
    pub async fn get_status(&self, id: Uuid) -> Result<JobView, AppError> {
        let job = self.load(id).await?;
        let job = self.expire_if_stale(job).await?;
        Ok(job.view())
    }

    /// Open the artifact of a completed job.
    pub async fn fetch_artifact(&self, id: Uuid) -> Result<ArtifactStream, AppError> {
        let job = self.load(id).await?;
        let job = self.expire_if_stale(job).await?;

        match job.state {
            JobState::Completed => {}
            JobState::CleanedUp => return Err(AppError::Gone(id.to_string())),
            other => return Err(AppError::NotReady(other.to_string())),
        }
        let Some(artifact) = job.artifact else {
            return Err(AppError::Gone(id.to_string()));
        };

        let file = match self.artifacts.open(&artifact).await {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Artifact vanished before it could be opened");
                return Err(AppError::Gone(id.to_string()));
            }
        };
        Ok(ArtifactStream {
            file,
            file_name: artifact.file_name,
            size: artifact.size_bytes,
        })
    }

    /// All jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobView>, AppError> {
        Ok(self.store.list_all().await?.iter().map(Job::view).collect())
    }

    /// Number of workers still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting work into the tracker and wait for running workers.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    async fn load(&self, id: Uuid) -> Result<Job, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    async fn expire_if_stale(&self, job: Job) -> Result<Job, AppError> {
        if job.state != JobState::Completed {
            return Ok(job);
        }
        let missing = match &job.artifact {
            Some(artifact) => !self.artifacts.exists(artifact).await,
            None => true,
        };
        let expired = job.is_expired(Utc::now());
        if !missing && !expired {
            return Ok(job);
        }

        if expired && let Some(artifact) = &job.artifact {
            if let Err(e) = self.artifacts.remove(&artifact.path).await {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to remove expired artifact");
            }
        }

        let update = JobUpdate::cleaned_up("Downloaded file expired and was removed");
        match self.store.update(job.id, update).await? {
            Some(updated) => {
                self.reporter
                    .report(AcquisitionEvent::ArtifactExpired { job_id: job.id });
                Ok(updated)
            }
            // Another writer moved it first.
            None => self.load(job.id).await,
        }
    }

    async fn run_job(&self, id: Uuid) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };

        let started_at = Utc::now();
        let job = match self.store.update(id, JobUpdate::processing(started_at)).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(job_id = %id, "Job already claimed or removed");
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Failed to claim job");
                return;
            }
        };

        let provider = self.classifier.classify(&job.url);
        let profiles = self.registry.profiles_for(provider);
        self.reporter.report(AcquisitionEvent::JobStarted {
            job_id: id,
            provider,
            profiles: profiles.len(),
        });

        let prefix = ArtifactDir::prefix(id, started_at);
        let base = EngineConfig::base(
            provider,
            job.quality.format_selector(),
            self.artifacts.output_template(&prefix),
            &self.config.engine,
        );

        let mut last_error: Option<String> = None;
        for (index, profile) in profiles.iter().enumerate() {
            self.reporter.report(AcquisitionEvent::AttemptStarted {
                job_id: id,
                profile: profile.name,
                attempt: index + 1,
            });

            match self.attempt(&job, provider, profile, &base, &prefix).await {
                Ok((artifact, media)) => {
                    self.complete(&job, profile, artifact, media).await;
                    return;
                }
                Err(e) => {
                    let error = e.to_string();
                    self.reporter.report(AcquisitionEvent::AttemptFailed {
                        job_id: id,
                        profile: profile.name,
                        error: &error,
                    });
                    if let Err(e) = self.artifacts.remove_prefixed(&prefix).await {
                        tracing::warn!(job_id = %id, error = %e, "Failed to remove partial files");
                    }
                    last_error = Some(error);
                }
            }
        }

        let detail = last_error.unwrap_or_else(|| "No extraction profiles configured".to_string());
        self.fail(id, &detail).await;
    }

    async fn attempt(
        &self,
        job: &Job,
        provider: Provider,
        profile: &StrategyProfile,
        base: &EngineConfig,
        prefix: &str,
    ) -> Result<(Artifact, ExtractedMedia), AppError> {
        let mut config = base.merged_with(profile);
        if !profile.forbid_credentials {
            config.cookie_file = self.credentials.resolve(provider).await;
        }

        let request = EngineRequest {
            url: job.url.clone(),
            profile: profile.name,
            config,
            grouping: job.grouping,
        };

        let media = tokio::time::timeout(self.config.attempt_timeout, self.engine.acquire(&request))
            .await
            .map_err(|_| AppError::Timeout(self.config.attempt_timeout.as_secs()))??;

        let preferred = (!media.format.is_empty()).then_some(media.format.as_str());
        let artifact = self
            .artifacts
            .locate(prefix, preferred)
            .await?
            .ok_or_else(|| AppError::ExtractionFailed("Downloaded file not found".into()))?;
        Ok((artifact, media))
    }

    async fn complete(
        &self,
        job: &Job,
        profile: &StrategyProfile,
        artifact: Artifact,
        media: ExtractedMedia,
    ) {
        let now = Utc::now();
        let file_name = artifact.file_name.clone();
        let metadata = MediaMetadata {
            title: media.title,
            duration_secs: media.duration_secs,
            format: media.format,
            thumbnail: media.thumbnail.unwrap_or_default(),
            source_url: media.source_url.unwrap_or_else(|| job.url.clone()),
            uploader: media.uploader,
        };
        let update = JobUpdate::completed(
            artifact,
            metadata,
            profile.name,
            now,
            now + self.config.retention,
        );

        match self.store.update(job.id, update).await {
            Ok(Some(_)) => self.reporter.report(AcquisitionEvent::JobCompleted {
                job_id: job.id,
                profile: profile.name,
                file_name: &file_name,
            }),
            Ok(None) => tracing::warn!(job_id = %job.id, "Job left processing before completion"),
            Err(e) => tracing::error!(job_id = %job.id, error = %e, "Failed to mark job completed"),
        }
    }

    async fn fail(&self, id: Uuid, detail: &str) {
        let report = classify_failure(detail);
        self.reporter.report(AcquisitionEvent::JobFailed {
            job_id: id,
            category: report.category,
            error: detail,
        });
        let update = JobUpdate::failed(&report, detail, Utc::now());
        match self.store.update(id, update).await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(job_id = %id, "Job left processing before failure was recorded"),
            Err(e) => tracing::error!(job_id = %id, error = %e, "Failed to mark job as failed"),
        }
    }
}
