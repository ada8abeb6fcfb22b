pub mod artifact;
pub mod config;
pub mod credential;
pub mod engine;
pub mod error;
pub mod failure;
pub mod job;
pub mod job_store;
pub mod orchestrator;
pub mod pacing;
pub mod provider;
pub mod retention;
pub mod strategy;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use artifact::ArtifactDir;
pub use config::{EngineSettings, OrchestratorConfig, RetentionConfig, ServiceConfig};
pub use credential::{CredentialStore, validate_credential};
pub use engine::{EngineRequest, ExtractedMedia, ExtractionEngine, SharedEngine};
pub use error::AppError;
pub use failure::{ErrorCategory, FailureReport, classify_failure};
pub use job::{GroupingMode, Job, JobState, JobView, Quality, SubmitReceipt, SubmitRequest};
pub use job_store::{JobStore, MemoryJobStore};
pub use orchestrator::{
    AcquisitionEvent, AcquisitionReporter, ArtifactStream, Orchestrator, TracingReporter,
};
pub use pacing::{PacedEngine, PacingConfig};
pub use provider::{PlatformClassifier, Provider};
pub use retention::{RetentionSweeper, SweepReport};
pub use strategy::{EngineConfig, StrategyProfile, StrategyRegistry};
