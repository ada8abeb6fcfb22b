use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::AppError;
use crate::job::GroupingMode;
use crate::strategy::EngineConfig;

/// One invocation of the extraction engine.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub url: String,
    /// Name of the strategy profile this attempt runs under.
    pub profile: &'static str,
    pub config: EngineConfig,
    pub grouping: GroupingMode,
}

/// Metadata the engine reports after writing an artifact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMedia {
    pub title: String,
    pub duration_secs: u64,
    /// Container extension of the written file, e.g. `mp4`.
    pub format: String,
    pub thumbnail: Option<String>,
    pub source_url: Option<String>,
    pub uploader: Option<String>,
}

/// Opaque media extraction engine.
///
/// An implementation either fails or writes the artifact according to
/// `request.config.output_template` and returns its metadata.
pub trait ExtractionEngine: Send + Sync + Clone + 'static {
    fn acquire(
        &self,
        request: &EngineRequest,
    ) -> impl Future<Output = Result<ExtractedMedia, AppError>> + Send;
}

trait DynExtractionEngine: Send + Sync {
    fn acquire_boxed<'a>(
        &'a self,
        request: &'a EngineRequest,
    ) -> BoxFuture<'a, Result<ExtractedMedia, AppError>>;
}

impl<E: ExtractionEngine> DynExtractionEngine for E {
    fn acquire_boxed<'a>(
        &'a self,
        request: &'a EngineRequest,
    ) -> BoxFuture<'a, Result<ExtractedMedia, AppError>> {
        Box::pin(self.acquire(request))
    }
}

/// Type-erased engine, for hosts that pick the implementation at runtime.
#[derive(Clone)]
pub struct SharedEngine(Arc<dyn DynExtractionEngine>);

impl SharedEngine {
    pub fn new<E: ExtractionEngine>(engine: E) -> Self {
        Self(Arc::new(engine))
    }
}

impl std::fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEngine").finish_non_exhaustive()
    }
}

impl ExtractionEngine for SharedEngine {
    async fn acquire(&self, request: &EngineRequest) -> Result<ExtractedMedia, AppError> {
        self.0.acquire_boxed(request).await
    }
}
