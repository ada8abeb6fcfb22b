use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use haul_core::{
    AppError, ArtifactDir, CredentialStore, MemoryJobStore, Orchestrator, RetentionSweeper,
    ServiceConfig, SharedEngine,
};

pub type HaulOrchestrator = Orchestrator<MemoryJobStore, SharedEngine>;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub orchestrator: HaulOrchestrator,
    pub sweeper: RetentionSweeper<MemoryJobStore>,
    /// Admin token protecting credential upload and manual cleanup (None = disabled).
    pub admin_token: Option<String>,
    sweeper_running: AtomicBool,
}

impl AppState {
    /// Wire the orchestrator and sweeper over one in-memory job store.
    ///
    /// Creates the downloads directory if it does not exist.
    pub async fn from_config(
        config: &ServiceConfig,
        engine: SharedEngine,
        admin_token: Option<String>,
    ) -> Result<Self, AppError> {
        let store = MemoryJobStore::new();
        let artifacts = ArtifactDir::new(&config.downloads_dir);
        artifacts.ensure().await?;

        let orchestrator = Orchestrator::new(
            store.clone(),
            engine,
            CredentialStore::new(&config.cookies_dir),
            artifacts.clone(),
            config.orchestrator.clone(),
        );
        let sweeper = RetentionSweeper::new(store, artifacts, config.retention.clone());

        Ok(Self {
            orchestrator,
            sweeper,
            admin_token,
            sweeper_running: AtomicBool::new(false),
        })
    }

    pub fn sweeper_running(&self) -> bool {
        self.sweeper_running.load(Ordering::Relaxed)
    }

    /// Run the retention sweeper until `cancel` fires.
    pub async fn run_sweeper(&self, cancel: CancellationToken) {
        self.sweeper_running.store(true, Ordering::Relaxed);
        self.sweeper.run(cancel).await;
        self.sweeper_running.store(false, Ordering::Relaxed);
    }
}
