use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::artifact::{ArtifactDir, job_id_from_file_name};
use crate::config::RetentionConfig;
use crate::job::JobUpdate;
use crate::job_store::JobStore;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub jobs_cleaned_up: usize,
    pub records_expired: usize,
    pub errors: usize,
}

impl SweepReport {
    fn merge(&mut self, other: SweepReport) {
        self.files_deleted += other.files_deleted;
        self.bytes_freed += other.bytes_freed;
        self.jobs_cleaned_up += other.jobs_cleaned_up;
        self.records_expired += other.records_expired;
        self.errors += other.errors;
    }
}

/// Point-in-time counts for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RetentionStats {
    pub current_files: usize,
    pub total_jobs: usize,
    pub retention_hours: i64,
    pub sweep_interval_minutes: u64,
}

/// Deletes expired artifacts and job records.
#[derive(Clone)]
pub struct RetentionSweeper<S> {
    store: S,
    artifacts: ArtifactDir,
    config: RetentionConfig,
}

impl<S: JobStore> RetentionSweeper<S> {
    pub fn new(store: S, artifacts: ArtifactDir, config: RetentionConfig) -> Self {
        Self {
            store,
            artifacts,
            config,
        }
    }

    /// Delete files older than the retention window and move their jobs to
    /// `cleaned_up`.
    pub async fn sweep_artifacts(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let cutoff = now - self.config.window;

        let entries = match self.artifacts.entries().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list downloads directory");
                report.errors += 1;
                return report;
            }
        };

        for entry in entries {
            let modified: DateTime<Utc> = entry.modified.into();
            if modified >= cutoff {
                continue;
            }
            if let Err(e) = self.artifacts.remove(&entry.path).await {
                tracing::error!(file = %entry.file_name, error = %e, "Failed to delete expired file");
                report.errors += 1;
                continue;
            }
            report.files_deleted += 1;
            report.bytes_freed += entry.size_bytes;
            tracing::info!(file = %entry.file_name, %modified, "Deleted expired file");

            let Some(job_id) = job_id_from_file_name(&entry.file_name) else {
                continue;
            };
            let update = JobUpdate::cleaned_up(format!(
                "File automatically deleted after {} hours",
                self.config.window.num_hours()
            ));
            match self.store.update(job_id, update).await {
                Ok(Some(_)) => {
                    report.jobs_cleaned_up += 1;
                    tracing::debug!(%job_id, "Job cleaned up");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(%job_id, error = %e, "Failed to mark job cleaned up");
                    report.errors += 1;
                }
            }
        }

        if report.files_deleted > 0 {
            let size_mb = report.bytes_freed as f64 / (1024.0 * 1024.0);
            tracing::info!(
                files = report.files_deleted,
                freed_mb = %format!("{size_mb:.2}"),
                "Artifact sweep completed"
            );
        } else {
            tracing::debug!("Artifact sweep completed: no expired files");
        }
        report
    }

    /// Drop job records past their `expires_at`.
    pub async fn sweep_records(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        match self.store.purge_expired(now).await {
            Ok(removed) => {
                report.records_expired = removed.len();
                if !removed.is_empty() {
                    tracing::info!(count = removed.len(), "Expired job records removed");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to purge expired job records");
                report.errors += 1;
            }
        }
        report
    }

    /// Both sweeps, artifacts first.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = self.sweep_artifacts(now).await;
        report.merge(self.sweep_records(now).await);
        report
    }

    pub async fn stats(&self) -> RetentionStats {
        let current_files = self.artifacts.entries().await.map(|e| e.len()).unwrap_or(0);
        let total_jobs = self.store.list_all().await.map(|j| j.len()).unwrap_or(0);
        RetentionStats {
            current_files,
            total_jobs,
            retention_hours: self.config.window.num_hours(),
            sweep_interval_minutes: self.config.sweep_interval.as_secs() / 60,
        }
    }

    /// Run the frequent artifact sweep and the deep full sweep until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut frequent = tokio::time::interval(self.config.sweep_interval);
        let mut deep = tokio::time::interval(self.config.deep_sweep_interval);
        frequent.set_missed_tick_behavior(MissedTickBehavior::Skip);
        deep.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Both intervals fire immediately; skip the first frequent tick.
        frequent.tick().await;

        tracing::info!(
            sweep_minutes = self.config.sweep_interval.as_secs() / 60,
            deep_minutes = self.config.deep_sweep_interval.as_secs() / 60,
            "Retention sweeper started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = frequent.tick() => {
                    self.sweep_artifacts(Utc::now()).await;
                }
                _ = deep.tick() => {
                    let report = self.sweep(Utc::now()).await;
                    tracing::info!(?report, "Deep sweep completed");
                }
            }
        }
        tracing::info!("Retention sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeDelta;

    use super::*;
    use crate::job::JobState;
    use crate::job_store::MemoryJobStore;
    use crate::testutil::{make_completed_job, make_job};

    fn sweeper(store: MemoryJobStore, dir: &std::path::Path) -> RetentionSweeper<MemoryJobStore> {
        RetentionSweeper::new(store, ArtifactDir::new(dir), RetentionConfig::default())
    }

    #[tokio::test]
    async fn test_fresh_files_survive() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("fresh.mp4"), b"data").unwrap();
        let sweeper = sweeper(MemoryJobStore::new(), tmp.path());

        let report = sweeper.sweep_artifacts(Utc::now()).await;
        assert_eq!(report, SweepReport::default());
        assert!(tmp.path().join("fresh.mp4").exists());
    }

    #[tokio::test]
    async fn test_expired_artifact_cleans_up_job() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryJobStore::new();
        let job = make_completed_job(tmp.path(), "mp4");
        let id = job.id;
        let path = job.artifact.as_ref().unwrap().path.clone();
        std::fs::write(&path, b"media").unwrap();
        std::fs::write(tmp.path().join("unrelated.txt"), b"x").unwrap();
        store.create(job).await.unwrap();

        let sweeper = sweeper(store.clone(), tmp.path());
        let later = Utc::now() + TimeDelta::hours(6);
        let report = sweeper.sweep_artifacts(later).await;

        assert_eq!(report.files_deleted, 2);
        assert_eq!(report.bytes_freed, 6);
        assert_eq!(report.jobs_cleaned_up, 1);
        assert_eq!(report.errors, 0);
        assert!(!path.exists());

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::CleanedUp);
        assert!(job.artifact.is_none());
        assert!(job.media.is_none());
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryJobStore::new();
        let job = make_completed_job(tmp.path(), "mp4");
        std::fs::write(&job.artifact.as_ref().unwrap().path, b"media").unwrap();
        store.create(job).await.unwrap();

        let sweeper = sweeper(store.clone(), tmp.path());
        let later = Utc::now() + TimeDelta::hours(6);
        let first = sweeper.sweep_artifacts(later).await;
        let second = sweeper.sweep_artifacts(later).await;
        assert_eq!(first.jobs_cleaned_up, 1);
        assert_eq!(second, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_records_removes_expired_only() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryJobStore::new();
        let fresh = make_job(JobState::Initiated);
        let fresh_id = fresh.id;
        store.create(fresh).await.unwrap();

        let sweeper = sweeper(store.clone(), tmp.path());
        assert_eq!(sweeper.sweep_records(Utc::now()).await.records_expired, 0);

        let report = sweeper.sweep(Utc::now() + TimeDelta::hours(6)).await;
        assert_eq!(report.records_expired, 1);
        assert!(store.get(fresh_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.mp4"), b"x").unwrap();
        let store = MemoryJobStore::new();
        store.create(make_job(JobState::Failed)).await.unwrap();

        let stats = sweeper(store, tmp.path()).stats().await;
        assert_eq!(stats.current_files, 1);
        assert_eq!(stats.total_jobs, 1);
        assert_eq!(stats.retention_hours, 5);
        assert_eq!(stats.sweep_interval_minutes, 30);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let tmp = tempfile::tempdir().unwrap();
        let sweeper = RetentionSweeper::new(
            MemoryJobStore::new(),
            ArtifactDir::new(tmp.path()),
            RetentionConfig {
                sweep_interval: Duration::from_millis(10),
                deep_sweep_interval: Duration::from_millis(20),
                ..Default::default()
            },
        );
        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { sweeper.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "sweeper did not stop");
    }

    #[tokio::test]
    async fn test_missing_directory_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let sweeper = sweeper(MemoryJobStore::new(), &tmp.path().join("gone"));
        let report = sweeper.sweep(Utc::now()).await;
        assert_eq!(report.errors, 0);
    }
}
