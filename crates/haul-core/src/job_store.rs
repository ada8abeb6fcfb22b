use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::job::{Job, JobUpdate};

/// Authoritative table of job records.
///
/// Every mutation of a single record is atomic. Implementations must never
/// let two concurrent `update` calls on the same id interleave.
pub trait JobStore: Send + Sync + Clone + 'static {
    fn create(&self, job: Job) -> impl Future<Output = Result<(), AppError>> + Send;

    fn get(&self, id: Uuid) -> impl Future<Output = Result<Option<Job>, AppError>> + Send;

    /// Merge `update` into the record.
    ///
    /// Returns the updated job, or `None` if the id is unknown or the
    /// update's state guard did not match.
    fn update(
        &self,
        id: Uuid,
        update: JobUpdate,
    ) -> impl Future<Output = Result<Option<Job>, AppError>> + Send;

    /// Remove a record. Returns true if it existed.
    fn delete(&self, id: Uuid) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn list_all(&self) -> impl Future<Output = Result<Vec<Job>, AppError>> + Send;

    /// Remove every record whose `expires_at` is at or before `now`.
    /// Returns the removed ids.
    fn purge_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Uuid>, AppError>> + Send;
}

/// In-memory job store backed by a sharded concurrent map.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<DashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobStore for MemoryJobStore {
    async fn create(&self, job: Job) -> Result<(), AppError> {
        self.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, AppError> {
        Ok(self.jobs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, id: Uuid, update: JobUpdate) -> Result<Option<Job>, AppError> {
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if update.apply(entry.value_mut()) {
            Ok(Some(entry.value().clone()))
        } else {
            Ok(None)
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.jobs.remove(&id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Job>, AppError> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, AppError> {
        let candidates: Vec<Uuid> = self
            .jobs
            .iter()
            .filter(|e| e.value().is_expired(now))
            .map(|e| *e.key())
            .collect();

        // Re-check under the shard lock: the record may have been refreshed.
        let removed = candidates
            .into_iter()
            .filter_map(|id| {
                self.jobs
                    .remove_if(&id, |_, job| job.is_expired(now))
                    .map(|(id, _)| id)
            })
            .collect();
        Ok(removed)
    }
}
