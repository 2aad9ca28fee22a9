//! In-memory record store for tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use leadrole_models::{Job, JobId, JobStatus, Persona};

use crate::error::{StoreError, StoreResult};
use crate::patch::JobPatch;
use crate::repo::{JobPage, OwnerFilter, RecordStore};

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, Job>,
    /// idempotency key -> job id
    reservations: HashMap<String, String>,
    personas: HashMap<String, Persona>,
    /// statuses in the order they were checkpointed, per job
    status_log: HashMap<String, Vec<JobStatus>>,
}

/// In-memory `RecordStore` with the same merge semantics as the Firestore
/// implementation. Also records the sequence of checkpointed statuses so
/// tests can assert stage ordering.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a persona record.
    pub fn put_persona(&self, owner_id: impl Into<String>, persona: Persona) {
        self.inner
            .lock()
            .unwrap()
            .personas
            .insert(owner_id.into(), persona);
    }

    /// Insert a job directly, bypassing idempotency reservation (test setup).
    pub fn seed_job(&self, job: Job) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .reservations
            .insert(job.idempotency_key.clone(), job.id.as_str().to_string());
        inner.jobs.insert(job.id.as_str().to_string(), job);
    }

    /// Statuses checkpointed for a job, in write order.
    pub fn status_log(&self, id: &JobId) -> Vec<JobStatus> {
        self.inner
            .lock()
            .unwrap()
            .status_log
            .get(id.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Number of stored jobs.
    pub fn job_count(&self) -> usize {
        self.inner.lock().unwrap().jobs.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.inner.lock().unwrap().jobs.get(id.as_str()).cloned())
    }

    async fn create_job(&self, job: &Job) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.reservations.contains_key(&job.idempotency_key) {
            return Err(StoreError::already_exists(job.idempotency_key.clone()));
        }
        inner
            .reservations
            .insert(job.idempotency_key.clone(), job.id.as_str().to_string());
        inner.jobs.insert(job.id.as_str().to_string(), job.clone());
        Ok(())
    }

    async fn merge_job(&self, id: &JobId, patch: JobPatch) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let Inner {
            jobs, status_log, ..
        } = &mut *inner;

        let job = jobs
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::not_found(id.as_str()))?;

        if let Some(status) = patch.status {
            status_log
                .entry(id.as_str().to_string())
                .or_default()
                .push(status);
        }
        patch.apply_to(job, Utc::now());
        Ok(())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Job>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reservations
            .get(key)
            .and_then(|id| inner.jobs.get(id))
            .cloned())
    }

    async fn list_by_owner(&self, owner_id: &str, filter: &OwnerFilter) -> StoreResult<JobPage> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| j.owner_id == owner_id)
            .filter(|j| filter.status.map(|s| j.status == s).unwrap_or(true))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let limit = if filter.limit == 0 { 20 } else { filter.limit };
        let page: Vec<Job> = jobs
            .iter()
            .skip(filter.offset)
            .take(limit + 1)
            .cloned()
            .collect();
        let has_more = page.len() > limit;

        Ok(JobPage {
            jobs: page.into_iter().take(limit).collect(),
            has_more,
        })
    }

    async fn find_queued_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Job>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued && j.updated_at < cutoff)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_persona(&self, owner_id: &str) -> StoreResult<Option<Persona>> {
        Ok(self.inner.lock().unwrap().personas.get(owner_id).cloned())
    }
}
