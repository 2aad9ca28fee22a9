//! Record repositories: the store contract the pipeline is written against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use leadrole_models::{Job, JobId, JobStatus, Persona};

use crate::client::FirestoreClient;
use crate::error::{StoreError, StoreResult};
use crate::patch::JobPatch;
use crate::value::{fields_from_record, nest_fields, record_from_fields};

const JOBS_COLLECTION: &str = "jobs";
const PERSONAS_COLLECTION: &str = "personas";
const IDEMPOTENCY_COLLECTION: &str = "idempotency";

/// Filters for owner-scoped job listings.
#[derive(Debug, Clone, Default)]
pub struct OwnerFilter {
    pub status: Option<JobStatus>,
    pub limit: usize,
    pub offset: usize,
}

/// One page of an owner's jobs, newest first.
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    /// Whether another page likely exists
    pub has_more: bool,
}

/// Durable job/persona record store.
///
/// The only mutable shared state in the system. Mutations go through
/// `merge_job` with a `JobPatch`; whole-record writes happen only at
/// creation.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a job by id. `Ok(None)` when absent.
    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// Create a job, enforcing idempotency-key uniqueness. Fails with
    /// `AlreadyExists` when another job holds the key.
    async fn create_job(&self, job: &Job) -> StoreResult<()>;

    /// Merge a partial-field update into a job.
    async fn merge_job(&self, id: &JobId, patch: JobPatch) -> StoreResult<()>;

    /// Look up the job holding an idempotency key.
    async fn find_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Job>>;

    /// List an owner's jobs, newest first.
    async fn list_by_owner(&self, owner_id: &str, filter: &OwnerFilter) -> StoreResult<JobPage>;

    /// Jobs still `queued` whose last update predates `cutoff` — the
    /// sweeper's feed.
    async fn find_queued_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Job>>;

    /// Fetch an owner's persona record.
    async fn fetch_persona(&self, owner_id: &str) -> StoreResult<Option<Persona>>;
}

/// Firestore-backed record store.
#[derive(Clone)]
pub struct FirestoreRecordStore {
    client: FirestoreClient,
}

impl FirestoreRecordStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub fn from_env() -> StoreResult<Self> {
        Ok(Self::new(FirestoreClient::from_env()?))
    }

    fn job_from_doc(doc: &crate::value::Document) -> StoreResult<Job> {
        let fields = doc
            .fields
            .as_ref()
            .ok_or_else(|| StoreError::InvalidResponse("document has no fields".into()))?;
        record_from_fields(fields)
    }
}

#[async_trait]
impl RecordStore for FirestoreRecordStore {
    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>> {
        match self.client.get_document(JOBS_COLLECTION, id.as_str()).await? {
            Some(doc) => Ok(Some(Self::job_from_doc(&doc)?)),
            None => Ok(None),
        }
    }

    async fn create_job(&self, job: &Job) -> StoreResult<()> {
        // Reserve the idempotency key first: the reservation doc's id IS the
        // key, so a concurrent duplicate loses with AlreadyExists instead of
        // racing the query-then-create window.
        let reservation = fields_from_record(&json!({
            "job_id": job.id.as_str(),
            "owner_id": job.owner_id,
            "created_at": job.created_at,
        }))?;
        self.client
            .create_document(IDEMPOTENCY_COLLECTION, &job.idempotency_key, reservation)
            .await?;

        let fields = fields_from_record(job)?;
        self.client
            .create_document(JOBS_COLLECTION, job.id.as_str(), fields)
            .await?;

        debug!(job_id = %job.id, key = %job.idempotency_key, "Created job record");
        Ok(())
    }

    async fn merge_job(&self, id: &JobId, patch: JobPatch) -> StoreResult<()> {
        let leaves = patch.leaf_values(Utc::now());
        let paths: Vec<String> = leaves.iter().map(|(p, _)| p.clone()).collect();
        let fields = nest_fields(&leaves);

        self.client
            .patch_document(JOBS_COLLECTION, id.as_str(), fields, &paths)
            .await
    }

    async fn find_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Job>> {
        let query = json!({
            "from": [{"collectionId": JOBS_COLLECTION}],
            "where": {
                "fieldFilter": {
                    "field": {"fieldPath": "idempotency_key"},
                    "op": "EQUAL",
                    "value": {"stringValue": key},
                }
            },
            "limit": 1,
        });

        let docs = self.client.run_query(query).await?;
        match docs.first() {
            Some(doc) => Ok(Some(Self::job_from_doc(doc)?)),
            None => Ok(None),
        }
    }

    async fn list_by_owner(&self, owner_id: &str, filter: &OwnerFilter) -> StoreResult<JobPage> {
        let mut filters = vec![json!({
            "fieldFilter": {
                "field": {"fieldPath": "owner_id"},
                "op": "EQUAL",
                "value": {"stringValue": owner_id},
            }
        })];
        if let Some(status) = filter.status {
            filters.push(json!({
                "fieldFilter": {
                    "field": {"fieldPath": "status"},
                    "op": "EQUAL",
                    "value": {"stringValue": status.as_str()},
                }
            }));
        }

        let limit = if filter.limit == 0 { 20 } else { filter.limit };
        let query = json!({
            "from": [{"collectionId": JOBS_COLLECTION}],
            "where": {"compositeFilter": {"op": "AND", "filters": filters}},
            "orderBy": [{"field": {"fieldPath": "created_at"}, "direction": "DESCENDING"}],
            "offset": filter.offset,
            // fetch one extra row to learn whether another page exists
            "limit": limit + 1,
        });

        let docs = self.client.run_query(query).await?;
        let has_more = docs.len() > limit;
        let jobs = docs
            .iter()
            .take(limit)
            .map(Self::job_from_doc)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(JobPage { jobs, has_more })
    }

    async fn find_queued_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Job>> {
        // Timestamps serialize as RFC3339 strings, which order
        // lexicographically, so a string comparison is a time comparison.
        let cutoff_repr = serde_json::to_value(cutoff)?;
        let query = json!({
            "from": [{"collectionId": JOBS_COLLECTION}],
            "where": {"compositeFilter": {"op": "AND", "filters": [
                {"fieldFilter": {
                    "field": {"fieldPath": "status"},
                    "op": "EQUAL",
                    "value": {"stringValue": JobStatus::Queued.as_str()},
                }},
                {"fieldFilter": {
                    "field": {"fieldPath": "updated_at"},
                    "op": "LESS_THAN",
                    "value": {"stringValue": cutoff_repr},
                }},
            ]}},
            "limit": limit,
        });

        let docs = self.client.run_query(query).await?;
        docs.iter().map(Self::job_from_doc).collect()
    }

    async fn fetch_persona(&self, owner_id: &str) -> StoreResult<Option<Persona>> {
        match self
            .client
            .get_document(PERSONAS_COLLECTION, owner_id)
            .await?
        {
            Some(doc) => match doc.fields.as_ref() {
                Some(fields) => Ok(Some(record_from_fields(fields)?)),
                None => Ok(Some(Persona::default())),
            },
            None => Ok(None),
        }
    }
}
