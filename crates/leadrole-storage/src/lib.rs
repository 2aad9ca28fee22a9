//! Durable object store for pipeline assets.
//!
//! The pipeline mirrors every vendor result into storage the system
//! controls, so downstream stages and final delivery never depend on a
//! vendor CDN staying up. The store is key-addressed: `put` returns the
//! public URL plus the key it was stored under.

pub mod client;
pub mod error;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};

use async_trait::async_trait;

/// A stored object: where to fetch it and the store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub id: String,
}

/// Durable object store contract used by the pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store raw bytes under `key`.
    async fn put_bytes(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject>;

    /// Fetch a remote URL and store a copy under `key`.
    async fn mirror_from_url(
        &self,
        url: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject>;
}
