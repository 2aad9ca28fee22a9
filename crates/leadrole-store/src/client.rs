//! Firestore REST API client.
//!
//! Thin client over the documents API: get, create (with a document id and
//! an exists-precondition), patch with an update mask, and structured
//! queries. Auth tokens are cached with a refresh margin.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, StatusCode};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::retry::{with_retry, RetryConfig};
use crate::value::{Document, Value};

/// OAuth scope for Firestore access.
const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Refresh tokens this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Conservative TTL when the provider reports no expiry.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Request timeout
    pub timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .map_err(|_| StoreError::auth_error("GCP_PROJECT_ID must be set"))?;

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::from_env(),
        })
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// Firestore REST API client.
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    auth: Arc<dyn TokenProvider>,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl Clone for FirestoreClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            base_url: self.base_url.clone(),
            auth: Arc::clone(&self.auth),
            token: Arc::clone(&self.token),
        }
    }
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub fn new(config: FirestoreConfig) -> StoreResult<Self> {
        let auth = Self::create_auth_provider()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("leadrole-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::Network)?;

        let base_url = format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/{}/documents",
            config.project_id, config.database_id
        );

        Ok(Self {
            http,
            config,
            base_url,
            auth,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(FirestoreConfig::from_env()?)
    }

    fn create_auth_provider() -> StoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            StoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(StoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    async fn get_token(&self) -> StoreResult<String> {
        {
            let cache = self.token.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut cache = self.token.write().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_valid() {
                return Ok(cached.access_token.clone());
            }
        }

        let token = self
            .auth
            .token(&[FIRESTORE_SCOPE])
            .await
            .map_err(|e| StoreError::auth_error(format!("Failed to obtain auth token: {}", e)))?;

        let access_token = token.as_str().to_string();
        let now = chrono::Utc::now();
        let expires_at = {
            let exp = token.expires_at();
            if exp > now {
                match (exp - now).to_std() {
                    Ok(ttl) => Instant::now() + ttl,
                    Err(_) => Instant::now() + TOKEN_DEFAULT_TTL,
                }
            } else {
                Instant::now() + TOKEN_DEFAULT_TTL
            }
        };

        *cache = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at,
        });
        debug!("Refreshed Firestore auth token");
        Ok(access_token)
    }

    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        )
    }

    async fn handle_error(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::from_http_status(status, body)
    }

    /// Get a document. `Ok(None)` when it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> StoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);

        with_retry(&self.config.retry, "get_document", || async {
            let token = self.get_token().await?;
            let response = self.http.get(&url).bearer_auth(&token).send().await?;

            match response.status() {
                StatusCode::OK => Ok(Some(response.json().await?)),
                StatusCode::NOT_FOUND => Ok(None),
                _ => Err(Self::handle_error(response).await),
            }
        })
        .await
    }

    /// Create a document with an explicit id. Fails with `AlreadyExists`
    /// when a document with that id is present.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> StoreResult<()> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );
        let body = Document::new(fields);

        with_retry(&self.config.retry, "create_document", || async {
            let token = self.get_token().await?;
            let response = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::handle_error(response).await)
            }
        })
        .await
    }

    /// Patch a document: update only the masked field paths. Requires the
    /// document to exist.
    pub async fn patch_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        field_paths: &[String],
    ) -> StoreResult<()> {
        let mut url = format!(
            "{}?currentDocument.exists=true",
            self.document_path(collection, doc_id)
        );
        for path in field_paths {
            url.push_str("&updateMask.fieldPaths=");
            url.push_str(&urlencoding::encode(path));
        }
        let body = Document::new(fields);

        with_retry(&self.config.retry, "patch_document", || async {
            let token = self.get_token().await?;
            let response = self
                .http
                .patch(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::handle_error(response).await)
            }
        })
        .await
    }

    /// Run a structured query and return the matched documents.
    pub async fn run_query(&self, query: serde_json::Value) -> StoreResult<Vec<Document>> {
        let url = format!("{}:runQuery", self.base_url);
        let body = serde_json::json!({ "structuredQuery": query });

        with_retry(&self.config.retry, "run_query", || async {
            let token = self.get_token().await?;
            let response = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(Self::handle_error(response).await);
            }

            let rows: Vec<serde_json::Value> = response.json().await?;
            let mut documents = Vec::new();
            for row in rows {
                if let Some(doc) = row.get("document") {
                    documents.push(serde_json::from_value(doc.clone())?);
                }
            }
            Ok(documents)
        })
        .await
    }
}
