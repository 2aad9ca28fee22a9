//! Prediction-style transform client (face swap, lip sync).
//!
//! Both video transforms run on the same predictions API: create a
//! prediction against a pinned model version or a model path, then poll its
//! `get` URL until terminal.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Configuration for the transform vendor.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    pub base_url: String,
    pub api_token: String,
}

impl TransformConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            base_url: std::env::var("TRANSFORM_API_URL")
                .unwrap_or_else(|_| "https://api.replicate.com/v1".to_string()),
            api_token: std::env::var("TRANSFORM_API_TOKEN")
                .map_err(|_| ProviderError::config_error("TRANSFORM_API_TOKEN not set"))?,
        })
    }
}

/// Vendor-side status of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Aborted,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PredictionStatus::Starting | PredictionStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
            PredictionStatus::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionUrls {
    pub get: Option<String>,
    pub web: Option<String>,
}

/// One prediction as reported by the vendor.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub urls: Option<PredictionUrls>,
}

impl Prediction {
    pub fn poll_url(&self) -> Option<&str> {
        self.urls.as_ref().and_then(|u| u.get.as_deref())
    }

    pub fn web_url(&self) -> Option<&str> {
        self.urls.as_ref().and_then(|u| u.web.as_deref())
    }
}

/// Extract a public video URL from a prediction's output, which can be a
/// bare string, a list of URLs, or an object with a `video` field.
pub fn extract_video_url(output: &Value) -> Option<String> {
    match output {
        Value::String(s) if s.starts_with("http") => Some(s.clone()),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .find(|s| s.starts_with("http://") || s.starts_with("https://"))
            .map(str::to_string),
        Value::Object(map) => map
            .get("video")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    }
}

/// HTTP client for the transform vendor.
#[derive(Clone)]
pub struct TransformClient {
    http: reqwest::Client,
    config: TransformConfig,
}

impl TransformClient {
    pub fn new(config: TransformConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self::new(TransformConfig::from_env()?))
    }

    /// Create a prediction against a pinned model version.
    pub async fn create_by_version(
        &self,
        version: &str,
        input: Value,
    ) -> ProviderResult<Prediction> {
        let url = format!("{}/predictions", self.config.base_url);
        debug!(version, "Creating transform prediction");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(&serde_json::json!({ "version": version, "input": input }))
            .send()
            .await?;

        Self::parse(response).await
    }

    /// Create a prediction against a `owner/model` path.
    pub async fn create_by_model(
        &self,
        model_path: &str,
        input: Value,
    ) -> ProviderResult<Prediction> {
        let model_path = model_path.trim_matches('/');
        let url = format!("{}/models/{}/predictions", self.config.base_url, model_path);
        debug!(model_path, "Creating transform prediction");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(&serde_json::json!({ "input": input }))
            .send()
            .await?;

        Self::parse(response).await
    }

    /// Fetch a prediction from its poll URL.
    pub async fn get(&self, poll_url: &str) -> ProviderResult<Prediction> {
        let response = self
            .http
            .get(poll_url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn parse(response: reqwest::Response) -> ProviderResult<Prediction> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}
