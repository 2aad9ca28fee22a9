//! Base-video generation client (Dream Machine API).

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Configuration for the base-video vendor.
#[derive(Debug, Clone)]
pub struct DreamConfig {
    pub base_url: String,
    pub api_key: String,
    /// Generation model identifier sent with every request
    pub model: String,
}

impl DreamConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            base_url: std::env::var("DREAM_API_URL")
                .unwrap_or_else(|_| "https://api.lumalabs.ai/dream-machine/v1".to_string()),
            api_key: std::env::var("DREAM_API_KEY")
                .map_err(|_| ProviderError::config_error("DREAM_API_KEY not set"))?,
            model: std::env::var("DREAM_MODEL").unwrap_or_else(|_| "ray-2".to_string()),
        })
    }
}

/// Vendor-side state of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DreamState {
    Queued,
    Dreaming,
    Completed,
    Failed,
}

impl DreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DreamState::Completed | DreamState::Failed)
    }
}

/// Artifacts attached to a generation; partial while it runs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationAssets {
    /// Final video, present once completed
    pub video: Option<String>,
    /// Low-res preview clip updated while dreaming
    pub progress_video: Option<String>,
    /// Latest preview frame
    pub image: Option<String>,
}

/// One generation as reported by the vendor.
#[derive(Debug, Clone, Deserialize)]
pub struct Generation {
    pub id: String,
    pub state: DreamState,
    #[serde(default)]
    pub assets: Option<GenerationAssets>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// HTTP client for the base-video vendor.
#[derive(Clone)]
pub struct DreamClient {
    http: reqwest::Client,
    config: DreamConfig,
}

impl DreamClient {
    pub fn new(config: DreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self::new(DreamConfig::from_env()?))
    }

    /// Submit a new generation request.
    pub async fn create_generation(
        &self,
        prompt: &str,
        aspect_ratio: &str,
        duration: &str,
    ) -> ProviderResult<Generation> {
        let url = format!("{}/generations", self.config.base_url);
        debug!(aspect_ratio, duration, "Submitting base video generation");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "prompt": prompt,
                "model": self.config.model,
                "aspect_ratio": aspect_ratio,
                "duration": duration,
            }))
            .send()
            .await?;

        Self::parse(response).await
    }

    /// Fetch the current state of a generation.
    pub async fn get_generation(&self, id: &str) -> ProviderResult<Generation> {
        let url = format!("{}/generations/{}", self.config.base_url, id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn parse(response: reqwest::Response) -> ProviderResult<Generation> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DreamClient {
        DreamClient::new(DreamConfig {
            base_url: server.uri(),
            api_key: "test-key".into(),
            model: "ray-2".into(),
        })
    }

    #[tokio::test]
    async fn test_create_generation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generations"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "gen-1",
                "state": "queued"
            })))
            .mount(&server)
            .await;

        let gen = client(&server)
            .create_generation("a knight rides at dawn", "9:16", "5s")
            .await
            .unwrap();
        assert_eq!(gen.id, "gen-1");
        assert_eq!(gen.state, DreamState::Queued);
        assert!(!gen.state.is_terminal());
    }

    #[tokio::test]
    async fn test_get_generation_with_progress_assets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generations/gen-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "gen-1",
                "state": "dreaming",
                "assets": {
                    "progress_video": "https://cdn/progress.mp4",
                    "image": "https://cdn/frame.jpg"
                }
            })))
            .mount(&server)
            .await;

        let gen = client(&server).get_generation("gen-1").await.unwrap();
        assert_eq!(gen.state, DreamState::Dreaming);
        let assets = gen.assets.unwrap();
        assert_eq!(assets.progress_video.as_deref(), Some("https://cdn/progress.mp4"));
        assert!(assets.video.is_none());
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generations/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such generation"))
            .mount(&server)
            .await;

        let err = client(&server).get_generation("missing").await.unwrap_err();
        match err {
            ProviderError::RequestFailed { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such generation");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
