//! Text-to-speech client.

use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Configuration for the speech vendor.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub base_url: String,
    pub api_key: String,
    /// Synthesis model identifier
    pub model_id: String,
}

impl SpeechConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            base_url: std::env::var("SPEECH_API_URL")
                .unwrap_or_else(|_| "https://api.elevenlabs.io/v1".to_string()),
            api_key: std::env::var("SPEECH_API_KEY")
                .map_err(|_| ProviderError::config_error("SPEECH_API_KEY not set"))?,
            model_id: std::env::var("SPEECH_MODEL_ID").unwrap_or_else(|_| "eleven_v3".to_string()),
        })
    }
}

/// HTTP client for the speech vendor. Synthesis is synchronous on the wire:
/// one request returns the finished MP3 bytes.
#[derive(Clone)]
pub struct SpeechClient {
    http: reqwest::Client,
    config: SpeechConfig,
}

impl SpeechClient {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self::new(SpeechConfig::from_env()?))
    }

    /// Synthesize `text` with the given vendor voice at the given rate,
    /// returning MP3 bytes.
    pub async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        speaking_rate: f64,
    ) -> ProviderResult<Vec<u8>> {
        let url = format!("{}/text-to-speech/{}", self.config.base_url, voice_id);
        debug!(voice_id, speaking_rate, chars = text.len(), "Synthesizing narration");

        let response = self
            .http
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .header("accept", "audio/mpeg")
            .json(&json!({
                "text": text,
                "model_id": self.config.model_id,
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.8,
                    "style": 0.5,
                    "speaking_rate": speaking_rate,
                },
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::EmptyOutput);
        }
        Ok(bytes.to_vec())
    }
}
