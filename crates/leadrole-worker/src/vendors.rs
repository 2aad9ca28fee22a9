//! Stage provider seams.
//!
//! Every external capability the pipeline consumes is a small async trait
//! here, with a production adapter over the vendor HTTP clients. Vendor
//! statuses collapse onto one `VendorState`; `Succeeded` is the only
//! success terminal, everything else terminal maps to a typed failure at
//! the call site.

use async_trait::async_trait;
use serde_json::json;

use leadrole_media::{burn_watermark, MediaError, OverlayOptions};
use leadrole_models::{VideoSpec, VoiceProfile};
use leadrole_providers::{
    extract_video_url, DreamClient, DreamState, PredictionStatus, ProviderError, ProviderResult,
    SpeechClient, TransformClient,
};

/// Vendor fallback voice when no profile-specific id is configured.
const FALLBACK_VOICE_ID: &str = "4dZr8J4CBeokyRkTRpoN";

/// Uniform view of a vendor operation's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorState {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl VendorState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VendorState::Pending | VendorState::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VendorState::Pending => "pending",
            VendorState::Processing => "processing",
            VendorState::Succeeded => "succeeded",
            VendorState::Failed => "failed",
            VendorState::Canceled => "canceled",
        }
    }
}

impl From<DreamState> for VendorState {
    fn from(state: DreamState) -> Self {
        match state {
            DreamState::Queued => VendorState::Pending,
            DreamState::Dreaming => VendorState::Processing,
            DreamState::Completed => VendorState::Succeeded,
            DreamState::Failed => VendorState::Failed,
        }
    }
}

impl From<PredictionStatus> for VendorState {
    fn from(status: PredictionStatus) -> Self {
        match status {
            PredictionStatus::Starting => VendorState::Pending,
            PredictionStatus::Processing => VendorState::Processing,
            PredictionStatus::Succeeded => VendorState::Succeeded,
            PredictionStatus::Failed => VendorState::Failed,
            PredictionStatus::Canceled | PredictionStatus::Aborted => VendorState::Canceled,
        }
    }
}

/// One poll of an in-flight base generation.
#[derive(Debug, Clone)]
pub struct BaseVideoUpdate {
    pub state: VendorState,
    pub video_url: Option<String>,
    pub progress_video_url: Option<String>,
    pub preview_image_url: Option<String>,
    pub failure_reason: Option<String>,
}

/// Correlation handle for a started transform.
#[derive(Debug, Clone)]
pub struct TransformHandle {
    pub id: String,
    pub poll_url: Option<String>,
    pub web_url: Option<String>,
}

/// One poll of an in-flight transform.
#[derive(Debug, Clone)]
pub struct TransformUpdate {
    pub state: VendorState,
    pub output_url: Option<String>,
}

#[async_trait]
pub trait BaseVideoProvider: Send + Sync {
    /// Submit a generation; returns the vendor's generation id.
    async fn start(&self, prompt: &str, spec: &VideoSpec) -> ProviderResult<String>;

    /// Fetch the current state of a generation.
    async fn poll(&self, generation_id: &str) -> ProviderResult<BaseVideoUpdate>;
}

#[async_trait]
pub trait FaceSwapProvider: Send + Sync {
    /// Swap `face_url` onto the subject of `target_video_url`.
    async fn start(&self, face_url: &str, target_video_url: &str)
        -> ProviderResult<TransformHandle>;

    async fn poll(&self, handle: &TransformHandle) -> ProviderResult<TransformUpdate>;
}

#[async_trait]
pub trait LipSyncProvider: Send + Sync {
    /// Re-articulate `video_url` to match `audio_url`.
    async fn start(&self, video_url: &str, audio_url: &str) -> ProviderResult<TransformHandle>;

    async fn poll(&self, handle: &TransformHandle) -> ProviderResult<TransformUpdate>;
}

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Synthesize narration audio, returning MP3 bytes.
    async fn synthesize(
        &self,
        text: &str,
        profile: VoiceProfile,
        speaking_rate: f64,
    ) -> ProviderResult<Vec<u8>>;
}

#[async_trait]
pub trait Compositor: Send + Sync {
    /// Composite the watermark onto the candidate video, returning MP4 bytes.
    async fn composite(&self, video_url: &str, watermark_url: &str) -> Result<Vec<u8>, MediaError>;
}

// =============================================================================
// Production adapters
// =============================================================================

/// Base-video generation over the dream client.
pub struct BaseVideoAdapter {
    client: DreamClient,
}

impl BaseVideoAdapter {
    pub fn new(client: DreamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BaseVideoProvider for BaseVideoAdapter {
    async fn start(&self, prompt: &str, spec: &VideoSpec) -> ProviderResult<String> {
        let generation = self
            .client
            .create_generation(prompt, spec.aspect_ratio.as_str(), spec.duration.as_str())
            .await?;
        Ok(generation.id)
    }

    async fn poll(&self, generation_id: &str) -> ProviderResult<BaseVideoUpdate> {
        let generation = self.client.get_generation(generation_id).await?;
        let assets = generation.assets.unwrap_or_default();
        Ok(BaseVideoUpdate {
            state: generation.state.into(),
            video_url: assets.video,
            progress_video_url: assets.progress_video,
            preview_image_url: assets.image,
            failure_reason: generation.failure_reason,
        })
    }
}

fn handle_from(prediction: &leadrole_providers::Prediction) -> TransformHandle {
    TransformHandle {
        id: prediction.id.clone(),
        poll_url: prediction.poll_url().map(str::to_string),
        web_url: prediction.web_url().map(str::to_string),
    }
}

async fn poll_prediction(
    client: &TransformClient,
    handle: &TransformHandle,
) -> ProviderResult<TransformUpdate> {
    let poll_url = handle.poll_url.as_deref().ok_or(ProviderError::MissingPollUrl)?;
    let prediction = client.get(poll_url).await?;
    Ok(TransformUpdate {
        state: prediction.status.into(),
        output_url: prediction.output.as_ref().and_then(extract_video_url),
    })
}

/// Face swap over the transform client, pinned to a model version.
pub struct FaceSwapAdapter {
    client: TransformClient,
    version: String,
}

impl FaceSwapAdapter {
    pub fn new(client: TransformClient, version: impl Into<String>) -> Self {
        Self {
            client,
            version: version.into(),
        }
    }
}

#[async_trait]
impl FaceSwapProvider for FaceSwapAdapter {
    async fn start(
        &self,
        face_url: &str,
        target_video_url: &str,
    ) -> ProviderResult<TransformHandle> {
        let prediction = self
            .client
            .create_by_version(
                &self.version,
                json!({
                    "source": face_url,
                    "target": target_video_url,
                    "keep_fps": true,
                    "keep_frames": true,
                    "enhance_face": false,
                }),
            )
            .await?;
        Ok(handle_from(&prediction))
    }

    async fn poll(&self, handle: &TransformHandle) -> ProviderResult<TransformUpdate> {
        poll_prediction(&self.client, handle).await
    }
}

/// Lip sync over the transform client, addressed by model path.
pub struct LipSyncAdapter {
    client: TransformClient,
    model_path: String,
}

impl LipSyncAdapter {
    pub fn new(client: TransformClient, model_path: impl Into<String>) -> Self {
        Self {
            client,
            model_path: model_path.into(),
        }
    }
}

#[async_trait]
impl LipSyncProvider for LipSyncAdapter {
    async fn start(&self, video_url: &str, audio_url: &str) -> ProviderResult<TransformHandle> {
        let prediction = self
            .client
            .create_by_model(
                &self.model_path,
                json!({
                    "audio": audio_url,
                    "video": video_url,
                    "sync_mode": "silence",
                    "temperature": 0.5,
                    "active_speaker": false,
                }),
            )
            .await?;
        Ok(handle_from(&prediction))
    }

    async fn poll(&self, handle: &TransformHandle) -> ProviderResult<TransformUpdate> {
        poll_prediction(&self.client, handle).await
    }
}

/// Vendor voice ids per profile.
#[derive(Debug, Clone)]
pub struct VoiceMap {
    narration_male: String,
    narration_female: String,
    story_male: String,
    story_female: String,
}

impl Default for VoiceMap {
    fn default() -> Self {
        Self {
            narration_male: FALLBACK_VOICE_ID.to_string(),
            narration_female: FALLBACK_VOICE_ID.to_string(),
            story_male: FALLBACK_VOICE_ID.to_string(),
            story_female: FALLBACK_VOICE_ID.to_string(),
        }
    }
}

impl VoiceMap {
    /// Read voice ids from the environment; profiles without an id fall
    /// back to the vendor's stock narration voice.
    pub fn from_env() -> Self {
        let get = |name: &str| {
            std::env::var(name).unwrap_or_else(|_| FALLBACK_VOICE_ID.to_string())
        };
        Self {
            narration_male: get("VOICE_ID_NARRATION_MALE"),
            narration_female: get("VOICE_ID_NARRATION_FEMALE"),
            story_male: get("VOICE_ID_STORY_MALE"),
            story_female: get("VOICE_ID_STORY_FEMALE"),
        }
    }

    pub fn id_for(&self, profile: VoiceProfile) -> &str {
        match profile {
            VoiceProfile::NarrationMale => &self.narration_male,
            VoiceProfile::NarrationFemale => &self.narration_female,
            VoiceProfile::StoryMale => &self.story_male,
            VoiceProfile::StoryFemale => &self.story_female,
        }
    }
}

/// Speech synthesis over the speech client plus the voice map.
pub struct SpeechAdapter {
    client: SpeechClient,
    voices: VoiceMap,
}

impl SpeechAdapter {
    pub fn new(client: SpeechClient, voices: VoiceMap) -> Self {
        Self { client, voices }
    }
}

#[async_trait]
impl SpeechProvider for SpeechAdapter {
    async fn synthesize(
        &self,
        text: &str,
        profile: VoiceProfile,
        speaking_rate: f64,
    ) -> ProviderResult<Vec<u8>> {
        self.client
            .synthesize(text, self.voices.id_for(profile), speaking_rate)
            .await
    }
}

/// Watermark compositing over the media crate.
pub struct MediaCompositor {
    http: reqwest::Client,
    overlay: OverlayOptions,
}

impl MediaCompositor {
    pub fn new(overlay: OverlayOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            overlay,
        }
    }
}

#[async_trait]
impl Compositor for MediaCompositor {
    async fn composite(&self, video_url: &str, watermark_url: &str) -> Result<Vec<u8>, MediaError> {
        burn_watermark(&self.http, video_url, watermark_url, &self.overlay).await
    }
}
