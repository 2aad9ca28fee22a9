//! Worker configuration.

use std::time::Duration;

use leadrole_media::OverlayOptions;
use leadrole_providers::PollConfig;

/// Default watermark asset when none is configured.
const DEFAULT_WATERMARK_URL: &str =
    "https://imagedelivery.net/nIXg1hqSCosmvn2DEPXE5A/3e06fb0a-0862-490e-4632-0c2c5390f200/public";

/// Pinned face-swap model version at the transform vendor.
const DEFAULT_FACESWAP_VERSION: &str =
    "okaris/roop:8c1e100ecabb3151cf1e6c62879b6de7a4b84602de464ed249b6cff0b86211d8";

/// Lip-sync model path at the transform vendor.
const DEFAULT_LIPSYNC_MODEL: &str = "sync/lipsync-2";

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent pipeline runs
    pub max_concurrent_jobs: usize,

    /// Poll cadence and wall-clock bound for base generation
    pub base_poll: PollConfig,
    /// Poll cadence and wall-clock bound for the transform vendor
    pub transform_poll: PollConfig,

    /// Watermark image composited onto every final asset
    pub watermark_url: String,
    /// Overlay sizing tunables
    pub overlay: OverlayOptions,

    /// Reject over-cap narration at submission instead of trimming
    pub strict_narration: bool,

    /// Face-swap model version at the transform vendor
    pub faceswap_version: String,
    /// Lip-sync model path at the transform vendor
    pub lipsync_model: String,

    /// How often to claim idle pending messages (crash recovery)
    pub claim_interval: Duration,
    /// Minimum idle time before a pending message can be claimed
    pub claim_min_idle: Duration,

    /// How often the sweeper scans for stuck queued jobs
    pub sweep_interval: Duration,
    /// Age past which a still-queued job counts as stuck
    pub queued_stale_after: Duration,

    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            base_poll: PollConfig::new(Duration::from_millis(5000), Duration::from_millis(480_000)),
            transform_poll: PollConfig::new(
                Duration::from_millis(2500),
                Duration::from_millis(900_000),
            ),
            watermark_url: DEFAULT_WATERMARK_URL.to_string(),
            overlay: OverlayOptions::default(),
            strict_narration: true,
            faceswap_version: DEFAULT_FACESWAP_VERSION.to_string(),
            lipsync_model: DEFAULT_LIPSYNC_MODEL.to_string(),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            queued_stale_after: Duration::from_secs(600),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            base_poll: PollConfig::new(
                Duration::from_millis(env_u64("BASE_POLL_INTERVAL_MS", 5000)),
                Duration::from_millis(env_u64("BASE_MAX_WAIT_MS", 480_000)),
            ),
            transform_poll: PollConfig::new(
                Duration::from_millis(env_u64("TRANSFORM_POLL_MS", 2500)),
                Duration::from_millis(env_u64("TRANSFORM_TIMEOUT_MS", 900_000)),
            ),
            watermark_url: std::env::var("WATERMARK_ASSET_URL")
                .unwrap_or_else(|_| DEFAULT_WATERMARK_URL.to_string()),
            overlay: OverlayOptions::from_env(),
            strict_narration: std::env::var("NARRATION_STRICT_LIMIT")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(true),
            faceswap_version: std::env::var("FACESWAP_MODEL_VERSION")
                .unwrap_or_else(|_| DEFAULT_FACESWAP_VERSION.to_string()),
            lipsync_model: std::env::var("LIPSYNC_MODEL_PATH")
                .unwrap_or_else(|_| DEFAULT_LIPSYNC_MODEL.to_string()),
            claim_interval: Duration::from_secs(env_u64("WORKER_CLAIM_INTERVAL_SECS", 30)),
            claim_min_idle: Duration::from_secs(env_u64("WORKER_CLAIM_MIN_IDLE_SECS", 300)),
            sweep_interval: Duration::from_secs(env_u64("SWEEP_INTERVAL_SECS", 60)),
            queued_stale_after: Duration::from_secs(env_u64("QUEUED_STALE_AFTER_SECS", 600)),
            shutdown_timeout: Duration::from_secs(env_u64("WORKER_SHUTDOWN_TIMEOUT", 30)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.base_poll.interval, Duration::from_secs(5));
        assert_eq!(config.base_poll.timeout, Duration::from_secs(480));
        assert!(config.strict_narration);
        assert!(config.faceswap_version.contains("roop"));
    }
}
