//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while compositing the final asset.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("Watermark asset is not an image (content-type: {content_type})")]
    NotAnImage { content_type: String },

    #[error("Watermark asset too small to be a real image ({size} bytes)")]
    ImageTooSmall { size: usize },

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MediaError {
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Whether this failure concerns fetching a source asset rather than
    /// the composite itself.
    pub fn is_download(&self) -> bool {
        matches!(
            self,
            MediaError::DownloadFailed { .. } | MediaError::Network(_)
        )
    }

    /// Whether this failure means the watermark asset was unusable.
    pub fn is_bad_watermark(&self) -> bool {
        matches!(
            self,
            MediaError::NotAnImage { .. } | MediaError::ImageTooSmall { .. }
        )
    }
}
