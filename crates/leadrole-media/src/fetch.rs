//! Asset downloads for the compositing stage.

use std::path::Path;

use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Smallest payload accepted as a real watermark image. Anything below this
/// is an error page or a truncated response, not a logo.
const MIN_IMAGE_BYTES: usize = 1000;

/// What the downloaded asset is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Video,
    Image,
}

/// Download a remote asset to a local file, validating images by
/// content-type and minimum size.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    expected: AssetKind,
) -> MediaResult<()> {
    debug!(url, ?expected, "Downloading asset");

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(MediaError::download_failed(format!(
            "{} returned {}",
            url,
            response.status()
        )));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if expected == AssetKind::Image && !content_type.starts_with("image/") {
        return Err(MediaError::NotAnImage { content_type });
    }

    let bytes = response.bytes().await?;
    if expected == AssetKind::Image && bytes.len() < MIN_IMAGE_BYTES {
        return Err(MediaError::ImageTooSmall { size: bytes.len() });
    }

    tokio::fs::write(path, &bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_errors_are_classified() {
        let err = MediaError::NotAnImage {
            content_type: "text/html".into(),
        };
        assert!(err.is_bad_watermark());
        assert!(!err.is_download());

        let err = MediaError::download_failed("https://x returned 404");
        assert!(err.is_download());
        assert!(!err.is_bad_watermark());
    }
}
