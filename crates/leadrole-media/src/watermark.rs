//! Burn a watermark into the final candidate video, producing a buffer.
//!
//! All scratch files live in a temp dir that is dropped with the operation;
//! nothing intermediate is persisted outside it.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::fetch::{download_to_file, AssetKind};
use crate::overlay::{place_overlay, OverlayOptions, OverlayPlacement};
use crate::probe::probe_dimensions;

/// Download the candidate video and watermark image, composite the
/// watermark bottom-right per the overlay calculator, re-encode, and return
/// the resulting MP4 bytes.
pub async fn burn_watermark(
    client: &reqwest::Client,
    video_url: &str,
    watermark_url: &str,
    options: &OverlayOptions,
) -> MediaResult<Vec<u8>> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    let scratch = tempfile::tempdir()?;
    let video_path = scratch.path().join("input.mp4");
    let watermark_path = scratch.path().join("watermark.png");
    let scaled_path = scratch.path().join("watermark_scaled.png");
    let output_path = scratch.path().join("output.mp4");

    download_to_file(client, video_url, &video_path, AssetKind::Video).await?;
    download_to_file(client, watermark_url, &watermark_path, AssetKind::Image).await?;

    let frame = probe_dimensions(&video_path).await?;
    let watermark = probe_dimensions(&watermark_path).await?;
    let placement = place_overlay(frame, watermark, options);

    debug!(
        frame_w = frame.width,
        frame_h = frame.height,
        wm_w = placement.width,
        wm_h = placement.height,
        x = placement.x,
        y = placement.y,
        "Computed watermark placement"
    );

    scale_watermark(&watermark_path, &scaled_path, &placement).await?;
    composite(&video_path, &scaled_path, &output_path, &placement).await?;

    let bytes = tokio::fs::read(&output_path).await?;
    info!(
        video = video_url,
        bytes = bytes.len(),
        "Watermark composited"
    );
    Ok(bytes)
}

/// Resize the watermark to its rendered width, preserving aspect.
async fn scale_watermark(
    input: &Path,
    output: &Path,
    placement: &OverlayPlacement,
) -> MediaResult<()> {
    run_ffmpeg(&[
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-i",
        &input.to_string_lossy(),
        "-vf",
        &format!("scale={}:-1:flags=lanczos", placement.width),
        &output.to_string_lossy(),
    ])
    .await
}

/// Overlay the scaled watermark at the computed position and re-encode.
async fn composite(
    video: &Path,
    watermark: &Path,
    output: &Path,
    placement: &OverlayPlacement,
) -> MediaResult<()> {
    let filter = format!(
        "[1:v]format=rgba[wm];[0:v][wm]overlay={}:{}[v]",
        placement.x, placement.y
    );

    run_ffmpeg(&[
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-i",
        &video.to_string_lossy(),
        "-i",
        &watermark.to_string_lossy(),
        "-filter_complex",
        &filter,
        "-map",
        "[v]",
        "-map",
        "0:a?",
        "-c:v",
        "libx264",
        "-preset",
        "veryfast",
        "-crf",
        "20",
        "-pix_fmt",
        "yuv420p",
        "-c:a",
        "copy",
        "-movflags",
        "+faststart",
        "-shortest",
        &output.to_string_lossy(),
    ])
    .await
}

async fn run_ffmpeg(args: &[&str]) -> MediaResult<()> {
    let output = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::ffmpeg_failed(
            "ffmpeg exited with failure",
            Some(stderr.into_owned()),
            output.status.code(),
        ));
    }
    Ok(())
}
