//! Overlay geometry: size and anchor a watermark inside a frame.
//!
//! The watermark scales with the shorter side of the frame so it stays
//! legible and proportionate across output resolutions, clamped to a pixel
//! floor and ceiling, and anchored by its bottom-right corner a fixed
//! padding inset from the frame edges.

use serde::{Deserialize, Serialize};

/// Pixel dimensions of a frame or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn shorter_side(&self) -> u32 {
        self.width.min(self.height)
    }
}

/// Tunables for watermark sizing and placement.
#[derive(Debug, Clone, Copy)]
pub struct OverlayOptions {
    /// Fraction of the frame's shorter side used as the target width
    pub scale: f64,
    /// Inset from the right and bottom edges, in pixels
    pub padding: u32,
    /// Width floor, in pixels
    pub min_width: u32,
    /// Width ceiling, in pixels
    pub max_width: u32,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            scale: 0.18,
            padding: 32,
            min_width: 96,
            max_width: 320,
        }
    }
}

impl OverlayOptions {
    /// Read tunables from the environment, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scale: std::env::var("WATERMARK_SCALE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.scale),
            padding: std::env::var("WATERMARK_PAD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.padding),
            min_width: std::env::var("WATERMARK_MIN_PX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_width),
            max_width: std::env::var("WATERMARK_MAX_PX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_width),
        }
    }
}

/// Computed watermark geometry in the frame's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPlacement {
    /// Rendered watermark width
    pub width: u32,
    /// Rendered watermark height (aspect-preserving)
    pub height: u32,
    /// Left edge of the watermark
    pub x: i64,
    /// Top edge of the watermark
    pub y: i64,
}

/// Compute the watermark's rendered size and position for a frame.
///
/// `width = clamp(round(shorter_side × scale), min, max)`; the height
/// preserves the watermark's own aspect ratio; the bottom-right corner sits
/// `padding` pixels in from the frame's right and bottom edges. Coordinates
/// can go negative for degenerate frames smaller than the clamped watermark;
/// callers get exactly what the arithmetic says.
pub fn place_overlay(
    frame: Dimensions,
    watermark: Dimensions,
    options: &OverlayOptions,
) -> OverlayPlacement {
    let target = (frame.shorter_side() as f64 * options.scale).round() as u32;
    let width = target.min(options.max_width).max(options.min_width);

    let aspect = watermark.width.max(1) as f64 / watermark.height.max(1) as f64;
    let height = ((width as f64) / aspect).round().max(1.0) as u32;

    let x = frame.width as i64 - width as i64 - options.padding as i64;
    let y = frame.height as i64 - height as i64 - options.padding as i64;

    OverlayPlacement {
        width,
        height,
        x,
        y,
    }
}
