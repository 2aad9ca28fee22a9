//! FFmpeg CLI wrapper for the final compositing stage.
//!
//! This crate owns the two local pieces of the pipeline that touch pixels:
//! - the overlay geometry calculator (pure arithmetic), and
//! - the watermark burner: download the final candidate and the watermark,
//!   composite bottom-right, re-encode, return the bytes.

pub mod error;
pub mod fetch;
pub mod overlay;
pub mod probe;
pub mod watermark;

pub use error::{MediaError, MediaResult};
pub use fetch::{download_to_file, AssetKind};
pub use overlay::{place_overlay, Dimensions, OverlayOptions, OverlayPlacement};
pub use probe::probe_dimensions;
pub use watermark::burn_watermark;
