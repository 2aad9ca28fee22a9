//! Output video spec: aspect ratio, clip duration, resolution.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target aspect ratio of the generated clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    /// Vertical short-form (stories/reels)
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Square => "1:1",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supported clip durations. The base-video vendor only renders these two
/// lengths, and the narration planner's word caps are derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum ClipDuration {
    #[default]
    #[serde(rename = "5s")]
    Five,
    #[serde(rename = "9s")]
    Nine,
}

impl ClipDuration {
    pub fn as_secs(&self) -> u32 {
        match self {
            ClipDuration::Five => 5,
            ClipDuration::Nine => 9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClipDuration::Five => "5s",
            ClipDuration::Nine => "9s",
        }
    }
}

impl fmt::Display for ClipDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target resolution label passed through to the base-video vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Resolution {
    #[serde(rename = "540p")]
    P540,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P540 => "540p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Requested shape of the output video.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
pub struct VideoSpec {
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub duration: ClipDuration,
    #[serde(default)]
    pub resolution: Resolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let spec = VideoSpec::default();
        assert_eq!(spec.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(spec.duration, ClipDuration::Five);
        assert_eq!(spec.resolution, Resolution::P720);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(VideoSpec::default()).unwrap();
        assert_eq!(json["aspect_ratio"], "9:16");
        assert_eq!(json["duration"], "5s");
        assert_eq!(json["resolution"], "720p");
    }

    #[test]
    fn test_duration_seconds() {
        assert_eq!(ClipDuration::Five.as_secs(), 5);
        assert_eq!(ClipDuration::Nine.as_secs(), 9);
    }
}
