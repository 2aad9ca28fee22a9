//! Voice profile resolution for narrated jobs.
//!
//! A closed mapping from (gender, style) to a named profile; an explicit
//! caller-supplied profile always wins.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Persona gender as stored on the persona record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Delivery style of a narration track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NarrationStyle {
    Narration,
    Storytelling,
}

fn mentions_story(value: &str) -> bool {
    value.to_ascii_lowercase().contains("story")
}

impl NarrationStyle {
    /// Derive the style from the free-form request fields: a story flavor in
    /// the requested style wins, then one in the requested profile name,
    /// otherwise plain narration.
    pub fn from_request(style: Option<&str>, voice_profile: Option<&str>) -> Self {
        if style.map(mentions_story).unwrap_or(false) {
            return NarrationStyle::Storytelling;
        }
        if voice_profile.map(mentions_story).unwrap_or(false) {
            return NarrationStyle::Storytelling;
        }
        NarrationStyle::Narration
    }
}

/// Named synthesizer voice profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum VoiceProfile {
    NarrationMale,
    NarrationFemale,
    StoryMale,
    StoryFemale,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown voice profile: {0}")]
pub struct UnknownVoiceProfile(pub String);

impl VoiceProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceProfile::NarrationMale => "NarrationMale",
            VoiceProfile::NarrationFemale => "NarrationFemale",
            VoiceProfile::StoryMale => "StoryMale",
            VoiceProfile::StoryFemale => "StoryFemale",
        }
    }

    /// Closed (gender, style) mapping. Anything that is not explicitly
    /// female resolves to the male voice of the requested style.
    pub fn resolve(gender: Gender, style: NarrationStyle) -> Self {
        match (style, gender) {
            (NarrationStyle::Storytelling, Gender::Female) => VoiceProfile::StoryFemale,
            (NarrationStyle::Storytelling, _) => VoiceProfile::StoryMale,
            (NarrationStyle::Narration, Gender::Female) => VoiceProfile::NarrationFemale,
            (NarrationStyle::Narration, _) => VoiceProfile::NarrationMale,
        }
    }
}

impl FromStr for VoiceProfile {
    type Err = UnknownVoiceProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NarrationMale" => Ok(VoiceProfile::NarrationMale),
            "NarrationFemale" => Ok(VoiceProfile::NarrationFemale),
            "StoryMale" => Ok(VoiceProfile::StoryMale),
            "StoryFemale" => Ok(VoiceProfile::StoryFemale),
            other => Err(UnknownVoiceProfile(other.to_string())),
        }
    }
}

impl fmt::Display for VoiceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_mapping() {
        assert_eq!(
            VoiceProfile::resolve(Gender::Female, NarrationStyle::Storytelling),
            VoiceProfile::StoryFemale
        );
        assert_eq!(
            VoiceProfile::resolve(Gender::Male, NarrationStyle::Narration),
            VoiceProfile::NarrationMale
        );
        // "other" falls back to the male voice
        assert_eq!(
            VoiceProfile::resolve(Gender::Other, NarrationStyle::Storytelling),
            VoiceProfile::StoryMale
        );
    }

    #[test]
    fn test_style_from_request() {
        assert_eq!(
            NarrationStyle::from_request(Some("storytelling"), None),
            NarrationStyle::Storytelling
        );
        assert_eq!(
            NarrationStyle::from_request(Some("A Story about us"), None),
            NarrationStyle::Storytelling
        );
        assert_eq!(
            NarrationStyle::from_request(None, Some("StoryFemale")),
            NarrationStyle::Storytelling
        );
        assert_eq!(
            NarrationStyle::from_request(Some("calm"), Some("NarrationMale")),
            NarrationStyle::Narration
        );
        assert_eq!(
            NarrationStyle::from_request(None, None),
            NarrationStyle::Narration
        );
    }

    #[test]
    fn test_profile_round_trip() {
        for profile in [
            VoiceProfile::NarrationMale,
            VoiceProfile::NarrationFemale,
            VoiceProfile::StoryMale,
            VoiceProfile::StoryFemale,
        ] {
            assert_eq!(profile.as_str().parse::<VoiceProfile>().unwrap(), profile);
        }
        assert!("narrator_male".parse::<VoiceProfile>().is_err());
    }
}
