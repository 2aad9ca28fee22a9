//! Persona records: the face and voice identity a job renders.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Gender;

/// A stored persona, keyed by owner id in the record store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Persona {
    /// Used to pick a voice when no explicit profile is requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,

    /// Public URL of the face reference image used as the transform source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_kit_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Persona {
    /// Gender coerced for voice resolution; missing or unspecified values
    /// resolve to the male voices.
    pub fn voice_gender(&self) -> Gender {
        self.gender.unwrap_or(Gender::Male)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_gender_defaults_to_male() {
        assert_eq!(Persona::default().voice_gender(), Gender::Male);
        let p = Persona {
            gender: Some(Gender::Female),
            ..Default::default()
        };
        assert_eq!(p.voice_gender(), Gender::Female);
    }
}
