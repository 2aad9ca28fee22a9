//! Narration fitting: turn free text into a speakable, time-boxed script.
//!
//! The planner caps word count to what fits the clip duration and computes
//! the speaking-rate multiplier a speech synthesizer should apply so the
//! remaining words fill the visual duration. Pure and deterministic: the
//! same inputs always produce a byte-identical plan.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ClipDuration;

/// Words per second of confident speech, by language tag.
const WORDS_PER_SECOND: &[(&str, f64)] = &[
    ("en", 2.4),
    ("en-US", 2.4),
    ("ur", 2.1),
    ("ur-PK", 2.1),
    ("hi", 2.1),
];

/// Rate assumed for languages missing from the table.
const DEFAULT_WORDS_PER_SECOND: f64 = 2.3;

/// Headroom reserved so synthesized speech does not overrun the visuals.
pub const DEFAULT_SOFTNESS: f64 = 0.92;

pub const MIN_SPEAKING_RATE: f64 = 0.5;
pub const MAX_SPEAKING_RATE: f64 = 1.5;

pub type NarrationResult<T> = Result<T, NarrationError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NarrationError {
    #[error("narration too long: {provided} words exceeds the cap of {max_words}")]
    TooLong { max_words: usize, provided: usize },
}

/// A trimmed, validated narration script with its synthesis parameters.
///
/// Recomputed from its inputs, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrationPlan {
    /// Resolved language key (exact tag or primary subtag)
    pub language: String,
    /// Visual duration the script must fit
    pub duration_seconds: u32,
    /// Words kept in the final script
    pub word_count: usize,
    /// Cap derived from the language rate and duration
    pub max_words: usize,
    /// Synthesizer rate multiplier, clamped to [0.5, 1.5]
    pub speaking_rate: f64,
    /// Whether the input was truncated to fit
    pub trimmed: bool,
    /// Final whitespace-normalized script
    pub text: String,
}

/// Planner knobs.
#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    /// Fail instead of truncating when the text exceeds the cap
    pub strict: bool,
    /// Fraction of the theoretical capacity to actually use
    pub softness: f64,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            strict: false,
            softness: DEFAULT_SOFTNESS,
        }
    }
}

impl PlanOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

/// Resolve a words-per-second rate: exact tag match, else primary subtag,
/// else the default rate. Returns the resolved key alongside the rate.
fn words_per_second(language: &str) -> (String, f64) {
    let lookup = |tag: &str| {
        WORDS_PER_SECOND
            .iter()
            .find(|(key, _)| *key == tag)
            .map(|(_, rate)| *rate)
    };

    if let Some(rate) = lookup(language) {
        return (language.to_string(), rate);
    }

    let primary = language
        .split('-')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("en");

    let rate = lookup(primary).unwrap_or(DEFAULT_WORDS_PER_SECOND);
    (primary.to_string(), rate)
}

fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// Compute a narration plan for the given text, duration, and language.
///
/// Splits on whitespace, caps the word count at
/// `floor(rate × duration × softness)`, and either fails (`strict`) or
/// truncates when the input exceeds the cap. The speaking rate is chosen so
/// the kept words fill the visual duration, clamped to the human range.
pub fn plan_narration(
    text: &str,
    duration: ClipDuration,
    language: &str,
    options: &PlanOptions,
) -> NarrationResult<NarrationPlan> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let (language, rate) = words_per_second(language);
    let duration_seconds = duration.as_secs();

    let capacity = rate * duration_seconds as f64;
    let max_words = (capacity * options.softness).floor() as usize;

    let mut trimmed = false;
    let mut kept = words;

    if kept.len() > max_words {
        if options.strict {
            return Err(NarrationError::TooLong {
                max_words,
                provided: kept.len(),
            });
        }
        kept.truncate(max_words);
        trimmed = true;
    }

    let speaking_rate = clamp(
        kept.len() as f64 / capacity,
        MIN_SPEAKING_RATE,
        MAX_SPEAKING_RATE,
    );

    Ok(NarrationPlan {
        language,
        duration_seconds,
        word_count: kept.len(),
        max_words,
        speaking_rate,
        trimmed,
        text: kept.join(" "),
    })
}
