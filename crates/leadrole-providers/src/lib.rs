//! HTTP clients for the external generation vendors.
//!
//! Every vendor follows the same shape: start an operation, then poll it to
//! a terminal state under a wall-clock timeout. The poll loop lives in one
//! place (`poll`); each client only knows its wire format.

pub mod dream;
pub mod error;
pub mod poll;
pub mod speech;
pub mod transform;

pub use dream::{DreamClient, DreamConfig, DreamState, Generation, GenerationAssets};
pub use error::{ProviderError, ProviderResult};
pub use poll::{poll_until_terminal, PollConfig};
pub use speech::{SpeechClient, SpeechConfig};
pub use transform::{
    extract_video_url, Prediction, PredictionStatus, TransformClient, TransformConfig,
};
