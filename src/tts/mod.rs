//! Speech synthesis: text + language → decoded 24 kHz mono audio.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use reading_aid::config::AppConfig;
//! use reading_aid::tts::{GeminiSpeechClient, SpeechSynthesizer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::load().unwrap();
//!     let client = GeminiSpeechClient::from_config(&config.provider);
//!
//!     let audio = client.synthesize("Hello world", "Spanish").await.unwrap();
//!     println!("{} frames @ {} Hz", audio.frame_count(), audio.sample_rate());
//! }
//! ```

pub mod synthesizer;

pub use synthesizer::{
    extract_audio_payload, GeminiSpeechClient, SpeechSynthesizer, SynthesisError,
    SYNTHESIS_CHANNELS, SYNTHESIS_SAMPLE_RATE,
};

// test-only re-export so the playback tests can import MockSynthesizer
// without `use crate::tts::synthesizer::MockSynthesizer`.
#[cfg(test)]
pub use synthesizer::MockSynthesizer;
