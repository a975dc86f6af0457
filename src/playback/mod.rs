//! Playback module: variant audio on demand, cached, one voice at a time.
//!
//! # Architecture
//!
//! ```text
//! ReadingSession::play(variant)
//!        │
//!        ▼
//! PlaybackController::play(variant, text, language)
//!        │
//!        ├─ AudioCache::get(CacheKey)            hit → skip synthesis
//!        ├─ SpeechSynthesizer::synthesize         miss → Loading(variant)
//!        ├─ AudioSessionManager::acquire_context  open / resume once
//!        └─ OutputContext::start → VoiceHandle    → Playing(variant)
//!
//! watch::Receiver<PlaybackState>  ←─── observed by the UI / CLI
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reading_aid::audio::CpalBackend;
//! use reading_aid::config::AppConfig;
//! use reading_aid::playback::{PlaybackController, TextVariant};
//! use reading_aid::tts::GeminiSpeechClient;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::load().unwrap_or_default();
//!     let controller = PlaybackController::new(
//!         Arc::new(GeminiSpeechClient::from_config(&config.provider)),
//!         Arc::new(CpalBackend::new(config.audio.output_device.clone())),
//!         config.audio.output_sample_rate,
//!     );
//!
//!     controller
//!         .play(TextVariant::Simplified, "The bus leaves at noon.", "English")
//!         .await
//!         .unwrap();
//!     controller.wait_until_idle().await;
//!     controller.close().await;
//! }
//! ```

pub mod cache;
pub mod controller;
pub mod session;
pub mod state;

pub use cache::{AudioCache, CacheKey};
pub use controller::{
    ErrorKind, PlayOutcome, PlaybackController, PlaybackError, PLAYBACK_FAILED_NOTICE,
};
pub use session::AudioSessionManager;
pub use state::{PlaybackState, TextVariant};
