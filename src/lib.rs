//! Reading aid. Reads the text in a captured image and speaks it aloud.
//!
//! ```text
//! CapturedImage ─▶ vision::ContentExtractor ─▶ reading::ReadingContent
//!                                                   │ original / simplified / translated
//!                                                   ▼
//!                 reading::ReadingSession::play(variant)
//!                                                   │
//!                 playback::PlaybackController ─────┼─▶ playback::AudioCache
//!                                                   ├─▶ tts::SpeechSynthesizer ─▶ audio::decode_pcm16
//!                                                   └─▶ playback::AudioSessionManager
//!                                                          └─▶ audio::OutputContext (cpal) ─▶ speaker
//! ```

pub mod audio;
pub mod config;
pub mod playback;
pub mod provider;
pub mod reading;
pub mod tts;
pub mod vision;
