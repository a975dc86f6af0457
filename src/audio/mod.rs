//! Audio layer: PCM decoding → device format conversion → speaker output.
//!
//! # Pipeline
//!
//! ```text
//! provider PCM bytes → decode_pcm16 → DecodedAudio (Arc)
//!                   → OutputContext::start → resample / mono_to_interleaved
//!                   → cpal output callback → speaker
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reading_aid::audio::{decode_pcm16, CpalBackend, OutputBackend};
//!
//! # async fn demo() {
//! let audio = decode_pcm16(&vec![0u8; 48_000], 24_000, 1).unwrap();
//! let context = CpalBackend::default().open(24_000).unwrap();
//! let prepared = context.prepare(Arc::new(audio));
//! let mut voice = context.start(prepared).unwrap();
//! let _ = voice.take_completion().unwrap().await; // one second of silence
//! context.close().unwrap();
//! # }
//! ```

pub mod output;
pub mod pcm;
pub mod resample;

pub use output::{
    ContextState, CpalBackend, CpalContext, OutputBackend, OutputContext, OutputError,
    PreparedVoice, VoiceHandle, VoiceSignal,
};
pub use pcm::{decode_pcm16, DecodedAudio, MalformedAudio};
pub use resample::{mono_to_interleaved, resample};

#[cfg(test)]
pub use output::{MockOutputBackend, MockOutputContext};
