//! Core `SpeechSynthesizer` trait and the Gemini implementation.
//!
//! [`GeminiSpeechClient`] asks the provider for audio-modality output with
//! one fixed prebuilt voice, pulls the single base64 `inlineData` part out of
//! the first candidate and decodes it as 24 kHz mono 16-bit PCM.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

use crate::audio::{decode_pcm16, DecodedAudio, MalformedAudio};
use crate::config::ProviderConfig;
use crate::provider::{GeminiHttp, ProviderError};

/// Sample rate of the provider's PCM output.
pub const SYNTHESIS_SAMPLE_RATE: u32 = 24_000;

/// Channel count of the provider's PCM output.
pub const SYNTHESIS_CHANNELS: u16 = 1;

// ---------------------------------------------------------------------------
// SynthesisError
// ---------------------------------------------------------------------------

/// Errors that can occur while synthesising speech.
///
/// Everything except [`SynthesisError::MalformedAudio`] is a provider-side
/// failure; see [`SynthesisError::is_malformed_audio`].
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Transport, status or JSON failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The text to speak was empty.
    #[error("nothing to synthesise: text is empty")]
    EmptyText,

    /// The response held no candidate.
    #[error("provider returned no candidate")]
    NoCandidate,

    /// The first candidate had no inline audio part.
    #[error("provider response has no inline audio data")]
    NoAudioPayload,

    /// The inline payload was not valid base64.
    #[error("inline audio is not valid base64: {0}")]
    InvalidBase64(String),

    /// The decoded bytes were not valid 16-bit PCM.
    #[error("malformed audio: {0}")]
    MalformedAudio(#[from] MalformedAudio),
}

impl SynthesisError {
    /// `true` for decode-time structural failures, `false` for provider ones.
    pub fn is_malformed_audio(&self) -> bool {
        matches!(self, SynthesisError::MalformedAudio(_))
    }
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Async trait for text-to-speech backends.
///
/// Implementors must be `Send + Sync` so they can be shared behind
/// `Arc<dyn SpeechSynthesizer>`.  One call performs at most one provider
/// round trip and never retries; callers must not pass empty `text`.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<DecodedAudio, SynthesisError>;
}

// ---------------------------------------------------------------------------
// GeminiSpeechClient
// ---------------------------------------------------------------------------

/// Calls Gemini's `generateContent` with `responseModalities: ["AUDIO"]`.
///
/// The voice comes from [`ProviderConfig::voice`] and is the same for every
/// language and text variant.
pub struct GeminiSpeechClient {
    http: GeminiHttp,
    model: String,
    voice: String,
}

impl GeminiSpeechClient {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            http: GeminiHttp::from_config(config),
            model: config.speech_model.clone(),
            voice: config.voice.clone(),
        }
    }

    /// The fixed voice this client speaks with.
    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// JSON request body for one utterance.
    pub fn request_body(&self, text: &str, language: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "parts": [{
                    "text": format!("Read the following text aloud in {language}, exactly as written:\n\n{text}")
                }]
            }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.voice }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiSpeechClient {
    async fn synthesize(&self, text: &str, language: &str) -> Result<DecodedAudio, SynthesisError> {
        if text.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let body = self.request_body(text, language);
        let json = self.http.generate(&self.model, &body).await?;

        let bytes = extract_audio_payload(&json)?;
        let audio = decode_pcm16(&bytes, SYNTHESIS_SAMPLE_RATE, SYNTHESIS_CHANNELS)?;

        log::info!(
            "tts: {} chars in {language} → {} frames ({:.2}s)",
            text.chars().count(),
            audio.frame_count(),
            audio.duration().as_secs_f32()
        );
        Ok(audio)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Pull the base64 audio out of `candidates[0].content.parts[*].inlineData`
/// and decode it to raw bytes.
///
/// # Errors
///
/// [`SynthesisError::NoCandidate`], [`SynthesisError::NoAudioPayload`] or
/// [`SynthesisError::InvalidBase64`].
pub fn extract_audio_payload(json: &serde_json::Value) -> Result<Vec<u8>, SynthesisError> {
    let candidate = json["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or(SynthesisError::NoCandidate)?;

    let data = candidate["content"]["parts"]
        .as_array()
        .and_then(|parts| {
            parts
                .iter()
                .find_map(|part| part["inlineData"]["data"].as_str())
        })
        .ok_or(SynthesisError::NoAudioPayload)?;

    general_purpose::STANDARD
        .decode(data)
        .map_err(|e| SynthesisError::InvalidBase64(e.to_string()))
}

// ---------------------------------------------------------------------------
// MockSynthesizer  (test-only)
// ---------------------------------------------------------------------------

/// Test double that counts calls and answers with one second of silence.
///
/// * [`hold`](Self::hold) makes calls for a text wait until the returned
///   `Notify` is signalled, to simulate a slow round trip.
/// * [`fail_on`](Self::fail_on) makes calls for a text fail with
///   [`SynthesisError::NoAudioPayload`].
#[cfg(test)]
#[derive(Default)]
pub struct MockSynthesizer {
    calls: std::sync::Mutex<Vec<(String, String)>>,
    held: std::sync::Mutex<std::collections::HashMap<String, std::sync::Arc<tokio::sync::Notify>>>,
    failing: std::sync::Mutex<std::collections::HashSet<String>>,
    malformed: std::sync::Mutex<std::collections::HashSet<String>>,
}

#[cfg(test)]
impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&self, text: &str) -> std::sync::Arc<tokio::sync::Notify> {
        let notify = std::sync::Arc::new(tokio::sync::Notify::new());
        self.held
            .lock()
            .unwrap()
            .insert(text.to_string(), std::sync::Arc::clone(&notify));
        notify
    }

    pub fn fail_on(&self, text: &str) {
        self.failing.lock().unwrap().insert(text.to_string());
    }

    pub fn malformed_on(&self, text: &str) {
        self.malformed.lock().unwrap().insert(text.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> Result<DecodedAudio, SynthesisError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), language.to_string()));

        let gate = self.held.lock().unwrap().get(text).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.lock().unwrap().contains(text) {
            return Err(SynthesisError::NoAudioPayload);
        }
        if self.malformed.lock().unwrap().contains(text) {
            return Ok(decode_pcm16(&[0u8; 3], SYNTHESIS_SAMPLE_RATE, 1)?);
        }

        Ok(decode_pcm16(&vec![0u8; 48_000], SYNTHESIS_SAMPLE_RATE, SYNTHESIS_CHANNELS)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> GeminiSpeechClient {
        GeminiSpeechClient::from_config(&ProviderConfig {
            api_key: Some("test".into()),
            ..ProviderConfig::default()
        })
    }

    fn response_with(parts: serde_json::Value) -> serde_json::Value {
        json!({ "candidates": [{ "content": { "role": "model", "parts": parts } }] })
    }

    // ---- Request shape -----------------------------------------------------

    #[test]
    fn request_asks_for_audio_with_fixed_voice() {
        let body = client().request_body("Hello world", "Spanish");

        assert_eq!(body["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Kore"
        );
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("Hello world"));
        assert!(prompt.contains("Spanish"));
    }

    #[test]
    fn voice_does_not_depend_on_language() {
        let c = client();
        let a = c.request_body("x", "Spanish");
        let b = c.request_body("x", "Thai");
        assert_eq!(a["generationConfig"], b["generationConfig"]);
    }

    // ---- Response parsing --------------------------------------------------

    #[test]
    fn silence_payload_decodes_to_24000_frames() {
        let b64 = general_purpose::STANDARD.encode(vec![0u8; 48_000]);
        let json = response_with(json!([
            { "inlineData": { "mimeType": "audio/L16;codec=pcm;rate=24000", "data": b64 } }
        ]));

        let bytes = extract_audio_payload(&json).unwrap();
        let audio = decode_pcm16(&bytes, SYNTHESIS_SAMPLE_RATE, SYNTHESIS_CHANNELS).unwrap();

        assert_eq!(audio.frame_count(), 24_000);
        assert_eq!(audio.sample_rate(), 24_000);
        assert_eq!(audio.channel(0).len(), 24_000);
        assert!(audio.channel(0).iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn audio_part_found_after_text_part() {
        let b64 = general_purpose::STANDARD.encode([1u8, 0]);
        let json = response_with(json!([
            { "text": "ok" },
            { "inlineData": { "data": b64 } }
        ]));
        assert_eq!(extract_audio_payload(&json).unwrap(), vec![1, 0]);
    }

    #[test]
    fn missing_inline_data_is_no_audio_payload() {
        let json = response_with(json!([{ "text": "I cannot speak that" }]));
        assert!(matches!(
            extract_audio_payload(&json),
            Err(SynthesisError::NoAudioPayload)
        ));
    }

    #[test]
    fn missing_parts_is_no_audio_payload() {
        let json = json!({ "candidates": [{ "finishReason": "SAFETY" }] });
        assert!(matches!(
            extract_audio_payload(&json),
            Err(SynthesisError::NoAudioPayload)
        ));
    }

    #[test]
    fn empty_candidates_is_no_candidate() {
        assert!(matches!(
            extract_audio_payload(&json!({ "candidates": [] })),
            Err(SynthesisError::NoCandidate)
        ));
        assert!(matches!(
            extract_audio_payload(&json!({})),
            Err(SynthesisError::NoCandidate)
        ));
    }

    #[test]
    fn bad_base64_is_reported() {
        let json = response_with(json!([{ "inlineData": { "data": "***" } }]));
        assert!(matches!(
            extract_audio_payload(&json),
            Err(SynthesisError::InvalidBase64(_))
        ));
    }

    // ---- Error classification ----------------------------------------------

    #[test]
    fn only_malformed_audio_is_classified_as_malformed() {
        assert!(SynthesisError::from(MalformedAudio::OddByteLength { len: 3 }).is_malformed_audio());
        assert!(!SynthesisError::NoAudioPayload.is_malformed_audio());
        assert!(!SynthesisError::from(ProviderError::Timeout).is_malformed_audio());
    }

    #[tokio::test]
    async fn empty_text_is_rejected_without_request() {
        let err = client().synthesize("", "English").await.unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyText));
    }

    #[test]
    fn client_is_object_safe() {
        let synth: Box<dyn SpeechSynthesizer> = Box::new(client());
        drop(synth);
    }
}
