//! Core `ContentExtractor` trait and the Gemini implementation.
//!
//! [`GeminiExtractor`] sends the captured image inline (base64) with the
//! extraction prompt and asks for a JSON response, which is parsed straight
//! into [`ReadingContent`].  Translation is a plain text round trip.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ProviderConfig;
use crate::provider::{GeminiHttp, ProviderError};
use crate::reading::ReadingContent;

use super::image::CapturedImage;
use super::prompt::{extraction_prompt, translation_prompt};

// ---------------------------------------------------------------------------
// ExtractionError
// ---------------------------------------------------------------------------

/// Errors that can occur while reading an image or translating its text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Transport, status or JSON failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The image file could not be read.
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    /// The file extension does not name a supported image format.
    #[error("unsupported image type: {0}")]
    UnsupportedImage(String),

    /// The image has no bytes.
    #[error("image is empty")]
    EmptyImage,

    /// The provider returned no text part.
    #[error("provider returned an empty response")]
    EmptyResponse,

    /// The text part was not the expected JSON object.
    #[error("failed to parse reading content: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// ContentExtractor trait
// ---------------------------------------------------------------------------

/// Async trait for image-to-text readers.
///
/// Implementors must be `Send + Sync` so they can be shared behind
/// `Arc<dyn ContentExtractor>`.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Read `image`, simplifying into `target_language` and translating into
    /// `translation_language`.
    async fn extract(
        &self,
        image: &CapturedImage,
        target_language: &str,
        translation_language: &str,
    ) -> Result<ReadingContent, ExtractionError>;

    /// Translate `text` into `language`.
    async fn translate(&self, text: &str, language: &str) -> Result<String, ExtractionError>;
}

// ---------------------------------------------------------------------------
// GeminiExtractor
// ---------------------------------------------------------------------------

/// Calls Gemini's `generateContent` with the vision model.
pub struct GeminiExtractor {
    http: GeminiHttp,
    model: String,
}

impl GeminiExtractor {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            http: GeminiHttp::from_config(config),
            model: config.vision_model.clone(),
        }
    }

    /// JSON request body for reading `image`.
    pub fn extraction_body(
        &self,
        image: &CapturedImage,
        target_language: &str,
        translation_language: &str,
    ) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": extraction_prompt(target_language, translation_language) },
                    {
                        "inline_data": {
                            "mime_type": image.mime_type,
                            "data": image.to_base64()
                        }
                    }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json"
            }
        })
    }

    /// JSON request body for translating `text`.
    pub fn translation_body(&self, text: &str, language: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": translation_prompt(text, language) }]
            }]
        })
    }
}

#[async_trait]
impl ContentExtractor for GeminiExtractor {
    async fn extract(
        &self,
        image: &CapturedImage,
        target_language: &str,
        translation_language: &str,
    ) -> Result<ReadingContent, ExtractionError> {
        if image.bytes.is_empty() {
            return Err(ExtractionError::EmptyImage);
        }

        let body = self.extraction_body(image, target_language, translation_language);
        let json = self.http.generate(&self.model, &body).await?;
        let content = parse_reading_content(&response_text(&json)?)?;

        log::info!(
            "vision: read {} chars of {} (confidence {:.2}{})",
            content.original_text.chars().count(),
            if content.language.is_empty() { "unknown language" } else { content.language.as_str() },
            content.confidence,
            if content.requires_audit { ", needs audit" } else { "" }
        );
        Ok(content)
    }

    async fn translate(&self, text: &str, language: &str) -> Result<String, ExtractionError> {
        let body = self.translation_body(text, language);
        let json = self.http.generate(&self.model, &body).await?;
        let translated = response_text(&json)?;

        log::info!("vision: translated {} chars into {language}", text.chars().count());
        Ok(translated)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Concatenate the text parts of `candidates[0]`, skipping thought parts.
///
/// # Errors
///
/// [`ExtractionError::EmptyResponse`] when there is no non-blank text.
pub fn response_text(json: &serde_json::Value) -> Result<String, ExtractionError> {
    let text: String = json["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter(|part| !part["thought"].as_bool().unwrap_or(false))
                .filter_map(|part| part["text"].as_str())
                .collect()
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    Ok(text.to_string())
}

/// Parse the model's JSON answer.  A surrounding Markdown code fence is
/// tolerated; confidence is clamped into `0.0..=1.0`.
pub fn parse_reading_content(text: &str) -> Result<ReadingContent, ExtractionError> {
    let json = strip_code_fence(text);
    let mut content: ReadingContent =
        serde_json::from_str(json).map_err(|e| ExtractionError::Parse(e.to_string()))?;
    content.confidence = content.confidence.clamp(0.0, 1.0);
    Ok(content)
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the info string ("json") up to the first newline
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ---------------------------------------------------------------------------
// MockExtractor  (test-only)
// ---------------------------------------------------------------------------

/// Test double that returns fixed content and tags translations with the
/// target language (`"[German] text"`).
#[cfg(test)]
pub struct MockExtractor {
    content: Option<ReadingContent>,
}

#[cfg(test)]
impl MockExtractor {
    pub fn new(content: ReadingContent) -> Self {
        Self {
            content: Some(content),
        }
    }

    /// Every call fails with [`ExtractionError::EmptyResponse`].
    pub fn failing() -> Self {
        Self { content: None }
    }
}

#[cfg(test)]
#[async_trait]
impl ContentExtractor for MockExtractor {
    async fn extract(
        &self,
        _image: &CapturedImage,
        _target_language: &str,
        _translation_language: &str,
    ) -> Result<ReadingContent, ExtractionError> {
        self.content.clone().ok_or(ExtractionError::EmptyResponse)
    }

    async fn translate(&self, text: &str, language: &str) -> Result<String, ExtractionError> {
        match self.content {
            Some(_) => Ok(format!("[{language}] {text}")),
            None => Err(ExtractionError::EmptyResponse),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
