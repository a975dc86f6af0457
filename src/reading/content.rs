//! Structured result of reading one captured image.

use serde::{Deserialize, Serialize};

use crate::playback::TextVariant;

/// The three texts of a reading plus what the provider reported about them.
///
/// Wire format is the provider's camelCase JSON:
///
/// ```json
/// {
///   "originalText": "Salida 12:00",
///   "simplifiedText": "The exit is at noon.",
///   "translatedText": "La salida es a mediodía.",
///   "language": "Spanish",
///   "confidence": 0.92,
///   "requiresAudit": false
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadingContent {
    /// Text as it appears in the image.
    pub original_text: String,
    /// Plain-language rewrite in the target language.
    pub simplified_text: String,
    /// Translation into the translation language.
    pub translated_text: String,
    /// Language the original text is written in.
    pub language: String,
    /// Extraction confidence in `0.0..=1.0`.
    pub confidence: f32,
    /// The provider flagged the reading for a human check (low legibility,
    /// medication dosage and the like).
    pub requires_audit: bool,
}

impl ReadingContent {
    /// The text of `variant`.
    pub fn text(&self, variant: TextVariant) -> &str {
        match variant {
            TextVariant::Original => &self.original_text,
            TextVariant::Simplified => &self.simplified_text,
            TextVariant::Translated => &self.translated_text,
        }
    }

    /// `true` when no variant carries any text.
    pub fn is_blank(&self) -> bool {
        TextVariant::ALL
            .iter()
            .all(|v| self.text(*v).trim().is_empty())
    }
}
