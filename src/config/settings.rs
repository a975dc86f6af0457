//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every field has a serde default, so a partial `settings.toml` written by
//! an older version still loads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Environment variable consulted when `provider.api_key` is unset.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

// ---------------------------------------------------------------------------
// ProviderConfig
// ---------------------------------------------------------------------------

/// Connection settings for the multimodal AI provider (speech + vision).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the Gemini-compatible API.
    pub base_url: String,
    /// API key; falls back to `$GEMINI_API_KEY` when `None` or empty.
    pub api_key: Option<String>,
    /// Model used for text-to-speech (audio output modality).
    pub speech_model: String,
    /// Model used for image text extraction and translation.
    pub vision_model: String,
    /// Prebuilt voice used for every utterance, whatever the language.
    pub voice: String,
    /// Maximum seconds to wait for a provider response.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: None,
            speech_model: "gemini-2.5-flash-preview-tts".into(),
            vision_model: "gemini-2.5-flash".into(),
            voice: "Kore".into(),
            timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    /// The configured API key, or `$GEMINI_API_KEY` when none is configured.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Speaker output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Rate the output context is opened at; matches the 24 kHz synthesis
    /// output so no resampling is needed on capable devices.
    pub output_sample_rate: u32,
    /// Output device name; `None` means the system default.
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_sample_rate: 24_000,
            output_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ReadingConfig
// ---------------------------------------------------------------------------

/// Language preferences for reading sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingConfig {
    /// Language the extracted text is simplified into and spoken in.
    pub target_language: String,
    /// Language last chosen for translation.  `None` uses `target_language`.
    pub translation_language: Option<String>,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            target_language: "English".into(),
            translation_language: None,
        }
    }
}

impl ReadingConfig {
    /// The language the translated variant should be produced in.
    pub fn effective_translation_language(&self) -> &str {
        self.translation_language
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.target_language)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use reading_aid::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let mut config = AppConfig::load().unwrap();
/// config.reading.target_language = "Spanish".into();
/// config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// AI provider connection settings.
    pub provider: ProviderConfig,
    /// Speaker output settings.
    pub audio: AudioConfig,
    /// Language preferences.
    pub reading: ReadingConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario).
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
