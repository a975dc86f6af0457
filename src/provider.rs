//! Shared REST plumbing for the Gemini `generateContent` endpoint.
//!
//! Both the speech client ([`crate::tts`]) and the content extractor
//! ([`crate::vision`]) post a JSON body to
//! `{base_url}/v1beta/models/{model}:generateContent` and read back a JSON
//! document.  [`GeminiHttp`] owns the `reqwest::Client` and the credentials;
//! the callers own the request shape and the response parsing.

use thiserror::Error;

use crate::config::ProviderConfig;

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// Transport-level failures talking to the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No API key in the config nor in `$GEMINI_API_KEY`.
    #[error("no API key configured")]
    MissingApiKey,

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("provider request timed out")]
    Timeout,

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not valid JSON.
    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// GeminiHttp
// ---------------------------------------------------------------------------

/// Thin `generateContent` caller.  Cheap to clone (`reqwest::Client` is an
/// `Arc` internally).
#[derive(Debug, Clone)]
pub struct GeminiHttp {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiHttp {
    /// Build from provider config.  The HTTP client carries the per-request
    /// timeout from `config.timeout_secs`.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.resolved_api_key(),
        }
    }

    /// Endpoint URL for `model`.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    /// POST `body` to `model`'s `generateContent` endpoint and return the
    /// decoded JSON response.  Exactly one request is sent; no retries.
    pub async fn generate(
        &self,
        model: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
