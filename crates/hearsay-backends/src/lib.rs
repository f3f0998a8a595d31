//! External service abstraction.
//!
//! Each remote capability sits behind a single-method trait so the pipeline
//! never inspects provider responses beyond the documented contracts, and a
//! provider swap is a construction-time change only.

use std::time::Duration;

use async_trait::async_trait;

use hearsay_core::error::{HearsayError, Result};

pub mod google;

/// Raw sentiment numbers as returned by a scoring backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    pub score: f32,
    pub magnitude: f32,
}

/// Inline audio attached to a generative request.
#[derive(Debug, Clone)]
pub struct AudioPart {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Input to a generative call: an instruction, optionally with audio.
#[derive(Debug, Clone)]
pub struct GenerateParts {
    pub audio: Option<AudioPart>,
    pub instruction: String,
}

impl GenerateParts {
    /// Text-only request.
    pub fn text(instruction: impl Into<String>) -> Self {
        Self {
            audio: None,
            instruction: instruction.into(),
        }
    }

    /// Audio plus instruction request.
    pub fn with_audio(mime_type: impl Into<String>, data: Vec<u8>, instruction: impl Into<String>) -> Self {
        Self {
            audio: Some(AudioPart {
                mime_type: mime_type.into(),
                data,
            }),
            instruction: instruction.into(),
        }
    }
}

/// Speech-to-text backend for linear PCM audio.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Backend identifier used in error messages and logs.
    fn name(&self) -> &str;

    /// Transcribe a complete WAV recording. Zero recognition results map to
    /// [`HearsayError::NoSpeechDetected`]; multiple segments are joined with
    /// newlines in returned order.
    async fn recognize(&self, wav: &[u8]) -> Result<String>;
}

/// Text-to-speech backend.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// Render `text` to encoded audio bytes.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Sentiment scoring backend.
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, text: &str) -> Result<SentimentScore>;
}

/// Generative multimodal backend.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn name(&self) -> &str;

    /// Run one generation call and return the concatenated response text.
    async fn generate(&self, parts: GenerateParts) -> Result<String>;
}

/// Build the HTTP client shared by a backend, with the per-call timeout
/// that bounds every suspension point.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Map a transport-level failure to a named backend error.
pub(crate) fn transport_err(backend: &str, err: reqwest::Error) -> HearsayError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    HearsayError::backend(backend, message)
}

/// Surface a non-2xx response as a named backend error with the body kept.
pub(crate) async fn check_status(backend: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(HearsayError::backend(
        backend,
        format!("API error {status}: {body}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_parts_text_only() {
        let parts = GenerateParts::text("summarize this");
        assert!(parts.audio.is_none());
        assert_eq!(parts.instruction, "summarize this");
    }

    #[test]
    fn test_generate_parts_with_audio() {
        let parts = GenerateParts::with_audio("audio/wav", vec![1, 2, 3], "transcribe");
        let audio = parts.audio.unwrap();
        assert_eq!(audio.mime_type, "audio/wav");
        assert_eq!(audio.data, vec![1, 2, 3]);
    }
}
