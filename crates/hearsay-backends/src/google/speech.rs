//! Google Cloud Speech-to-Text provider.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use hearsay_core::error::{HearsayError, Result};

use crate::{check_status, http_client, transport_err, SpeechRecognizer};

const DEFAULT_BASE_URL: &str = "https://speech.googleapis.com";
const BACKEND: &str = "speech";

pub struct GoogleSpeech {
    base_url: String,
    api_key: String,
    sample_rate: u32,
    language: String,
    client: reqwest::Client,
}

// --- Speech request/response types ---

#[derive(Debug, Serialize)]
struct RecognizeRequest {
    config: RecognitionConfig,
    audio: RecognitionAudio,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: String,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    /// Base64 audio bytes.
    content: String,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<SpeechResult>,
}

#[derive(Debug, Deserialize)]
struct SpeechResult {
    #[serde(default)]
    alternatives: Vec<SpeechAlternative>,
}

#[derive(Debug, Deserialize)]
struct SpeechAlternative {
    #[serde(default)]
    transcript: String,
}

/// Join the top alternative of each result segment with newlines, in
/// returned order. `None` when the backend recognized nothing.
fn join_transcripts(response: &RecognizeResponse) -> Option<String> {
    let segments: Vec<&str> = response
        .results
        .iter()
        .filter_map(|r| r.alternatives.first())
        .map(|a| a.transcript.as_str())
        .filter(|t| !t.is_empty())
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("\n"))
}

impl GoogleSpeech {
    pub fn new(
        api_key: String,
        base_url: Option<&str>,
        sample_rate: u32,
        language: String,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            sample_rate,
            language,
            client: http_client(timeout),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for GoogleSpeech {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn recognize(&self, wav: &[u8]) -> Result<String> {
        let body = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: self.sample_rate,
                language_code: self.language.clone(),
            },
            audio: RecognitionAudio {
                content: base64::engine::general_purpose::STANDARD.encode(wav),
            },
        };

        let url = format!("{}/v1/speech:recognize?key={}", self.base_url, self.api_key);
        debug!(bytes = wav.len(), language = %self.language, "Recognizing speech");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_err(BACKEND, e))?;
        let resp = check_status(BACKEND, resp).await?;

        let parsed: RecognizeResponse = resp
            .json()
            .await
            .map_err(|e| transport_err(BACKEND, e))?;

        // Zero results means the recording held no speech; callers treat
        // this differently from an infrastructure failure.
        join_transcripts(&parsed).ok_or(HearsayError::NoSpeechDetected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_transcripts_multi_segment() {
        let response: RecognizeResponse = serde_json::from_str(
            r#"{"results":[
                {"alternatives":[{"transcript":"hello there"},{"transcript":"hallo"}]},
                {"alternatives":[{"transcript":"second segment"}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            join_transcripts(&response).as_deref(),
            Some("hello there\nsecond segment")
        );
    }

    #[test]
    fn test_zero_results_is_none() {
        let response: RecognizeResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(join_transcripts(&response).is_none());

        let response: RecognizeResponse =
            serde_json::from_str(r#"{"results":[{"alternatives":[]}]}"#).unwrap();
        assert!(join_transcripts(&response).is_none());
    }

    #[test]
    fn test_request_serialization_camel_case() {
        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: 16_000,
                language_code: "en-US".into(),
            },
            audio: RecognitionAudio {
                content: "AAAA".into(),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["config"]["sampleRateHertz"], 16_000);
        assert_eq!(json["config"]["languageCode"], "en-US");
        assert_eq!(json["config"]["encoding"], "LINEAR16");
        assert_eq!(json["audio"]["content"], "AAAA");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_backend_error() {
        let speech = GoogleSpeech::new(
            "test-key".into(),
            Some("http://127.0.0.1:1"),
            16_000,
            "en-US".into(),
            Duration::from_millis(500),
        );
        let err = speech.recognize(b"RIFF").await.unwrap_err();
        assert_eq!(err.kind(), "backend_error");
    }
}
