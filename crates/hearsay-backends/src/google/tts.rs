//! Google Cloud Text-to-Speech provider.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use hearsay_core::error::{HearsayError, Result};

use crate::{check_status, http_client, transport_err, VoiceSynthesizer};

const DEFAULT_BASE_URL: &str = "https://texttospeech.googleapis.com";
const BACKEND: &str = "tts";

pub struct GoogleTts {
    base_url: String,
    api_key: String,
    language: String,
    client: reqwest::Client,
}

// --- TTS request/response types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest {
    input: SynthesisInput,
    voice: VoiceSelection,
    audio_config: SynthesisAudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection {
    language_code: String,
    ssml_gender: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisAudioConfig {
    audio_encoding: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

impl GoogleTts {
    pub fn new(
        api_key: String,
        base_url: Option<&str>,
        language: String,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            language,
            client: http_client(timeout),
        }
    }
}

#[async_trait]
impl VoiceSynthesizer for GoogleTts {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let body = SynthesizeRequest {
            input: SynthesisInput { text: text.into() },
            voice: VoiceSelection {
                language_code: self.language.clone(),
                ssml_gender: "NEUTRAL",
            },
            audio_config: SynthesisAudioConfig {
                audio_encoding: "LINEAR16",
            },
        };

        let url = format!("{}/v1/text:synthesize?key={}", self.base_url, self.api_key);
        debug!(chars = text.len(), language = %self.language, "Synthesizing speech");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_err(BACKEND, e))?;
        let resp = check_status(BACKEND, resp).await?;

        let parsed: SynthesizeResponse = resp
            .json()
            .await
            .map_err(|e| transport_err(BACKEND, e))?;

        if parsed.audio_content.is_empty() {
            return Err(HearsayError::backend(BACKEND, "response held no audio"));
        }

        base64::engine::general_purpose::STANDARD
            .decode(&parsed.audio_content)
            .map_err(|e| HearsayError::backend(BACKEND, format!("undecodable audio: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_neutral_voice_and_linear16() {
        let request = SynthesizeRequest {
            input: SynthesisInput {
                text: "hello".into(),
            },
            voice: VoiceSelection {
                language_code: "en-US".into(),
                ssml_gender: "NEUTRAL",
            },
            audio_config: SynthesisAudioConfig {
                audio_encoding: "LINEAR16",
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["voice"]["ssmlGender"], "NEUTRAL");
        assert_eq!(json["voice"]["languageCode"], "en-US");
        assert_eq!(json["audioConfig"]["audioEncoding"], "LINEAR16");
        assert_eq!(json["input"]["text"], "hello");
    }

    #[test]
    fn test_response_deserialization() {
        let parsed: SynthesizeResponse =
            serde_json::from_str(r#"{"audioContent":"UklGRg=="}"#).unwrap();
        assert_eq!(parsed.audio_content, "UklGRg==");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_backend_error() {
        let tts = GoogleTts::new(
            "test-key".into(),
            Some("http://127.0.0.1:1"),
            "en-US".into(),
            Duration::from_millis(500),
        );
        let err = tts.synthesize("hello").await.unwrap_err();
        assert_eq!(err.kind(), "backend_error");
    }
}
