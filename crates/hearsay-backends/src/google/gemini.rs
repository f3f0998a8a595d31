//! Google Generative AI (Gemini) provider.
//!
//! Non-streaming `generateContent` calls; audio is attached as base64
//! `inline_data` parts alongside the instruction text.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use hearsay_core::error::{HearsayError, Result};

use crate::{check_status, http_client, transport_err, GenerateParts, GenerativeModel};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const BACKEND: &str = "gemini";

pub struct GeminiModel {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

// --- Gemini request/response types ---

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

/// Concatenate the text parts of the first candidate.
fn candidate_text(response: &GenerateResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let content = candidate.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        return None;
    }
    Some(text)
}

impl GeminiModel {
    pub fn new(
        api_key: String,
        base_url: Option<&str>,
        model: Option<&str>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            client: http_client(timeout),
        }
    }

    fn build_parts(parts: &GenerateParts) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        if let Some(audio) = &parts.audio {
            out.push(json!({
                "inline_data": {
                    "mime_type": audio.mime_type,
                    "data": base64::engine::general_purpose::STANDARD.encode(&audio.data),
                }
            }));
        }
        out.push(json!({ "text": parts.instruction }));
        out
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn generate(&self, parts: GenerateParts) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![json!({
                "role": "user",
                "parts": Self::build_parts(&parts),
            })],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        debug!(
            model = %self.model,
            has_audio = parts.audio.is_some(),
            "Calling Gemini API"
        );

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_err(BACKEND, e))?;
        let resp = check_status(BACKEND, resp).await?;

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| transport_err(BACKEND, e))?;

        candidate_text(&parsed)
            .ok_or_else(|| HearsayError::backend(BACKEND, "response contained no text"))
    }
}
