//! Google Cloud Natural Language sentiment provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use hearsay_core::error::Result;

use crate::{check_status, http_client, transport_err, SentimentScore, SentimentScorer};

const DEFAULT_BASE_URL: &str = "https://language.googleapis.com";
const BACKEND: &str = "sentiment";

pub struct GoogleSentiment {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

// --- Language request/response types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeSentimentRequest {
    document: Document,
    encoding_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Document {
    #[serde(rename = "type")]
    doc_type: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeSentimentResponse {
    #[serde(default)]
    document_sentiment: DocumentSentiment,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentSentiment {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    magnitude: f32,
}

impl GoogleSentiment {
    pub fn new(api_key: String, base_url: Option<&str>, timeout: Duration) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            client: http_client(timeout),
        }
    }
}

#[async_trait]
impl SentimentScorer for GoogleSentiment {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn score(&self, text: &str) -> Result<SentimentScore> {
        let body = AnalyzeSentimentRequest {
            document: Document {
                doc_type: "PLAIN_TEXT",
                content: text.into(),
            },
            encoding_type: "UTF8",
        };

        let url = format!(
            "{}/v1/documents:analyzeSentiment?key={}",
            self.base_url, self.api_key
        );
        debug!(chars = text.len(), "Scoring sentiment");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_err(BACKEND, e))?;
        let resp = check_status(BACKEND, resp).await?;

        let parsed: AnalyzeSentimentResponse = resp
            .json()
            .await
            .map_err(|e| transport_err(BACKEND, e))?;

        Ok(SentimentScore {
            score: parsed.document_sentiment.score,
            magnitude: parsed.document_sentiment.magnitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = AnalyzeSentimentRequest {
            document: Document {
                doc_type: "PLAIN_TEXT",
                content: "what a lovely day".into(),
            },
            encoding_type: "UTF8",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["document"]["type"], "PLAIN_TEXT");
        assert_eq!(json["document"]["content"], "what a lovely day");
        assert_eq!(json["encodingType"], "UTF8");
    }

    #[test]
    fn test_response_deserialization() {
        let parsed: AnalyzeSentimentResponse = serde_json::from_str(
            r#"{"documentSentiment":{"score":0.8,"magnitude":1.9},"language":"en"}"#,
        )
        .unwrap();
        assert_eq!(parsed.document_sentiment.score, 0.8);
        assert_eq!(parsed.document_sentiment.magnitude, 1.9);
    }

    #[test]
    fn test_missing_sentiment_defaults_to_zero() {
        let parsed: AnalyzeSentimentResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(parsed.document_sentiment.score, 0.0);
        assert_eq!(parsed.document_sentiment.magnitude, 0.0);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_backend_error() {
        let sentiment = GoogleSentiment::new(
            "test-key".into(),
            Some("http://127.0.0.1:1"),
            Duration::from_millis(500),
        );
        let err = sentiment.score("hello").await.unwrap_err();
        assert_eq!(err.kind(), "backend_error");
    }
}
