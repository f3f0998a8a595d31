//! Transcription adapters: plain speech-to-text, or one combined
//! multimodal call returning transcript plus sentiment.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use hearsay_backends::{GenerateParts, GenerativeModel, SpeechRecognizer};
use hearsay_core::error::{HearsayError, Result};

/// Line prefix that carries the transcript in a combined response.
const TEXT_MARKER: &str = "Text:";
/// Line prefix that carries the sentiment label in a combined response.
const SENTIMENT_MARKER: &str = "Sentiment Analysis:";

/// Instruction sent alongside the audio for the combined variant.
const COMBINED_INSTRUCTION: &str = "Listen to the attached audio recording. Reply with exactly two lines and nothing else:\n\
     Text: <the verbatim transcript of the speech>\n\
     Sentiment Analysis: <positive, neutral, or negative>";

/// Result of a transcription call.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    /// Sentiment label when the backend produced one in the same call.
    pub sentiment_hint: Option<String>,
}

/// Turns a normalized recording into text, blocking the request until the
/// backend answers. Implementations are chosen at construction time.
#[async_trait]
pub trait TranscriptionAdapter: Send + Sync {
    async fn transcribe(&self, wav_path: &Path) -> Result<Transcription>;
}

/// Variant A: a dedicated speech-recognition backend, text only.
pub struct SttTranscriber {
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl SttTranscriber {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self { recognizer }
    }
}

#[async_trait]
impl TranscriptionAdapter for SttTranscriber {
    async fn transcribe(&self, wav_path: &Path) -> Result<Transcription> {
        let bytes = tokio::fs::read(wav_path).await?;
        debug!(backend = self.recognizer.name(), bytes = bytes.len(), "Transcribing");
        let text = self.recognizer.recognize(&bytes).await?;
        Ok(Transcription {
            text,
            sentiment_hint: None,
        })
    }
}

/// Variant B: one multimodal call returning transcript and sentiment,
/// parsed out of the free-text reply by the line-prefix contract.
pub struct MultimodalTranscriber {
    model: Arc<dyn GenerativeModel>,
}

impl MultimodalTranscriber {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl TranscriptionAdapter for MultimodalTranscriber {
    async fn transcribe(&self, wav_path: &Path) -> Result<Transcription> {
        let bytes = tokio::fs::read(wav_path).await?;
        debug!(backend = self.model.name(), bytes = bytes.len(), "Transcribing multimodal");
        let raw = self
            .model
            .generate(GenerateParts::with_audio(
                "audio/wav",
                bytes,
                COMBINED_INSTRUCTION,
            ))
            .await?;
        let (text, sentiment) = parse_combined(&raw)?;
        Ok(Transcription {
            text,
            sentiment_hint: sentiment,
        })
    }
}

/// Parse a combined transcript+sentiment reply.
///
/// The transcript marker is mandatory — an answer without it is a
/// [`HearsayError::MalformedResponse`] carrying the raw text, never a
/// silently empty transcript. The sentiment marker is optional.
pub fn parse_combined(raw: &str) -> Result<(String, Option<String>)> {
    let mut text = None;
    let mut sentiment = None;

    for line in raw.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(TEXT_MARKER) {
            text.get_or_insert_with(|| rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix(SENTIMENT_MARKER) {
            sentiment.get_or_insert_with(|| rest.trim().to_string());
        }
    }

    match text {
        Some(text) if !text.is_empty() => Ok((text, sentiment)),
        _ => Err(HearsayError::MalformedResponse { raw: raw.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_combined_both_markers() {
        let raw = "Text: hello world\nSentiment Analysis: positive";
        let (text, sentiment) = parse_combined(raw).unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(sentiment.as_deref(), Some("positive"));
    }

    #[test]
    fn test_parse_combined_tolerates_surrounding_chatter() {
        let raw = "Sure! Here is the analysis.\n  Text: the meeting went well  \nSentiment Analysis: positive\nLet me know if you need more.";
        let (text, sentiment) = parse_combined(raw).unwrap();
        assert_eq!(text, "the meeting went well");
        assert_eq!(sentiment.as_deref(), Some("positive"));
    }

    #[test]
    fn test_parse_combined_missing_sentiment_is_ok() {
        let (text, sentiment) = parse_combined("Text: just words").unwrap();
        assert_eq!(text, "just words");
        assert!(sentiment.is_none());
    }

    #[test]
    fn test_parse_combined_no_markers_is_malformed() {
        let raw = "I could not process the audio.";
        let err = parse_combined(raw).unwrap_err();
        match err {
            HearsayError::MalformedResponse { raw: kept } => assert_eq!(kept, raw),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_combined_empty_transcript_is_malformed() {
        assert!(parse_combined("Text:\nSentiment Analysis: neutral").is_err());
    }

    #[test]
    fn test_parse_combined_first_marker_wins() {
        let (text, _) = parse_combined("Text: first\nText: second").unwrap();
        assert_eq!(text, "first");
    }

    struct FixedModel {
        reply: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerativeModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, parts: GenerateParts) -> Result<String> {
            assert!(parts.audio.is_some(), "audio must be attached");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_multimodal_transcriber_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("clip.wav");
        tokio::fs::write(&wav, b"RIFFfake").await.unwrap();

        let model = Arc::new(FixedModel {
            reply: "Text: good morning\nSentiment Analysis: positive".into(),
            calls: AtomicUsize::new(0),
        });
        let transcriber = MultimodalTranscriber::new(model.clone());

        let result = transcriber.transcribe(&wav).await.unwrap();
        assert_eq!(result.text, "good morning");
        assert_eq!(result.sentiment_hint.as_deref(), Some("positive"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }
}
