//! Shared data model: artifacts, sentiment, pipeline stages, history entries.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Encoding of a stored audio artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// The upload exactly as received.
    RawUpload,
    /// Mono 16-bit PCM WAV at the canonical sample rate.
    NormalizedWav,
    /// Compressed rendering for browser playback.
    PlaybackMp3,
    /// Output of the speech synthesizer.
    SynthesizedSpeech,
}

impl AudioEncoding {
    /// File extension used for this encoding.
    pub fn extension(self) -> &'static str {
        match self {
            Self::NormalizedWav | Self::SynthesizedSpeech => "wav",
            Self::PlaybackMp3 => "mp3",
            Self::RawUpload => "bin",
        }
    }
}

/// A stored audio file. Immutable once written; noise reduction replaces the
/// normalized artifact transactionally rather than mutating it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioArtifact {
    /// Timestamp-derived identifier, unique under concurrency.
    pub id: String,
    pub path: PathBuf,
    pub encoding: AudioEncoding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
}

/// Sentiment classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Classify a backend score. Strict inequalities: the ±0.25 boundaries
    /// are neutral.
    pub fn from_score(score: f32) -> Self {
        if score > 0.25 {
            Self::Positive
        } else if score < -0.25 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored sentiment derived from a transcript or arbitrary text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub score: f32,
    pub magnitude: f32,
}

impl SentimentResult {
    pub fn from_score(score: f32, magnitude: f32) -> Self {
        Self {
            label: SentimentLabel::from_score(score),
            score,
            magnitude,
        }
    }
}

/// A discrete step of the processing pipeline, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Validate and persist the raw upload.
    Intake,
    /// Transcode to the canonical mono waveform and playback rendering.
    Normalize,
    /// Spectral-subtraction noise suppression (best effort).
    Denoise,
    /// Speech-to-text.
    Transcribe,
    /// Sentiment or grounded question-answering.
    Analyze,
    /// Text-to-speech for the reply.
    Synthesize,
    /// Text artifacts and history writes.
    Persist,
}

impl PipelineStage {
    /// Stage label used in events and logging.
    pub fn label(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Normalize => "normalize",
            Self::Denoise => "denoise",
            Self::Transcribe => "transcribe",
            Self::Analyze => "analyze",
            Self::Synthesize => "synthesize",
            Self::Persist => "persist",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One question/answer (or transcript/sentiment) exchange in the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub answer: String,
}

impl ConversationEntry {
    pub fn now(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            question: question.into(),
            answer: answer.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_thresholds() {
        assert_eq!(SentimentLabel::from_score(0.30), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_score(-0.30), SentimentLabel::Negative);
        assert_eq!(SentimentLabel::from_score(0.0), SentimentLabel::Neutral);
        // Boundaries are neutral: strict inequality
        assert_eq!(SentimentLabel::from_score(0.25), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.25), SentimentLabel::Neutral);
    }

    #[test]
    fn test_sentiment_result_carries_raw_numbers() {
        let result = SentimentResult::from_score(0.8, 1.9);
        assert_eq!(result.label, SentimentLabel::Positive);
        assert_eq!(result.score, 0.8);
        assert_eq!(result.magnitude, 1.9);
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(PipelineStage::Transcribe.to_string(), "transcribe");
        assert_eq!(PipelineStage::Normalize.label(), "normalize");
    }

    #[test]
    fn test_encoding_extension() {
        assert_eq!(AudioEncoding::NormalizedWav.extension(), "wav");
        assert_eq!(AudioEncoding::PlaybackMp3.extension(), "mp3");
    }

    #[test]
    fn test_entry_serde_roundtrip() {
        let entry = ConversationEntry::now("what is rust?", "a language");
        let line = serde_json::to_string(&entry).unwrap();
        let back: ConversationEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(back, entry);
    }
}
