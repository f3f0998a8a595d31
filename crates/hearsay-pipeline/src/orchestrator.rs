//! Pipeline orchestration: sequencing, fail-fast stage tagging, persistence.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use hearsay_backends::VoiceSynthesizer;
use hearsay_core::error::{HearsayError, Result};
use hearsay_core::history::ConversationLog;
use hearsay_core::knowledge::KnowledgeStore;
use hearsay_core::types::{AudioArtifact, AudioEncoding, ConversationEntry, PipelineStage};
use hearsay_media::transcode::AudioConverter;
use hearsay_media::{denoise, wav};

use crate::analyze::{GroundedQa, SentimentAnalyzer};
use crate::artifacts::ArtifactStore;
use crate::transcribe::TranscriptionAdapter;

/// What to derive from the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Classify the speaker's sentiment.
    Sentiment,
    /// Answer the spoken question from the uploaded document.
    GroundedQa,
}

/// Semantic result carried in a successful outcome.
#[derive(Debug, Clone)]
pub enum Analysis {
    /// Scored sentiment from the dedicated backend.
    Sentiment(hearsay_core::types::SentimentResult),
    /// Sentiment label produced by the combined multimodal call.
    CombinedSentiment(String),
    /// Grounded answer text.
    Answer(String),
}

impl Analysis {
    /// The text a spoken reply would be rendered from, if any.
    fn reply_text(&self) -> Option<&str> {
        match self {
            Analysis::Answer(text) => Some(text),
            Analysis::Sentiment(_) | Analysis::CombinedSentiment(_) => None,
        }
    }
}

/// A pipeline failure tagged with the stage that caused it.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: PipelineStage,
    pub error: HearsayError,
}

impl StageFailure {
    /// Machine-readable error category of the underlying failure.
    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipeline failed at {}: {}", self.stage, self.error)
    }
}

impl std::error::Error for StageFailure {}

/// Everything a successful request produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub normalized: AudioArtifact,
    pub playback: AudioArtifact,
    pub transcript: String,
    pub transcript_path: PathBuf,
    pub analysis: Analysis,
    pub synthesized: Option<AudioArtifact>,
}

/// Collaborators handed to [`Pipeline::new`].
pub struct PipelineParts {
    pub store: ArtifactStore,
    pub log: ConversationLog,
    pub knowledge: Arc<KnowledgeStore>,
    pub converter: Arc<dyn AudioConverter>,
    pub transcriber: Arc<dyn TranscriptionAdapter>,
    pub sentiment: SentimentAnalyzer,
    pub qa: GroundedQa,
    pub synthesizer: Arc<dyn VoiceSynthesizer>,
    pub denoise: bool,
    pub sample_rate: u32,
}

/// Owns the per-request state machine:
///
/// `Received → Normalized → Denoised → Transcribed → Analyzed →
/// [Synthesized] → Persisted → Done`
///
/// Each stage either advances or terminates the request with the
/// originating stage tagged. Noise reduction alone degrades gracefully.
/// Side effects performed before a later failure are not rolled back; a
/// failed request is resubmitted from intake. Dropping the returned future
/// cancels in-flight backend calls and kills the transcoder subprocess;
/// artifacts already written remain.
pub struct Pipeline {
    store: ArtifactStore,
    log: ConversationLog,
    knowledge: Arc<KnowledgeStore>,
    converter: Arc<dyn AudioConverter>,
    transcriber: Arc<dyn TranscriptionAdapter>,
    sentiment: SentimentAnalyzer,
    qa: GroundedQa,
    synthesizer: Arc<dyn VoiceSynthesizer>,
    denoise: bool,
    sample_rate: u32,
}

/// Tag an error with its originating stage.
fn fail(stage: PipelineStage) -> impl FnOnce(HearsayError) -> StageFailure {
    move |error| {
        warn!(%stage, kind = error.kind(), %error, "Pipeline stage failed");
        StageFailure { stage, error }
    }
}

impl Pipeline {
    pub fn new(parts: PipelineParts) -> Self {
        Self {
            store: parts.store,
            log: parts.log,
            knowledge: parts.knowledge,
            converter: parts.converter,
            transcriber: parts.transcriber,
            sentiment: parts.sentiment,
            qa: parts.qa,
            synthesizer: parts.synthesizer,
            denoise: parts.denoise,
            sample_rate: parts.sample_rate,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run one recording through the full pipeline.
    pub async fn process_recording(
        &self,
        bytes: &[u8],
        original_name: &str,
        mode: AnalysisMode,
        speak_reply: bool,
    ) -> std::result::Result<PipelineOutcome, StageFailure> {
        let started = std::time::Instant::now();

        // Intake: validation happens before any byte lands on disk.
        let raw = self
            .store
            .save_upload(bytes, original_name)
            .await
            .map_err(fail(PipelineStage::Intake))?;
        info!(id = %raw.id, name = original_name, bytes = bytes.len(), "Recording received");

        // Normalize to the canonical mono waveform. The raw upload is only
        // deleted once the normalized form is durably written.
        let wav_path = self.store.path_for(&raw.id, "wav");
        self.converter
            .normalize(&raw.path, &wav_path)
            .await
            .map_err(fail(PipelineStage::Normalize))?;
        let normalized = AudioArtifact {
            id: raw.id.clone(),
            path: wav_path,
            encoding: AudioEncoding::NormalizedWav,
            sample_rate: Some(self.sample_rate),
            channels: Some(1),
        };
        if let Err(e) = self.store.delete(&raw).await {
            warn!(id = %raw.id, error = %e, "Could not delete raw upload");
        }

        // Denoise: the one stage that never fails the request.
        if self.denoise {
            self.denoise_in_place(&normalized);
        }

        // Playback rendering is part of format normalization.
        let mp3_path = self.store.path_for(&normalized.id, "mp3");
        self.converter
            .to_playback(&normalized.path, &mp3_path)
            .await
            .map_err(fail(PipelineStage::Normalize))?;
        let playback = AudioArtifact {
            id: normalized.id.clone(),
            path: mp3_path,
            encoding: AudioEncoding::PlaybackMp3,
            sample_rate: None,
            channels: Some(1),
        };

        // Transcribe.
        let transcription = self
            .transcriber
            .transcribe(&normalized.path)
            .await
            .map_err(fail(PipelineStage::Transcribe))?;
        info!(id = %normalized.id, chars = transcription.text.len(), "Transcribed");

        // Analyze.
        let analysis = match mode {
            AnalysisMode::Sentiment => match &transcription.sentiment_hint {
                // The combined variant already produced a label in the same
                // backend call; don't score twice.
                Some(label) => Analysis::CombinedSentiment(label.clone()),
                None => Analysis::Sentiment(
                    self.sentiment
                        .analyze(&transcription.text)
                        .await
                        .map_err(fail(PipelineStage::Analyze))?,
                ),
            },
            AnalysisMode::GroundedQa => Analysis::Answer(
                self.qa
                    .answer(&transcription.text)
                    .await
                    .map_err(fail(PipelineStage::Analyze))?,
            ),
        };

        // Synthesize the reply, when asked for and when there is one.
        let synthesized = if speak_reply {
            match analysis.reply_text() {
                Some(reply) => {
                    let audio = self
                        .synthesizer
                        .synthesize(reply)
                        .await
                        .map_err(fail(PipelineStage::Synthesize))?;
                    Some(
                        self.store
                            .write_audio(&audio, AudioEncoding::SynthesizedSpeech)
                            .await
                            .map_err(fail(PipelineStage::Synthesize))?,
                    )
                }
                None => {
                    debug!(id = %normalized.id, "No spoken reply for this analysis mode");
                    None
                }
            }
        } else {
            None
        };

        // Persist transcript, reports, and the history entry.
        let transcript_path = self
            .store
            .write_text(&normalized.id, "", &transcription.text)
            .await
            .map_err(fail(PipelineStage::Persist))?;

        match &analysis {
            Analysis::Sentiment(result) => {
                let report = format!(
                    "sentiment: {}\nscore: {:.2}\nmagnitude: {:.2}",
                    result.label, result.score, result.magnitude
                );
                self.store
                    .write_text(&normalized.id, "sentiment", &report)
                    .await
                    .map_err(fail(PipelineStage::Persist))?;
                self.log
                    .append(&ConversationEntry::now(
                        transcription.text.clone(),
                        result.label.as_str(),
                    ))
                    .await
                    .map_err(fail(PipelineStage::Persist))?;
            }
            Analysis::CombinedSentiment(label) => {
                let report = format!(
                    "Text: {}\nSentiment Analysis: {}",
                    transcription.text, label
                );
                self.store
                    .write_text(&normalized.id, "report", &report)
                    .await
                    .map_err(fail(PipelineStage::Persist))?;
                self.log
                    .append(&ConversationEntry::now(transcription.text.clone(), label.clone()))
                    .await
                    .map_err(fail(PipelineStage::Persist))?;
            }
            Analysis::Answer(answer) => {
                self.store
                    .write_text(&normalized.id, "answer", answer)
                    .await
                    .map_err(fail(PipelineStage::Persist))?;
                self.log
                    .append(&ConversationEntry::now(
                        transcription.text.clone(),
                        answer.clone(),
                    ))
                    .await
                    .map_err(fail(PipelineStage::Persist))?;
            }
        }

        info!(
            id = %normalized.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline complete"
        );

        Ok(PipelineOutcome {
            normalized,
            playback,
            transcript: transcription.text,
            transcript_path,
            analysis,
            synthesized,
        })
    }

    /// Replace the process-wide knowledge source.
    pub async fn ingest_document(&self, text: String) -> Result<()> {
        if text.trim().is_empty() {
            return Err(HearsayError::Validation(
                "document contained no text".into(),
            ));
        }
        self.knowledge.replace(text).await;
        Ok(())
    }

    /// Render arbitrary text to speech, writing the audio artifact and a
    /// companion text file.
    pub async fn speak(&self, text: &str) -> Result<AudioArtifact> {
        if text.trim().is_empty() {
            return Err(HearsayError::Validation("no text provided".into()));
        }
        let audio = self.synthesizer.synthesize(text).await?;
        let artifact = self
            .store
            .write_audio(&audio, AudioEncoding::SynthesizedSpeech)
            .await?;
        let companion = format!(
            "Synthesized speech for file: {}\nOriginal text: {text}",
            artifact.id
        );
        self.store.write_text(&artifact.id, "", &companion).await?;
        info!(id = %artifact.id, chars = text.len(), "Synthesized speech");
        Ok(artifact)
    }

    /// Snapshot of the conversation history, oldest first.
    pub async fn history(&self) -> Result<Vec<ConversationEntry>> {
        self.log.read_all().await
    }

    /// Replace the normalized artifact with its denoised version, atomically
    /// via temp-file-and-rename. Any failure is logged and the original
    /// signal passes through unchanged.
    fn denoise_in_place(&self, artifact: &AudioArtifact) {
        let result: Result<()> = (|| {
            let wave = wav::read_wav(&artifact.path)?;
            let cleaned = denoise::denoise(&wave);
            let tmp = artifact.path.with_extension("wav.tmp");
            wav::write_wav(&tmp, &cleaned)?;
            std::fs::rename(&tmp, &artifact.path)?;
            Ok(())
        })();

        match result {
            Ok(()) => debug!(id = %artifact.id, "Noise reduction applied"),
            Err(e) => warn!(
                id = %artifact.id,
                error = %e,
                "Noise reduction failed; passing signal through unchanged"
            ),
        }
    }
}
