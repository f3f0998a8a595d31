use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use hearsay_backends::google::{GeminiModel, GoogleSentiment, GoogleSpeech, GoogleTts};
use hearsay_core::config::Config;
use hearsay_core::history::ConversationLog;
use hearsay_core::knowledge::KnowledgeStore;
use hearsay_media::FfmpegTranscoder;
use hearsay_pipeline::analyze::{GroundedQa, SentimentAnalyzer};
use hearsay_pipeline::orchestrator::PipelineParts;
use hearsay_pipeline::transcribe::{MultimodalTranscriber, SttTranscriber, TranscriptionAdapter};
use hearsay_pipeline::{Analysis, AnalysisMode, ArtifactStore, Pipeline};

/// Fallback environment variable for every Google backend key.
const DEFAULT_KEY_ENV: &str = "GOOGLE_API_KEY";

#[derive(Parser)]
#[command(
    name = "hearsay",
    about = "Voice-note assistant — transcribe recordings, score sentiment, answer questions from your documents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe a recording and score its sentiment
    Sentiment {
        /// Path to the audio recording (wav, mp3, webm)
        audio: PathBuf,

        /// Use one combined multimodal call for transcript and sentiment
        #[arg(long)]
        combined: bool,
    },

    /// Ask a spoken question against the ingested document
    Ask {
        /// Path to the audio recording with the question
        audio: PathBuf,

        /// Also render the answer to speech
        #[arg(long)]
        speak: bool,
    },

    /// Ingest a document as the knowledge source for questions
    Ingest {
        /// Path to a PDF or plain-text document
        document: PathBuf,
    },

    /// Render text to speech
    Speak {
        /// The text to synthesize
        text: String,
    },

    /// Show the conversation history
    History,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Load config
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::Sentiment { audio, combined } => {
            let pipeline = build_pipeline(&config, combined)?;
            let bytes = tokio::fs::read(&audio)
                .await
                .with_context(|| format!("cannot read {}", audio.display()))?;
            let name = file_name(&audio)?;

            match pipeline
                .process_recording(&bytes, name, AnalysisMode::Sentiment, false)
                .await
            {
                Ok(outcome) => {
                    println!("Transcript:\n{}", outcome.transcript);
                    match outcome.analysis {
                        Analysis::Sentiment(result) => println!(
                            "Sentiment: {} (score {:.2}, magnitude {:.2})",
                            result.label, result.score, result.magnitude
                        ),
                        Analysis::CombinedSentiment(label) => {
                            println!("Sentiment: {label}")
                        }
                        // Not produced in sentiment mode
                        Analysis::Answer(_) => {}
                    }
                    println!("Playback: {}", outcome.playback.path.display());
                }
                Err(failure) => report_failure(failure)?,
            }
        }
        Commands::Ask { audio, speak } => {
            let pipeline = build_pipeline(&config, false)?;
            load_saved_knowledge(&pipeline).await?;
            let bytes = tokio::fs::read(&audio)
                .await
                .with_context(|| format!("cannot read {}", audio.display()))?;
            let name = file_name(&audio)?;

            match pipeline
                .process_recording(&bytes, name, AnalysisMode::GroundedQa, speak)
                .await
            {
                Ok(outcome) => {
                    println!("Question:\n{}", outcome.transcript);
                    if let Analysis::Answer(answer) = &outcome.analysis {
                        println!("\nAnswer:\n{answer}");
                    }
                    if let Some(spoken) = outcome.synthesized {
                        println!("\nSpoken reply: {}", spoken.path.display());
                    }
                }
                Err(failure) => report_failure(failure)?,
            }
        }
        Commands::Ingest { document } => {
            let text = extract_document_text(&config, &document).await?;
            if text.trim().is_empty() {
                anyhow::bail!("document contained no text: {}", document.display());
            }
            // Persist so later `ask` invocations see the latest document.
            // Written whole then renamed, so a concurrent reader sees either
            // the old or the new text, never a partial one.
            let path = knowledge_path();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let tmp = path.with_extension("txt.tmp");
            tokio::fs::write(&tmp, &text).await?;
            tokio::fs::rename(&tmp, &path).await?;
            println!("Ingested {} ({} chars)", document.display(), text.chars().count());
        }
        Commands::Speak { text } => {
            let pipeline = build_pipeline(&config, false)?;
            let artifact = pipeline.speak(&text).await?;
            println!("Audio saved to: {}", artifact.path.display());
        }
        Commands::History => {
            let log = ConversationLog::new(ConversationLog::default_path());
            let entries = log.read_all().await?;
            if entries.is_empty() {
                println!("No history yet.");
            }
            // Most recent first for display
            for entry in entries.iter().rev() {
                println!(
                    "[{}]\nQ: {}\nA: {}\n",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.question,
                    entry.answer
                );
            }
        }
    }

    Ok(())
}

fn file_name(path: &Path) -> anyhow::Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("bad file name: {}", path.display()))
}

fn report_failure(failure: hearsay_pipeline::StageFailure) -> anyhow::Result<()> {
    anyhow::bail!(
        "{} (stage={}, kind={})",
        failure.error,
        failure.stage,
        failure.kind()
    )
}

/// Wire the pipeline from config. `combined` selects the multimodal
/// transcription variant instead of the dedicated recognizer.
fn build_pipeline(config: &Config, combined: bool) -> anyhow::Result<Pipeline> {
    let backends = config.backends.clone().unwrap_or_default();
    let timeout = config.backend_timeout();

    let speech_auth = backends.speech.unwrap_or_default();
    let tts_auth = backends.tts.unwrap_or_default();
    let sentiment_auth = backends.sentiment.unwrap_or_default();
    let gemini_config = backends.gemini.unwrap_or_default();

    let gemini = Arc::new(GeminiModel::new(
        gemini_config
            .resolve_api_key()
            .or_else(default_key)
            .context("Gemini not configured: set backends.gemini.api_key or GOOGLE_API_KEY")?,
        gemini_config.base_url.as_deref(),
        gemini_config.model.as_deref(),
        timeout,
    ));

    let transcriber: Arc<dyn TranscriptionAdapter> = if combined {
        Arc::new(MultimodalTranscriber::new(gemini.clone()))
    } else {
        let recognizer = Arc::new(GoogleSpeech::new(
            speech_auth
                .resolve_api_key()
                .or_else(default_key)
                .context("speech backend not configured: set backends.speech.api_key or GOOGLE_API_KEY")?,
            speech_auth.base_url.as_deref(),
            config.sample_rate(),
            config.language(),
            timeout,
        ));
        Arc::new(SttTranscriber::new(recognizer))
    };

    let synthesizer = Arc::new(GoogleTts::new(
        tts_auth
            .resolve_api_key()
            .or_else(default_key)
            .context("TTS backend not configured: set backends.tts.api_key or GOOGLE_API_KEY")?,
        tts_auth.base_url.as_deref(),
        config.language(),
        timeout,
    ));

    let scorer = Arc::new(GoogleSentiment::new(
        sentiment_auth
            .resolve_api_key()
            .or_else(default_key)
            .context("sentiment backend not configured: set backends.sentiment.api_key or GOOGLE_API_KEY")?,
        sentiment_auth.base_url.as_deref(),
        timeout,
    ));

    let knowledge = Arc::new(KnowledgeStore::new());
    let converter = Arc::new(FfmpegTranscoder::new(
        config.ffmpeg_path(),
        config.sample_rate(),
        timeout,
    ));

    Ok(Pipeline::new(PipelineParts {
        store: ArtifactStore::new(config.storage_dir(), config.allowed_extensions()),
        log: ConversationLog::new(ConversationLog::default_path()),
        knowledge: knowledge.clone(),
        converter,
        transcriber,
        sentiment: SentimentAnalyzer::new(scorer),
        qa: GroundedQa::new(gemini, knowledge, config.max_knowledge_chars()),
        synthesizer,
        denoise: config.denoise_enabled(),
        sample_rate: config.sample_rate(),
    }))
}

fn default_key() -> Option<String> {
    std::env::var(DEFAULT_KEY_ENV).ok().filter(|v| !v.is_empty())
}

/// Where the extracted knowledge text lives between invocations.
fn knowledge_path() -> PathBuf {
    hearsay_core::config::data_dir().join("knowledge.txt")
}

/// Seed the pipeline's knowledge store from the persisted document, if one
/// has been ingested.
async fn load_saved_knowledge(pipeline: &Pipeline) -> anyhow::Result<()> {
    let path = knowledge_path();
    if !path.exists() {
        return Ok(());
    }
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    if !text.trim().is_empty() {
        pipeline.ingest_document(text).await?;
    }
    Ok(())
}

/// Pull text out of a document upload. PDFs go through the external
/// `pdftotext` utility, the same black-box pattern as the transcoder;
/// anything else is read as plain text.
async fn extract_document_text(config: &Config, path: &Path) -> anyhow::Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if !is_pdf {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read {}", path.display()));
    }

    let output = tokio::time::timeout(
        config.backend_timeout(),
        tokio::process::Command::new("pdftotext")
            .arg(path)
            .arg("-")
            .kill_on_drop(true)
            .output(),
    )
    .await
    .context("pdftotext timed out")?
    .context("failed to launch pdftotext (is it installed?)")?;

    if !output.status.success() {
        anyhow::bail!(
            "pdftotext exited with {}: {}",
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
