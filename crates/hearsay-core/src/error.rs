use thiserror::Error;

#[derive(Debug, Error)]
pub enum HearsayError {
    /// Bad or missing upload, disallowed extension. Rejected before any side effect.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The external transcoder failed. Fatal to the request, stage named.
    #[error("Conversion failed at {stage}: {message}")]
    Conversion { stage: String, message: String },

    /// The recognizer returned zero results. Recoverable by re-recording,
    /// not an infrastructure fault.
    #[error("no speech detected in recording")]
    NoSpeechDetected,

    /// An external service failed or timed out. Fatal, backend named.
    #[error("{backend} backend error: {message}")]
    Backend { backend: String, message: String },

    /// The generative backend replied without the expected marker lines.
    /// The raw text is kept for diagnostics.
    #[error("malformed model response, expected marker lines")]
    MalformedResponse { raw: String },

    /// Grounded question-answering was asked before any document was ingested.
    #[error("no knowledge source has been uploaded yet")]
    NoKnowledgeSource,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HearsayError {
    /// Shorthand for a named backend failure.
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a transcoding failure at a named stage.
    pub fn conversion(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Machine-readable error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conversion { .. } => "conversion_failed",
            Self::NoSpeechDetected => "no_speech_detected",
            Self::Backend { .. } => "backend_error",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::NoKnowledgeSource => "no_knowledge_source",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, HearsayError>;
