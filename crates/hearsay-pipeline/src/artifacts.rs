//! On-disk artifact storage: naming, validation, reads and writes.

use std::path::{Path, PathBuf};

use tracing::debug;

use hearsay_core::error::{HearsayError, Result};
use hearsay_core::types::{AudioArtifact, AudioEncoding};

/// Manages the storage directory for uploaded and generated artifacts.
///
/// Names are derived from the capture timestamp plus a random suffix so
/// concurrent requests within the same second never collide. Written
/// artifacts are never overwritten.
pub struct ArtifactStore {
    root: PathBuf,
    allowed_extensions: Vec<String>,
}

impl ArtifactStore {
    pub fn new(root: PathBuf, allowed_extensions: Vec<String>) -> Self {
        Self {
            root,
            allowed_extensions,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Whether `filename` carries an allowlisted extension.
    pub fn is_allowed_upload(&self, filename: &str) -> bool {
        extension_of(filename)
            .map(|ext| self.allowed_extensions.iter().any(|a| a == &ext))
            .unwrap_or(false)
    }

    /// Generate a fresh artifact stem: timestamp plus short unique suffix.
    pub fn new_stem() -> String {
        let ts = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{ts}-{}", &id[..8])
    }

    /// Path for an artifact stem with the given extension.
    pub fn path_for(&self, stem: &str, ext: &str) -> PathBuf {
        self.root.join(format!("{stem}.{ext}"))
    }

    /// Validate and persist a raw upload. Validation failures occur before
    /// any byte is written.
    pub async fn save_upload(&self, bytes: &[u8], original_name: &str) -> Result<AudioArtifact> {
        if bytes.is_empty() {
            return Err(HearsayError::Validation("empty upload".into()));
        }
        let ext = extension_of(original_name).ok_or_else(|| {
            HearsayError::Validation(format!("upload has no extension: {original_name}"))
        })?;
        if !self.is_allowed_upload(original_name) {
            return Err(HearsayError::Validation(format!(
                "extension not allowed: .{ext}"
            )));
        }

        self.ensure_root().await?;
        let stem = Self::new_stem();
        // The `.upload` infix keeps the raw file clear of the normalized
        // artifact's path even when the upload is already a WAV.
        let path = self.root.join(format!("{stem}.upload.{ext}"));
        tokio::fs::write(&path, bytes).await?;

        debug!(path = %path.display(), bytes = bytes.len(), "Saved upload");
        Ok(AudioArtifact {
            id: stem,
            path,
            encoding: AudioEncoding::RawUpload,
            sample_rate: None,
            channels: None,
        })
    }

    /// Persist generated audio bytes (synthesized speech) under a fresh
    /// name. Never overwrites an existing artifact.
    pub async fn write_audio(&self, bytes: &[u8], encoding: AudioEncoding) -> Result<AudioArtifact> {
        self.ensure_root().await?;
        let stem = match encoding {
            AudioEncoding::SynthesizedSpeech => format!("tts_{}", Self::new_stem()),
            _ => Self::new_stem(),
        };
        let path = self.path_for(&stem, encoding.extension());
        tokio::fs::write(&path, bytes).await?;

        debug!(path = %path.display(), bytes = bytes.len(), "Wrote audio artifact");
        Ok(AudioArtifact {
            id: stem,
            path,
            encoding,
            sample_rate: None,
            channels: None,
        })
    }

    /// Write a companion text file for an artifact stem.
    pub async fn write_text(&self, stem: &str, suffix: &str, text: &str) -> Result<PathBuf> {
        self.ensure_root().await?;
        let name = if suffix.is_empty() {
            format!("{stem}.txt")
        } else {
            format!("{stem}.{suffix}.txt")
        };
        let path = self.root.join(name);
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }

    /// Read a companion text file back.
    pub async fn read_text(&self, stem: &str, suffix: &str) -> Result<String> {
        let name = if suffix.is_empty() {
            format!("{stem}.txt")
        } else {
            format!("{stem}.{suffix}.txt")
        };
        Ok(tokio::fs::read_to_string(self.root.join(name)).await?)
    }

    /// Delete an artifact file (used for the raw upload once the normalized
    /// form is durably written).
    pub async fn delete(&self, artifact: &AudioArtifact) -> Result<()> {
        if artifact.path.exists() {
            tokio::fs::remove_file(&artifact.path).await?;
            debug!(path = %artifact.path.display(), "Deleted artifact");
        }
        Ok(())
    }
}

/// Lowercased extension of a filename, if it has one.
fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
