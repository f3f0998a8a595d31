//! Format normalization via the external ffmpeg transcoder.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use hearsay_core::error::{HearsayError, Result};

/// How much trailing stderr to keep in a transcoder error message.
const STDERR_SUFFIX_LEN: usize = 400;

/// Converts uploaded audio between container formats.
///
/// Two operations: normalization to the canonical mono PCM waveform, and a
/// compressed playback rendering. Both are black-box calls into an external
/// transcoder; failures are non-retryable within the request and carry the
/// offending stage name.
#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Transcode `input` into mono 16-bit PCM WAV at the canonical sample rate.
    async fn normalize(&self, input: &Path, output: &Path) -> Result<()>;

    /// Render `input` as a compressed file suitable for browser playback.
    async fn to_playback(&self, input: &Path, output: &Path) -> Result<()>;
}

/// [`AudioConverter`] backed by an ffmpeg subprocess.
pub struct FfmpegTranscoder {
    ffmpeg: String,
    sample_rate: u32,
    timeout: Duration,
}

/// Argument list for the normalization pass.
pub fn normalize_args(input: &Path, output: &Path, sample_rate: u32) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.display().to_string(),
        "-ac".into(),
        "1".into(),
        "-ar".into(),
        sample_rate.to_string(),
        "-y".into(),
        output.display().to_string(),
    ]
}

/// Argument list for the playback rendering pass (~128 kbps).
pub fn playback_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.display().to_string(),
        "-ac".into(),
        "1".into(),
        "-b:a".into(),
        "128k".into(),
        "-y".into(),
        output.display().to_string(),
    ]
}

/// Keep only the tail of a stderr dump so error messages stay bounded.
fn stderr_suffix(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_SUFFIX_LEN {
        return trimmed.to_string();
    }
    let start = trimmed
        .char_indices()
        .rev()
        .nth(STDERR_SUFFIX_LEN - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    format!("...{}", &trimmed[start..])
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: impl Into<String>, sample_rate: u32, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            sample_rate,
            timeout,
        }
    }

    async fn run(&self, stage: &str, args: Vec<String>, output: &Path) -> Result<()> {
        debug!(stage, ffmpeg = %self.ffmpeg, ?args, "Running transcoder");

        let child = tokio::process::Command::new(&self.ffmpeg)
            .args(&args)
            .kill_on_drop(true)
            .output();

        let result = tokio::time::timeout(self.timeout, child).await;

        let out = match result {
            Ok(Ok(out)) => out,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HearsayError::conversion(
                    stage,
                    format!("transcoder binary not found: {}", self.ffmpeg),
                ));
            }
            Ok(Err(e)) => {
                return Err(HearsayError::conversion(
                    stage,
                    format!("failed to launch transcoder: {e}"),
                ));
            }
            Err(_) => {
                warn!(stage, timeout_ms = self.timeout.as_millis() as u64, "Transcoder timed out");
                return Err(HearsayError::conversion(
                    stage,
                    format!("transcoder timed out after {}ms", self.timeout.as_millis()),
                ));
            }
        };

        if !out.status.success() {
            let code = out.status.code().unwrap_or(-1);
            return Err(HearsayError::conversion(
                stage,
                format!("transcoder exited with {code}: {}", stderr_suffix(&out.stderr)),
            ));
        }

        // A zero-exit run that produced nothing is still a failure.
        if !output.exists() {
            return Err(HearsayError::conversion(
                stage,
                format!("transcoder produced no output at {}", output.display()),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl AudioConverter for FfmpegTranscoder {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<()> {
        self.run("normalize", normalize_args(input, output, self.sample_rate), output)
            .await
    }

    async fn to_playback(&self, input: &Path, output: &Path) -> Result<()> {
        self.run("playback", playback_args(input, output), output)
            .await
    }
}
