//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Hearsay configuration.
///
/// Loaded from a JSON5 file; a missing file yields the defaults. Every
/// section is optional so a minimal config stays minimal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backends: Option<BackendsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for uploaded and generated artifacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Upload extension allowlist (lowercase, no dot).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Canonical sample rate for normalized waveforms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,

    /// Recognition/synthesis language code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Whether to run noise reduction after normalization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoise: Option<bool>,

    /// Path to the ffmpeg binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<String>,

    /// Per-call timeout for external backends and the transcoder, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Upper bound on knowledge-source characters embedded in a QA prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_knowledge_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<BackendAuth>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<BackendAuth>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<BackendAuth>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini: Option<GeminiBackendConfig>,
}

/// API-key auth block for a single backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendAuth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl BackendAuth {
    /// Resolve the API key: check `api_key` first, then `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiBackendConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GeminiBackendConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

/// Resolve a secret: direct field wins, then the named environment variable.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{var_name}}}"))
    })
    .into_owned()
}

impl Config {
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::HearsayError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::HearsayError::Validation(format!("bad config: {e}")))?;

        Ok(config)
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Artifact storage directory.
    pub fn storage_dir(&self) -> PathBuf {
        self.storage
            .as_ref()
            .and_then(|s| s.dir.as_ref())
            .map(|d| {
                let expanded = shellexpand::tilde(d);
                PathBuf::from(expanded.as_ref())
            })
            .unwrap_or_else(|| data_dir().join("uploads"))
    }

    /// Upload extension allowlist.
    pub fn allowed_extensions(&self) -> Vec<String> {
        self.storage
            .as_ref()
            .and_then(|s| s.allowed_extensions.clone())
            .unwrap_or_else(|| {
                ["wav", "mp3", "webm", "pdf"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
    }

    /// Canonical sample rate for normalized audio.
    pub fn sample_rate(&self) -> u32 {
        self.audio
            .as_ref()
            .and_then(|a| a.sample_rate)
            .unwrap_or(16_000)
    }

    /// Recognition/synthesis language code.
    pub fn language(&self) -> String {
        self.audio
            .as_ref()
            .and_then(|a| a.language.clone())
            .unwrap_or_else(|| "en-US".to_string())
    }

    /// Whether noise reduction runs after normalization.
    pub fn denoise_enabled(&self) -> bool {
        self.audio.as_ref().and_then(|a| a.denoise).unwrap_or(true)
    }

    /// Path to the ffmpeg binary.
    pub fn ffmpeg_path(&self) -> String {
        self.audio
            .as_ref()
            .and_then(|a| a.ffmpeg_path.clone())
            .unwrap_or_else(|| "ffmpeg".to_string())
    }

    /// Per-call timeout for external backends and the transcoder.
    pub fn backend_timeout(&self) -> Duration {
        let secs = self
            .audio
            .as_ref()
            .and_then(|a| a.timeout_secs)
            .unwrap_or(30);
        Duration::from_secs(secs)
    }

    /// Upper bound on knowledge characters embedded in a QA prompt.
    pub fn max_knowledge_chars(&self) -> usize {
        self.analysis
            .as_ref()
            .and_then(|a| a.max_knowledge_chars)
            .unwrap_or(100_000)
    }
}

/// Base data directory: `~/.hearsay/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hearsay")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_HS_KEY", "sk-test-123") };
        let input = r#"{"key": "${TEST_HS_KEY}", "other": "plain"}"#;
        let out = substitute_env_vars(input);
        assert!(out.contains("sk-test-123"));
        assert!(out.contains("plain"));
        unsafe { std::env::remove_var("TEST_HS_KEY") };
    }

    #[test]
    fn test_unknown_env_var_left_intact() {
        let input = "${HS_DOES_NOT_EXIST_12345}";
        assert_eq!(substitute_env_vars(input), input);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/hearsay.json")).unwrap();
        assert_eq!(config.sample_rate(), 16_000);
        assert_eq!(config.language(), "en-US");
        assert!(config.denoise_enabled());
        assert_eq!(config.ffmpeg_path(), "ffmpeg");
        assert_eq!(config.backend_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_allowlist() {
        let config = Config::default();
        let exts = config.allowed_extensions();
        assert!(exts.contains(&"wav".to_string()));
        assert!(exts.contains(&"mp3".to_string()));
        assert!(exts.contains(&"webm".to_string()));
        assert!(exts.contains(&"pdf".to_string()));
    }

    #[test]
    fn test_resolve_api_key_prefers_direct() {
        let auth = BackendAuth {
            api_key: Some("direct".into()),
            api_key_env: Some("HS_UNSET_ENV".into()),
            base_url: None,
        };
        assert_eq!(auth.resolve_api_key().as_deref(), Some("direct"));

        let auth = BackendAuth {
            api_key: Some(String::new()),
            api_key_env: None,
            base_url: None,
        };
        assert_eq!(auth.resolve_api_key(), None);
    }

    #[test]
    fn test_load_json5_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // comments are allowed
                audio: { sample_rate: 8000, language: "de-DE", denoise: false },
                storage: { allowed_extensions: ["wav"] },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sample_rate(), 8000);
        assert_eq!(config.language(), "de-DE");
        assert!(!config.denoise_enabled());
        assert_eq!(config.allowed_extensions(), vec!["wav".to_string()]);
    }
}
