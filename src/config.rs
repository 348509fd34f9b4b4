use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::i18n::Language;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Speech
    pub language: Language,
    pub tts_engine: String,

    // Backend
    pub backend: String,
    pub backend_url: String,
    pub backend_timeout_secs: u64,
    pub ollama_url: String,
    pub ollama_model: String,
    pub history_limit: usize,
    pub connectivity_probe_secs: u64,

    // Timing (milliseconds)
    pub pause_finalize_ms: u64,
    pub restart_after_end_ms: u64,
    pub restart_after_error_ms: u64,
    pub restart_after_language_ms: u64,
    pub dispatch_fallback_ms: u64,
    pub post_speech_ms: u64,

    // Data
    pub history_path: String,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: Language::English,
            tts_engine: "system".to_string(),
            backend: "http".to_string(),
            backend_url: "http://localhost:3000/api/chat".to_string(),
            backend_timeout_secs: 30,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3".to_string(),
            history_limit: 10,
            connectivity_probe_secs: 15,
            pause_finalize_ms: 2000,
            restart_after_end_ms: 500,
            restart_after_error_ms: 1000,
            restart_after_language_ms: 100,
            dispatch_fallback_ms: 1000,
            post_speech_ms: 500,
            history_path: crate::storage::default_path()
                .to_string_lossy()
                .to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

/// Debounce delays used by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub pause_finalize: Duration,
    pub restart_after_end: Duration,
    pub restart_after_error: Duration,
    pub restart_after_language: Duration,
    pub dispatch_fallback: Duration,
    pub post_speech: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for Timings {
    fn from(config: &Config) -> Self {
        Self {
            pause_finalize: Duration::from_millis(config.pause_finalize_ms),
            restart_after_end: Duration::from_millis(config.restart_after_end_ms),
            restart_after_error: Duration::from_millis(config.restart_after_error_ms),
            restart_after_language: Duration::from_millis(config.restart_after_language_ms),
            dispatch_fallback: Duration::from_millis(config.dispatch_fallback_ms),
            post_speech: Duration::from_millis(config.post_speech_ms),
        }
    }
}

impl Config {
    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            if let Err(e) = config.save_to(config_path) {
                tracing::warn!("⚠️ Could not write default config: {}", e);
            }
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                // Graceful degradation: log warning and use defaults
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = config_path.with_extension("json.corrupt");
                let _ = std::fs::rename(config_path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to file
    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn timings(&self) -> Timings {
        Timings::from(self)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("krrish")
        .join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.language, Language::English);
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.pause_finalize_ms, 2000);
        assert_eq!(config.backend, "http");
    }

    #[test]
    fn test_default_timings() {
        let timings = Timings::default();
        assert_eq!(timings.pause_finalize, Duration::from_secs(2));
        assert_eq!(timings.restart_after_end, Duration::from_millis(500));
        assert_eq!(timings.restart_after_error, Duration::from_secs(1));
        assert_eq!(timings.dispatch_fallback, Duration::from_secs(1));
        assert_eq!(timings.post_speech, Duration::from_millis(500));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"language":"ta-IN","backend":"ollama"}"#).unwrap();
        assert_eq!(config.language, Language::Tamil);
        assert_eq!(config.backend, "ollama");
        assert_eq!(config.post_speech_ms, 500);
    }

    #[test]
    fn test_corrupt_file_falls_back_and_backs_up() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid json").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.history_limit, 10);
        assert!(dir.path().join("config.json.corrupt").exists());
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("krrish/config.json");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.history_limit, 10);
        assert!(path.exists());
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.backend, config.backend);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("nested/config.json");
        let mut config = Config::default();
        config.language = Language::Kannada;
        config.save_to(&path).unwrap();

        let restored = Config::load_from(&path).unwrap();
        assert_eq!(restored.language, Language::Kannada);
    }
}
