use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, ScribeError};

/// Top-level configuration for the OmniScribe client.
///
/// Loaded from `~/.omniscribe/config.toml` by default. Every section falls
/// back to its defaults when absent, so an empty file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScribeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

impl ScribeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScribeConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ScribeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Connection settings for the knowledge service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the knowledge service, without a trailing slash.
    pub base_url: String,
    /// Upper bound on a whole request/response cycle, in seconds.
    pub timeout_secs: u64,
    /// Upper bound on establishing the connection, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

/// Ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Number of processing log entries retained, newest first.
    pub log_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { log_capacity: 20 }
    }
}

/// Microphone capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Name or substring of the input device, or "default".
    pub device_name: String,
    /// Sample rate of the uploaded clip in Hz.
    pub sample_rate: u32,
    /// Channel count of the uploaded clip.
    pub channels: u16,
    /// Longest recording kept in memory; older samples are dropped.
    pub max_buffer_secs: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            device_name: "default".to_string(),
            sample_rate: 16000,
            channels: 1,
            max_buffer_secs: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ScribeConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.backend.timeout_secs, 120);
        assert_eq!(config.backend.connect_timeout_secs, 10);
        assert_eq!(config.ingest.log_capacity, 20);
        assert_eq!(config.recording.device_name, "default");
        assert_eq!(config.recording.sample_rate, 16000);
        assert_eq!(config.recording.channels, 1);
        assert_eq!(config.recording.max_buffer_secs, 600);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[backend]
base_url = "http://10.0.0.5:9000"
timeout_secs = 30
connect_timeout_secs = 2

[ingest]
log_capacity = 50

[recording]
device_name = "USB Microphone"
sample_rate = 44100
channels = 2
max_buffer_secs = 60
"#;
        let file = create_temp_config(content);
        let config = ScribeConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.backend.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.backend.connect_timeout_secs, 2);
        assert_eq!(config.ingest.log_capacity, 50);
        assert_eq!(config.recording.device_name, "USB Microphone");
        assert_eq!(config.recording.sample_rate, 44100);
        assert_eq!(config.recording.channels, 2);
        assert_eq!(config.recording.max_buffer_secs, 60);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[backend]
base_url = "http://example.internal"
"#;
        let file = create_temp_config(content);
        let config = ScribeConfig::load(file.path()).unwrap();
        assert_eq!(config.backend.base_url, "http://example.internal");
        // Remaining fields use defaults
        assert_eq!(config.backend.timeout_secs, 120);
        assert_eq!(config.ingest.log_capacity, 20);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = ScribeConfig::load(file.path()).unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.ingest.log_capacity, 20);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ScribeConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.backend.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = ScribeConfig::load(file.path());
        assert!(matches!(result, Err(ScribeError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = ScribeConfig::default();
        config.backend.base_url = "http://127.0.0.1:8123".to_string();
        config.ingest.log_capacity = 5;
        config.save(&path).unwrap();

        let reloaded = ScribeConfig::load(&path).unwrap();
        assert_eq!(reloaded.backend.base_url, "http://127.0.0.1:8123");
        assert_eq!(reloaded.ingest.log_capacity, 5);
        assert_eq!(reloaded.recording.sample_rate, 16000);
    }
}
