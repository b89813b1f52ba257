use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "clause-review";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the Gemini API key unless overridden.
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "clause_review=info"
}

/// Per-user settings file: `<config dir>/clause-review/settings.json`.
/// `None` when the platform has no config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("settings.json"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings for the whole review run. Every field has a default, so a
/// partial settings file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub files: FilesConfig,
    pub standards: StandardsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub model: String,
    pub base_url: String,
    /// Name of the environment variable that holds the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Extra attempts on timeouts, HTTP 429 and 5xx.
    pub max_retries: u32,
    /// Upper bound on concurrent remark generations, itself capped at 10.
    pub parallel_requests: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            api_key_env: DEFAULT_API_KEY_ENV.into(),
            timeout_secs: 30,
            max_retries: 3,
            parallel_requests: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub output_dir: PathBuf,
    pub prompt_dir: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            prompt_dir: PathBuf::from("prompts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardsConfig {
    pub auto_detect: bool,
}

impl Default for StandardsConfig {
    fn default() -> Self {
        Self { auto_detect: true }
    }
}

impl AppConfig {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
