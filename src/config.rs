use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use which::which;

use crate::{NotesError, Result};

/// Environment variable consulted for the AI key when the config has none
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the persisted state slot
    pub data_dir: PathBuf,

    /// Editor command used by `edit --editor`
    pub editor_command: Option<String>,

    /// Suggestion service settings
    pub ai: AiConfig,
}

/// Settings for the suggestion service
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-pro".to_string(),
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".notely"));

        Self {
            data_dir,
            editor_command: None,
            ai: AiConfig::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "notely")
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Loads the config from `path` (or the default location), falling back
    /// to defaults when the file does not exist, then applies environment
    /// overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                debug!("Loading config from {}", path.display());
                let raw = fs::read_to_string(&path)?;
                serde_json::from_str(&raw).map_err(|e| NotesError::ConfigError {
                    message: format!("Invalid config file {}: {}", path.display(), e),
                })?
            }
            _ => {
                debug!("No config file found, using defaults");
                Config::default()
            }
        };

        config.apply_env(std::env::var(API_KEY_ENV).ok());
        info!("Using data directory {}", config.data_dir.display());
        Ok(config)
    }

    /// The environment key fills in a missing or blank configured key
    fn apply_env(&mut self, env_key: Option<String>) {
        let configured = self
            .ai
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if !configured {
            self.ai.api_key = env_key.filter(|k| !k.trim().is_empty());
        }
    }

    /// Whether AI suggestions can be requested
    pub fn has_api_key(&self) -> bool {
        self.ai
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    /// Editor for `edit --editor`: the configured command, then `$VISUAL`
    /// or `$EDITOR`, then the first terminal editor found on `PATH`
    pub fn get_editor_command(&self) -> String {
        let from_env = || {
            ["VISUAL", "EDITOR"]
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find(|cmd| !cmd.trim().is_empty())
        };

        self.editor_command
            .clone()
            .filter(|cmd| !cmd.trim().is_empty())
            .or_else(from_env)
            .unwrap_or_else(fallback_editor)
    }
}

fn fallback_editor() -> String {
    if cfg!(windows) {
        return "notepad".to_string();
    }
    if cfg!(target_os = "macos") {
        return "open -W -t".to_string();
    }
    ["nano", "vim", "vi"]
        .into_iter()
        .find(|editor| which(editor).is_ok())
        .unwrap_or("vi")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"data_dir": "/tmp/notely-test", "ai": {"model": "gemini-1.5-flash"}}"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/notely-test"));
        assert_eq!(config.ai.model, "gemini-1.5-flash");
        assert_eq!(config.ai.timeout_secs, 30);
        assert_eq!(config.editor_command, None);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(NotesError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_env_key_only_fills_blank_key() {
        let mut config = Config::default();
        config.apply_env(Some("from-env".into()));
        assert_eq!(config.ai.api_key.as_deref(), Some("from-env"));
        assert!(config.has_api_key());

        let mut config = Config::default();
        config.ai.api_key = Some("from-file".into());
        config.apply_env(Some("from-env".into()));
        assert_eq!(config.ai.api_key.as_deref(), Some("from-file"));

        let mut config = Config::default();
        config.apply_env(Some("  ".into()));
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_blank_configured_editor_is_ignored() {
        let config = Config {
            editor_command: Some("  ".into()),
            ..Default::default()
        };
        assert!(!config.get_editor_command().trim().is_empty());
    }

    #[test]
    fn test_configured_editor_wins() {
        let config = Config {
            editor_command: Some("code --wait".into()),
            ..Default::default()
        };
        assert_eq!(config.get_editor_command(), "code --wait");
    }
}
