/// Application configuration and on-disk layout
///
/// All user data lives under the per-user data directory:
/// - Linux: ~/.local/share/imagine/
/// - macOS: ~/Library/Application Support/imagine/
/// - Windows: %APPDATA%\imagine\
///
/// Layout: config.json (settings), imagine.db (history database),
/// images/ (generated PNGs).
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Environment variable that overrides the configured API key
const API_KEY_ENV: &str = "IMAGINE_API_KEY";

/// User-editable settings, persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// API key for the selected provider (also settable via IMAGINE_API_KEY)
    pub api_key: Option<String>,
    /// Provider identifier: "openai", "stability" or "gemini"
    pub api_provider: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_provider: "openai".to_string(),
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk, falling back to defaults when the
    /// file is absent or unreadable. The environment override is applied
    /// after loading so it always wins.
    pub fn load() -> Self {
        let path = config_path();
        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    warn!("ignoring malformed config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.api_key = Some(key);
            }
        }

        config
    }
}

/// Root data directory for the application
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .expect("Could not determine user data directory");
    path.push("imagine");
    path
}

/// Path to the settings file
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Path to the history database file
pub fn db_path() -> PathBuf {
    data_dir().join("imagine.db")
}

/// Directory where a provider's generated images are saved, created on
/// demand (images/<provider>/ under the data dir)
pub fn ensure_images_dir(provider: &str) -> std::io::Result<PathBuf> {
    let path = data_dir()
        .join("images")
        .join(provider.to_lowercase());
    std::fs::create_dir_all(&path)?;
    Ok(path)
}
