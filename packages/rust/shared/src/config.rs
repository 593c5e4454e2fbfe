//! Application configuration for ScoutAI.
//!
//! User config lives at `~/.scoutai/scoutai.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "scoutai.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".scoutai";

// ---------------------------------------------------------------------------
// Config structs (matching scoutai.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Markdown rendering preferences.
    #[serde(default)]
    pub render: RenderConfig,

    /// Narrative cleanup rules.
    #[serde(default)]
    pub normalizer: NormalizerConfig,
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Prefix section headings with an emoji (`## 📝 Summary`).
    #[serde(default = "default_true")]
    pub emoji: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { emoji: true }
    }
}

fn default_true() -> bool {
    true
}

/// `[normalizer]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Extra plain-text titles promoted to `###` headings, e.g.
    /// `"Risks and mitigations:"`. Matched case-insensitively at line start.
    #[serde(default)]
    pub subheadings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Normalize options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime options for the narrative normalizer.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Prefix section headings with an emoji.
    pub emoji: bool,
    /// Additional subheading titles, on top of the built-in list.
    pub extra_subheadings: Vec<String>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            emoji: true,
            extra_subheadings: Vec::new(),
        }
    }
}

impl From<&AppConfig> for NormalizeOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            emoji: config.render.emoji,
            extra_subheadings: config.normalizer.subheadings.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.scoutai/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.scoutai/scoutai.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ScoutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ScoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
