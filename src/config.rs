//! This module provides functionality for loading the application's configuration.
//!
//! It defines the `InquiraConfig` struct, which holds the knobs that are not part of
//! the user-facing settings form (endpoint, default model, page size, history
//! database), and a `load_config` function to load the configuration from a YAML file.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use inquira::config::{InquiraConfig, load_config};
//!
//! let config_file_path = "/path/to/config.yaml";
//! let config: InquiraConfig = load_config(config_file_path).unwrap();
//! println!("{:?}", config);
//! ```

use serde::{Deserialize, Serialize};
use std::{
    env,
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use tracing::*;

/// Google's OpenAI-compatible endpoint for Gemini models.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Messages delivered per backward-scroll page.
pub const DEFAULT_PAGE_SIZE: usize = 4;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Environment variable that points at an alternative config file.
pub const CONFIG_ENV_VAR: &str = "INQUIRA_CONFIG";

/// Represents the application's configuration.
///
/// Every field has a default, so an empty (or missing) file is a valid
/// configuration.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct InquiraConfig {
    /// The base URL of the OpenAI-compatible completion API.
    pub api_base: String,

    /// Model used when the settings record does not name one.
    pub default_model: String,

    /// Number of messages returned per `loadMoreMessages` request.
    pub page_size: usize,

    /// Upper bound on one completion round trip.
    pub request_timeout_secs: u64,

    /// Where the settings record lives; defaults to `<config_dir>/settings.json`.
    pub settings_path: Option<PathBuf>,

    /// SQLite database for the durable chat history; `None` keeps the
    /// transcript in memory only.
    pub history_db_url: Option<String>,
}

impl Default for InquiraConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            settings_path: None,
            history_db_url: None,
        }
    }
}

impl InquiraConfig {
    /// The settings file location, honouring `settings_path`.
    pub fn resolve_settings_path(&self) -> Result<PathBuf, Box<dyn Error>> {
        match &self.settings_path {
            Some(path) => Ok(path.clone()),
            None => Ok(crate::config_dir()?.join("settings.json")),
        }
    }
}

/// Loads the application's configuration from a YAML file.
///
/// # Parameters
///
/// - `file`: The path to the YAML configuration file.
///
/// # Returns
///
/// - `Ok(InquiraConfig)`: The loaded configuration.
/// - `Err(Box<dyn Error>)`: An error occurred while reading the file or parsing the YAML.
pub fn load_config(file: &str) -> Result<InquiraConfig, Box<dyn Error>> {
    debug!("Loading config: {:?}", file);
    let content = fs::read_to_string(file)?;
    if content.trim().is_empty() {
        return Ok(InquiraConfig::default());
    }
    let config: InquiraConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Path of the config file: `$INQUIRA_CONFIG`, else `<config_dir>/config.yaml`.
pub fn config_path() -> Result<PathBuf, Box<dyn Error>> {
    match env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(crate::config_dir()?.join("config.yaml")),
    }
}

/// Load the config at `path`, or defaults when no file exists there.
///
/// A file that exists but does not parse is still an error.
pub fn load_config_or_default(path: &Path) -> Result<InquiraConfig, Box<dyn Error>> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(InquiraConfig::default());
    }
    let file = path.to_str().ok_or("Config path is not valid UTF-8")?;
    load_config(file)
}
