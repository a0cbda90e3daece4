//! # Inquira (library root)
//!
//! Ask questions about a local data file in plain language and get analysis
//! code inserted into the document you are editing.
//!
//! The crate is organised leaves-first:
//!
//! - Settings & files: [`settings`] (per-user settings record), [`data_schema`]
//!   (column descriptions cached next to the data file), [`headers`] (column
//!   names from the data file), [`config`] (application config).
//! - Model access: [`template`] (prompts and response schemas), [`api`]
//!   (OpenAI-compatible completion client).
//! - Editor: [`editor`] (host abstraction, code injector, file-backed host).
//! - Conversation: [`transcript`] (chat log and paging), [`history`],
//!   [`models`], [`schema`] (optional SQLite copy of the log).
//! - Flow: [`orchestrator`] (question and schema flows), [`panel`] (panel
//!   protocol over NDJSON), [`commands`] and [`pretty`] (CLI).
//!
//! ## Configuration directory
//! Settings, config and template overrides live under the per-platform config
//! directory returned by [`config_dir`], e.g.:
//!
//! - macOS: `~/Library/Application Support/com.inquira.inquira`
//! - Linux (XDG): `~/.config/inquira`
//! - Windows: `C:\Users\<you>\AppData\Roaming\inquira\inquira\config`

use directories::ProjectDirs;
use std::error::Error;

pub mod api;
pub mod commands;
pub mod config;
pub mod data_schema;
pub mod editor;
pub mod headers;
pub mod history;
pub mod models;
pub mod orchestrator;
pub mod panel;
pub mod pretty;
pub mod schema;
pub mod settings;
pub mod template;
pub mod transcript;

#[cfg(test)]
mod testing;

/// Error type for failures that cross the completion-service seam.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Return the per-platform configuration directory used by Inquira.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("com", "inquira", "inquira")`. The directory is **not** created by this
/// function.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be determined
/// (which is rare but possible in heavily sandboxed environments).
///
/// # Examples
/// ```rust
/// let cfg = inquira::config_dir().expect("has a config dir");
/// println!("config at {}", cfg.display());
/// ```
pub fn config_dir() -> Result<std::path::PathBuf, Box<dyn Error>> {
    let proj_dirs = ProjectDirs::from("com", "inquira", "inquira")
        .ok_or("Unable to determine config directory")?;
    let config_dir = proj_dirs.config_dir().to_path_buf();

    Ok(config_dir)
}
