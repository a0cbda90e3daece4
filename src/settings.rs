//! # Settings store
//!
//! The per-user settings record the panel edits through its settings form: the
//! API key, the data file the questions are about, free-text domain context, the
//! model name and whether a schema has been generated for the data file.
//!
//! The record is a flat JSON object stored at `<config_dir>/settings.json`
//! (see [`crate::config_dir`]); the keys are camelCase so the file stays
//! interchangeable with the panel's settings payload:
//!
//! ```json
//! {
//!   "apiKey": "…",
//!   "dataPath": "/data/sales.csv",
//!   "context": "Retail sales per store",
//!   "modelName": "gemini-2.5-flash",
//!   "hasSchema": true
//! }
//! ```
//!
//! Reads never fail: a missing or unreadable file is logged and treated as an
//! empty record. Saves are merged field-by-field (see [`SettingsUpdate`]).

use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info};

/// The persisted settings record.
///
/// Every field defaults to empty/false so a partially written file (or an older
/// one missing keys) still deserializes.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Credential for the completion endpoint.
    pub api_key: String,

    /// Location of the data file questions are asked about.
    pub data_path: String,

    /// Free-text domain context used when describing columns.
    pub context: String,

    /// Model identifier; empty means "use the configured default".
    pub model_name: String,

    /// Set once a schema has been generated for `data_path`.
    pub has_schema: bool,
}

impl Settings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn has_data_path(&self) -> bool {
        !self.data_path.trim().is_empty()
    }

    /// The model to use, falling back to `default_model` when none is set.
    pub fn model_or<'a>(&'a self, default_model: &'a str) -> &'a str {
        if self.model_name.trim().is_empty() {
            default_model
        } else {
            &self.model_name
        }
    }
}

/// Incoming values from the settings form.
///
/// Empty strings mean "leave the stored value alone", matching how the form
/// submits untouched fields.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    pub api_key: String,
    pub data_path: String,
    pub context: String,
    pub model: String,
}

impl SettingsUpdate {
    /// Merge non-empty fields into `settings`.
    pub fn apply_to(&self, settings: &mut Settings) {
        if !self.api_key.is_empty() {
            settings.api_key = self.api_key.clone();
        }
        if !self.data_path.is_empty() {
            settings.data_path = self.data_path.clone();
        }
        if !self.context.is_empty() {
            settings.context = self.context.clone();
        }
        if !self.model.is_empty() {
            settings.model_name = self.model.clone();
        }
    }

    /// Whether this update carries enough to (re)generate a schema.
    pub fn triggers_schema_generation(&self) -> bool {
        !self.api_key.is_empty() && !self.data_path.is_empty()
    }
}

/// File-backed settings store.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default per-user location, `<config_dir>/settings.json`.
    pub fn default_location() -> Result<Self, Box<dyn Error>> {
        Ok(Self::new(crate::config_dir()?.join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, treating any failure as "no settings".
    pub fn load(&self) -> Settings {
        if !self.path.exists() {
            debug!("No settings file at {}", self.path.display());
            return Settings::default();
        }

        match read_settings(&self.path) {
            Ok(settings) => settings,
            Err(err) => {
                error!("Error loading settings from {}: {}", self.path.display(), err);
                Settings::default()
            }
        }
    }

    /// Overwrite the record on disk.
    pub fn save(&self, settings: &Settings) -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_string_pretty(settings)?;
        write_atomically(&self.path, json.as_bytes())?;
        info!("Saved settings to {}", self.path.display());
        Ok(())
    }

    /// Load, merge `update`, save, and return the merged record.
    ///
    /// Save failures are logged rather than returned; the merged record is
    /// still handed back so the caller can carry on with it.
    pub fn update(&self, update: &SettingsUpdate) -> Settings {
        let mut settings = self.load();
        update.apply_to(&mut settings);
        if let Err(err) = self.save(&settings) {
            error!("Error saving settings: {}", err);
        }
        settings
    }

    /// Re-read the record, set the schema flag and persist it.
    pub fn mark_schema_generated(&self) -> Result<Settings, Box<dyn Error>> {
        let mut settings = self.load();
        settings.has_schema = true;
        self.save(&settings)?;
        Ok(settings)
    }
}

fn read_settings(path: &Path) -> Result<Settings, Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write `bytes` to `path` through a temp file in the same directory, creating
/// the directory if needed. Readers never see a half-written file.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), Box<dyn Error>> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_load_invalid_json_is_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(SettingsStore::new(path).load(), Settings::default());
    }

    #[test]
    fn test_save_uses_camel_case_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(&path);
        let settings = Settings {
            api_key: "key".to_string(),
            data_path: "/data/sales.csv".to_string(),
            context: "retail".to_string(),
            model_name: "gemini-2.5-flash".to_string(),
            has_schema: true,
        };
        store.save(&settings).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["apiKey"], "key");
        assert_eq!(raw["dataPath"], "/data/sales.csv");
        assert_eq!(raw["modelName"], "gemini-2.5-flash");
        assert_eq!(raw["hasSchema"], true);
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"apiKey": "abc"}"#).unwrap();
        let settings = SettingsStore::new(path).load();
        assert_eq!(settings.api_key, "abc");
        assert!(!settings.has_schema);
        assert!(!settings.has_data_path());
    }

    #[test]
    fn test_update_merges_non_empty_fields() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        store
            .save(&Settings {
                api_key: "old-key".to_string(),
                data_path: "/data/a.csv".to_string(),
                context: "old context".to_string(),
                model_name: String::new(),
                has_schema: true,
            })
            .unwrap();

        let merged = store.update(&SettingsUpdate {
            api_key: String::new(),
            data_path: "/data/b.csv".to_string(),
            context: String::new(),
            model: "gemini-2.5-pro".to_string(),
        });

        assert_eq!(merged.api_key, "old-key");
        assert_eq!(merged.data_path, "/data/b.csv");
        assert_eq!(merged.context, "old context");
        assert_eq!(merged.model_name, "gemini-2.5-pro");
        assert_eq!(store.load(), merged);
    }

    #[test]
    fn test_mark_schema_generated() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        store
            .save(&Settings {
                api_key: "k".to_string(),
                ..Settings::default()
            })
            .unwrap();

        let settings = store.mark_schema_generated().unwrap();
        assert!(settings.has_schema);
        assert_eq!(settings.api_key, "k");
        assert!(store.load().has_schema);
    }

    #[test]
    fn test_model_fallback() {
        let mut settings = Settings::default();
        assert_eq!(settings.model_or("gemini-2.5-flash"), "gemini-2.5-flash");
        settings.model_name = "custom".to_string();
        assert_eq!(settings.model_or("gemini-2.5-flash"), "custom");
    }

    #[test]
    fn test_update_trigger() {
        let update = SettingsUpdate {
            api_key: "k".to_string(),
            data_path: "/d.csv".to_string(),
            ..SettingsUpdate::default()
        };
        assert!(update.triggers_schema_generation());
        assert!(!SettingsUpdate::default().triggers_schema_generation());
    }
}
