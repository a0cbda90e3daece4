//! # Column schema cache
//!
//! A schema here is the list of columns of a data file, each paired with a
//! human-readable description produced by the model. It grounds every
//! code-generation prompt.
//!
//! One schema file lives next to each data file:
//!
//! ```text
//! /data/sales.csv  ->  /data/sales_schema.json
//! ```
//!
//! and holds a JSON array of `{ "name": …, "description": … }` objects.
//! Regenerating a schema overwrites the file wholesale.

use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info};

use crate::settings::write_atomically;

/// A single described column.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    pub description: String,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Derive the schema file location for `data_path`.
///
/// Pure: the extension (if any) is dropped and `_schema.json` appended to the
/// file stem, in the same directory.
///
/// ```
/// use std::path::Path;
/// use inquira::data_schema::schema_path_for;
///
/// assert_eq!(
///     schema_path_for(Path::new("/a/b/sales.csv")),
///     Path::new("/a/b/sales_schema.json")
/// );
/// ```
pub fn schema_path_for(data_path: &Path) -> PathBuf {
    let stem = data_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = format!("{stem}_schema.json");

    match data_path.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Reads and writes schema files next to their data files.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaCache;

impl SchemaCache {
    pub fn new() -> Self {
        Self
    }

    pub fn path_for(&self, data_path: &Path) -> PathBuf {
        schema_path_for(data_path)
    }

    /// Load the schema for `data_path`.
    ///
    /// Returns `None` when the file is missing or cannot be parsed; parse
    /// failures are logged.
    pub fn load(&self, data_path: &Path) -> Option<Vec<ColumnDescription>> {
        let schema_path = self.path_for(data_path);
        if !schema_path.exists() {
            debug!("No schema file at {}", schema_path.display());
            return None;
        }

        match read_schema(&schema_path) {
            Ok(schema) => Some(schema),
            Err(err) => {
                error!("Error loading schema {}: {}", schema_path.display(), err);
                None
            }
        }
    }

    /// Persist `schema` for `data_path`, replacing any previous file.
    pub fn save(
        &self,
        data_path: &Path,
        schema: &[ColumnDescription],
    ) -> Result<PathBuf, Box<dyn Error>> {
        let schema_path = self.path_for(data_path);
        let json = serde_json::to_string_pretty(schema)?;
        write_atomically(&schema_path, json.as_bytes())?;
        info!(
            "Wrote {} column descriptions to {}",
            schema.len(),
            schema_path.display()
        );
        Ok(schema_path)
    }
}

fn read_schema(path: &Path) -> Result<Vec<ColumnDescription>, Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_schema_path_drops_any_extension() {
        assert_eq!(
            schema_path_for(Path::new("/a/b/sales.csv")),
            PathBuf::from("/a/b/sales_schema.json")
        );
        assert_eq!(
            schema_path_for(Path::new("/a/b/sales.parquet")),
            PathBuf::from("/a/b/sales_schema.json")
        );
        assert_eq!(
            schema_path_for(Path::new("/a/b/sales")),
            PathBuf::from("/a/b/sales_schema.json")
        );
    }

    #[test]
    fn test_schema_path_relative() {
        assert_eq!(
            schema_path_for(Path::new("data.json")),
            PathBuf::from("data_schema.json")
        );
    }

    #[test]
    fn test_load_missing_schema() {
        let dir = tempdir().unwrap();
        let cache = SchemaCache::new();
        assert!(cache.load(&dir.path().join("sales.csv")).is_none());
    }

    #[test]
    fn test_load_corrupt_schema() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("sales.csv");
        fs::write(dir.path().join("sales_schema.json"), "[{").unwrap();
        assert!(SchemaCache::new().load(&data).is_none());
    }

    #[test]
    fn test_regenerate_overwrites() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("sales.csv");
        let cache = SchemaCache::new();

        cache
            .save(
                &data,
                &[
                    ColumnDescription::new("region", "Sales region"),
                    ColumnDescription::new("amount", "Order value"),
                ],
            )
            .unwrap();
        let path = cache
            .save(&data, &[ColumnDescription::new("store", "Store id")])
            .unwrap();

        assert_eq!(path, dir.path().join("sales_schema.json"));
        assert_eq!(
            cache.load(&data).unwrap(),
            vec![ColumnDescription::new("store", "Store id")]
        );
    }

    #[test]
    fn test_schema_file_is_plain_array() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("orders.csv");
        let path = SchemaCache::new()
            .save(&data, &[ColumnDescription::new("id", "Order id")])
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(raw[0]["name"], "id");
        assert_eq!(raw[0]["description"], "Order id");
    }
}
