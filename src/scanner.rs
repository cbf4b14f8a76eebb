use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use walkdir::WalkDir;

use crate::schema::Schema;

/// Suffix dropped from file stems when naming a component (`user.schema.json` -> `user`)
const SCHEMA_SUFFIX: &str = ".schema";

/// Scanner for component schema files.
///
/// The `SchemaScanner` recursively walks a directory for `.json`, `.yaml` and `.yml`
/// files, each holding one JSON Schema. Hidden directories and `target` are skipped.
///
/// # Example
///
/// ```no_run
/// use openapi_from_routes::scanner::SchemaScanner;
/// use std::path::PathBuf;
///
/// let scanner = SchemaScanner::new(PathBuf::from("./schemas"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} component schemas", result.schemas.len());
/// ```
pub struct SchemaScanner {
    root_path: PathBuf,
}

/// Result of a component scan.
pub struct ScanResult {
    /// Component name to schema, in file name order
    pub schemas: IndexMap<String, Schema>,
    /// Files or directories that could not be read or parsed
    pub warnings: Vec<String>,
}

impl SchemaScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and loads every schema file.
    ///
    /// Unreadable entries and files that do not parse as a schema are recorded as
    /// warnings and skipped. Two files naming the same component keep the first one.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory does not exist.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            bail!("Schema directory does not exist: {}", self.root_path.display());
        }

        let mut schemas = IndexMap::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.path() == self.root_path {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && file_name != "target"
            })
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                    continue;
                }
            };

            let path = entry.path();
            let name = match component_name(path) {
                Some(name) if path.is_file() => name,
                _ => continue,
            };
            if schemas.contains_key(&name) {
                let warning = format!("Duplicate component `{}` in {}", name, path.display());
                warn!("{}", warning);
                warnings.push(warning);
                continue;
            }

            match load_schema(path) {
                Ok(schema) => {
                    debug!("Loaded component {} from {}", name, path.display());
                    schemas.insert(name, schema);
                }
                Err(e) => {
                    let warning = format!("{:#}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult { schemas, warnings })
    }
}

/// Component name for a schema file, `None` for other files
fn component_name(path: &Path) -> Option<String> {
    let extension = path.extension().and_then(|s| s.to_str())?;
    if !matches!(extension, "json" | "yaml" | "yml") {
        return None;
    }
    let stem = path.file_stem().and_then(|s| s.to_str())?;
    Some(stem.strip_suffix(SCHEMA_SUFFIX).unwrap_or(stem).to_string())
}

fn load_schema(path: &Path) -> Result<Schema> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
    let schema = if path.extension().and_then(|s| s.to_str()) == Some("json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse schema file: {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse schema file: {}", path.display()))?
    };
    Ok(schema)
}
