//! Serialization module for writing OpenAPI documents as YAML or JSON.
//!
//! The functions accept either the typed [`crate::openapi_builder::OpenApiDocument`] or
//! the merged `serde_json::Value` produced once an overlay has been applied.

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Render a document as YAML.
///
/// # Example
///
/// ```
/// use openapi_from_routes::serializer::serialize_yaml;
/// use serde_json::json;
///
/// let doc = json!({
///     "openapi": "3.0.3",
///     "info": {"title": "Pets", "version": "1.0.0"},
///     "paths": {}
/// });
/// let yaml = serialize_yaml(&doc).unwrap();
/// assert!(yaml.contains("title: Pets"));
/// ```
pub fn serialize_yaml<T: Serialize + ?Sized>(doc: &T) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize OpenAPI document to YAML")
}

/// Render a document as pretty-printed JSON
pub fn serialize_json<T: Serialize + ?Sized>(doc: &T) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize OpenAPI document to JSON")
}

/// Write `content` to `path`, replacing any existing file and creating missing parent
/// directories.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Wrote {} bytes", content.len());
    Ok(())
}

/// Reads a document from disk. `.json` files are parsed as JSON, everything else as
/// YAML.
pub fn load_document(path: &Path) -> Result<Value> {
    debug!("Loading document from {}", path.display());
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    if path.extension().and_then(|s| s.to_str()) == Some("json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON document: {}", path.display()))
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML document: {}", path.display()))
    }
}
