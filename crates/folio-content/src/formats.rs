//! Content file parsers.
//!
//! Each supported file becomes a record set: an ordered list of JSON values.

use std::{fs, path::Path};

use folio_core::{CoreError, Result};
use serde_json::{Map, Value};

use crate::markdown::MarkdownParser;

/// Supported content file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Json,
    Yaml,
    Toml,
    Markdown,
    Csv,
}

impl ContentFormat {
    /// Determine the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "md" | "markdown" => Some(Self::Markdown),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Determine the format of a path, if supported.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Parse a content file into its record set.
///
/// Returns `Ok(None)` for unsupported extensions. Unreadable or malformed
/// files are reported as [`CoreError::ContentParse`].
pub fn parse_file(path: &Path, markdown: &MarkdownParser) -> Result<Option<Vec<Value>>> {
    let Some(format) = ContentFormat::from_path(path) else {
        return Ok(None);
    };

    let text =
        fs::read_to_string(path).map_err(|e| CoreError::content_parse(path, e.to_string()))?;

    let records = parse_str(&text, format, path, markdown)
        .map_err(|e| match e {
            CoreError::ContentParse { .. } => e,
            other => CoreError::content_parse(path, other.to_string()),
        })?;

    Ok(Some(records))
}

/// Parse already-loaded text in the given format.
pub fn parse_str(
    text: &str,
    format: ContentFormat,
    path: &Path,
    markdown: &MarkdownParser,
) -> Result<Vec<Value>> {
    let records = match format {
        ContentFormat::Json => into_records(serde_json::from_str(text)?),
        ContentFormat::Yaml => vec![serde_yaml::from_str::<Value>(text)?],
        ContentFormat::Toml => {
            let table: toml::Value = toml::from_str(text)?;
            vec![serde_json::to_value(table)?]
        }
        ContentFormat::Markdown => vec![markdown.parse(text, path)?],
        ContentFormat::Csv => parse_csv(text)?,
    };

    Ok(records)
}

/// Arrays become the record set, anything else a single record.
fn into_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// The first row is the header; each later row becomes one record.
fn parse_csv(text: &str) -> Result<Vec<Value>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;
        let mut record = Map::new();
        for (key, field) in headers.iter().zip(row.iter()) {
            record.insert(key.to_string(), Value::String(field.to_string()));
        }
        records.push(Value::Object(record));
    }

    Ok(records)
}
