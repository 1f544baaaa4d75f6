use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::render::{parse_power_mw, render_record_text, RenderSpec};
use crate::traits::RecordSource;
use crate::types::{AttrValue, Attributes, SourceRecord, DISPLAY_TEXT, SOURCE_COLLECTION, SOURCE_LOCATION};

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Attributes whose textual values are power figures normalized to MW.
    pub power_fields: Vec<String>,
    pub render: RenderSpec,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { power_fields: vec!["power_installed".to_string()], render: RenderSpec::default() }
    }
}

/// Loads flat JSON-lines exports (one object per line, scalar values) into
/// `(text, attributes)` pairs with provenance filled in from the file.
pub struct DataProcessor {
    data_dir: PathBuf,
    limit: Option<usize>,
    config: LoaderConfig,
}

impl DataProcessor {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), limit: None, config: LoaderConfig::default() }
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self { self.config = config; self }

    /// Only read the first `limit` files (sorted by path).
    pub fn with_file_limit(mut self, limit: usize) -> Self { self.limit = Some(limit); self }

    pub fn process_directory(&self) -> Result<Vec<SourceRecord>> {
        let mut files = list_jsonl_files(&self.data_dir);
        if files.is_empty() {
            tracing::warn!(dir = %self.data_dir.display(), "no .jsonl files found");
            return Ok(vec![]);
        }
        if let Some(limit) = self.limit {
            if files.len() > limit { files.truncate(limit); tracing::info!(limit, "limited input files"); }
        }
        let mut all_records = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::info!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            let content = read_file_content(file_path)?;
            all_records.extend(self.parse_file(&content, file_path));
        }
        tracing::info!(files = files.len(), records = all_records.len(), "loaded source records");
        Ok(all_records)
    }

    fn parse_file(&self, content: &str, file_path: &Path) -> Vec<SourceRecord> {
        let collection = file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "misc".to_string());
        let file_name = file_path.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let mut records = Vec::new();
        for (line_index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() { continue; }
            let location = format!("{}:{}", file_name, line_index + 1);
            match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(line) {
                Ok(object) => records.push(self.to_record(object, &collection, location)),
                Err(e) => tracing::warn!(location = %location, error = %e, "skipping malformed line"),
            }
        }
        records
    }

    fn to_record(&self, object: serde_json::Map<String, serde_json::Value>, collection: &str, location: String) -> SourceRecord {
        let mut attributes = Attributes::new();
        for (name, value) in object {
            let is_power = self.config.power_fields.iter().any(|f| f == &name);
            attributes.insert(name, to_attr_value(value, is_power));
        }
        fill_if_blank(&mut attributes, SOURCE_COLLECTION, || collection.into());
        fill_if_blank(&mut attributes, SOURCE_LOCATION, || location.into());
        let text = render_record_text(&attributes, &self.config.render);
        fill_if_blank(&mut attributes, DISPLAY_TEXT, || text.clone().into());
        SourceRecord::new(text, attributes)
    }
}

/// Provenance cells that are absent, null or blank take the file-derived value.
fn fill_if_blank(attributes: &mut Attributes, name: &str, value: impl FnOnce() -> AttrValue) {
    if attributes.get(name).map_or(true, |v| !v.is_truthy()) { attributes.insert(name.to_string(), value()); }
}

impl RecordSource for DataProcessor {
    fn records(&self) -> Result<Vec<SourceRecord>> { self.process_directory() }
}

fn to_attr_value(value: serde_json::Value, is_power: bool) -> AttrValue {
    use serde_json::Value;
    match value {
        Value::Null => AttrValue::Null,
        Value::Number(n) => n.as_f64().map_or(AttrValue::Null, AttrValue::Number),
        Value::String(s) if is_power => parse_power_mw(&s).map_or(AttrValue::Null, AttrValue::Number),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() { AttrValue::Null } else { AttrValue::Text(s.to_string()) }
        }
        Value::Bool(b) => AttrValue::Text(b.to_string()),
        other => AttrValue::Text(other.to_string()),
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn list_jsonl_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("jsonl") { files.push(path.to_path_buf()); }
    }
    files.sort();
    files
}
