//! Key/value access to JSON request documents.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::errors::TaskError;

/// A JSON object loaded from disk. Key order is preserved, so writing the
/// document back only changes the keys that were explicitly set.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument {
    path: Option<PathBuf>,
    root: Map<String, Value>,
}

impl JsonDocument {
    pub fn from_file(path: &Path) -> Result<Self, TaskError> {
        let raw = fs::read_to_string(path).map_err(|e| TaskError::io(path, e))?;
        let mut doc = Self::parse(&raw)?;
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    pub fn parse(raw: &str) -> Result<Self, TaskError> {
        // Some producers prepend a UTF-8 BOM
        let raw = raw.trim_start_matches('\u{feff}');
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(root)) => Ok(Self { path: None, root }),
            Ok(_) => Err(TaskError::Parse("document root is not a JSON object".into())),
            Err(e) => Err(TaskError::Parse(format!("invalid JSON: {e}"))),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Looks up `key`, first as a literal root key, then as a dotted path
    /// (`formType.title` -> `root["formType"]["title"]`).
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.root.get(key) {
            return Some(value);
        }
        let mut parts = key.split('.');
        let mut current = self.root.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets a root key; an existing key keeps its position.
    pub fn set(&mut self, key: &str, value: Value) {
        self.root.insert(key.to_string(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    pub fn to_json_string(&self) -> String {
        // Serializing a map of JSON values cannot fail
        serde_json::to_string_pretty(&self.root).unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) -> Result<(), TaskError> {
        fs::write(path, self.to_json_string()).map_err(|e| TaskError::io(path, e))
    }
}
