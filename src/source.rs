//! Loosely typed source records and collection file loading.
//!
//! Exports are one JSON file per collection holding an array of flat
//! key/value objects. Fields are looked up dynamically by name; the accessor
//! distinguishes "absent" from "present but null" so the validation rules
//! never have to reason about undefined-vs-null.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::registry::CollectionSpec;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source file not found: {path}")]
    Missing { path: PathBuf },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("expected a JSON array of objects in {path}")]
    NotAnArray { path: PathBuf },
}

/// One row of input: a read-only key/value mapping with explicit presence.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    fields: Map<String, Value>,
}

impl SourceRecord {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Raw field lookup; `None` when the key is absent entirely.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Present and non-null.
    pub fn present(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(v) if !v.is_null())
    }

    /// Present, non-null, and non-empty when textual.
    pub fn non_empty(&self, name: &str) -> bool {
        match self.fields.get(name) {
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(v) => !v.is_null(),
            None => false,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    /// Scalar rendered as a string, used for identifier normalization so a
    /// numeric id and its textual form compare equal.
    pub fn scalar_string(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Source-provided identifier, when there is one.
    pub fn source_id(&self) -> Option<String> {
        self.scalar_string("id")
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Read one collection's export. A missing file is a distinct error so the
/// importer can downgrade it to a skipped-collection outcome.
pub fn load_collection(
    source_dir: &Path,
    spec: &CollectionSpec,
) -> Result<Vec<SourceRecord>, SourceError> {
    let path = source_dir.join(spec.source_file);
    if !path.exists() {
        return Err(SourceError::Missing { path });
    }

    let raw = fs::read_to_string(&path).map_err(|err| SourceError::Io {
        path: path.clone(),
        source: err,
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|err| SourceError::Parse {
        path: path.clone(),
        source: err,
    })?;

    let rows = match value {
        Value::Array(rows) => rows,
        _ => return Err(SourceError::NotAnArray { path }),
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match SourceRecord::from_value(row) {
            Some(record) => records.push(record),
            None => return Err(SourceError::NotAnArray { path }),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accessor_distinguishes_absent_null_and_empty() {
        let record = SourceRecord::from_value(json!({
            "email": "a@example.com",
            "phone": null,
            "name": "  ",
        }))
        .unwrap();

        assert!(record.present("email"));
        assert!(!record.present("phone"));
        assert!(!record.present("missing"));
        assert!(record.field("phone").is_some());
        assert!(record.field("missing").is_none());
        assert!(!record.non_empty("name"));
        assert!(record.non_empty("email"));
    }

    #[test]
    fn scalar_string_normalizes_numbers() {
        let record = SourceRecord::from_value(json!({"id": 42, "flag": true})).unwrap();
        assert_eq!(record.scalar_string("id").as_deref(), Some("42"));
        assert_eq!(record.scalar_string("flag").as_deref(), Some("true"));
        assert_eq!(record.source_id().as_deref(), Some("42"));
    }
}
