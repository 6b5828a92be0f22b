//! Source → destination identifier mapping.
//!
//! Records that carry a source id keep it verbatim so re-runs stay
//! idempotent. Records without one get a deterministic digest of their
//! natural key. The mapping is versioned and isolated behind a trait so the
//! algorithm can be revalidated or replaced without touching validation or
//! sampling logic.

use sha2::{Digest, Sha256};

use crate::registry::CollectionSpec;
use crate::source::SourceRecord;

pub trait IdMapper: Send + Sync {
    fn version(&self) -> &'static str;

    /// Destination primary key for this record, or `None` when the record
    /// has neither a source id nor a complete natural key.
    fn destination_id(&self, spec: &CollectionSpec, record: &SourceRecord) -> Option<String>;
}

/// v1: identity for source-provided ids, truncated SHA-256 over
/// `collection \0 field=value …` otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashIdMapper;

impl IdMapper for HashIdMapper {
    fn version(&self) -> &'static str {
        "v1"
    }

    fn destination_id(&self, spec: &CollectionSpec, record: &SourceRecord) -> Option<String> {
        if let Some(id) = record.source_id() {
            return Some(id);
        }

        if spec.natural_key.is_empty() {
            return None;
        }

        let mut hasher = Sha256::new();
        hasher.update(spec.name.as_bytes());
        hasher.update([0]);
        for field in spec.natural_key {
            let value = record.scalar_string(field)?;
            hasher.update(field.as_bytes());
            hasher.update([b'=']);
            hasher.update(value.as_bytes());
            hasher.update([0]);
        }
        let digest = hasher.finalize();
        let hex: String = digest.iter().take(16).map(|b| format!("{b:02x}")).collect();
        Some(format!("{}:{}", self.version(), hex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use serde_json::json;

    fn record(value: serde_json::Value) -> SourceRecord {
        SourceRecord::from_value(value).unwrap()
    }

    #[test]
    fn source_id_is_kept_verbatim() {
        let spec = registry::find("users").unwrap();
        let rec = record(json!({"id": "user-7", "email": "a@b.c"}));
        assert_eq!(
            HashIdMapper.destination_id(spec, &rec).as_deref(),
            Some("user-7")
        );
    }

    #[test]
    fn natural_key_hash_is_stable_and_versioned() {
        let spec = registry::find("users").unwrap();
        let rec = record(json!({"email": "a@b.c"}));
        let first = HashIdMapper.destination_id(spec, &rec).unwrap();
        let second = HashIdMapper.destination_id(spec, &rec).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("v1:"));

        let other = record(json!({"email": "other@b.c"}));
        assert_ne!(first, HashIdMapper.destination_id(spec, &other).unwrap());
    }

    #[test]
    fn incomplete_natural_key_yields_none() {
        let spec = registry::find("accounts").unwrap();
        let rec = record(json!({"name": "Everyday"}));
        assert_eq!(HashIdMapper.destination_id(spec, &rec), None);
    }
}
