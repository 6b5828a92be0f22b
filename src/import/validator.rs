//! Per-record validation: required fields, format rules, foreign keys.
//!
//! All failures for a record are collected in one pass so a bad record
//! yields a complete diagnostic instead of needing repeated imports.

use serde::{Deserialize, Serialize};

use crate::config::MigrationConfig;
use crate::import::engine::ImportedIdSet;
use crate::registry::CollectionSpec;
use crate::rules;
use crate::source::SourceRecord;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub field: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

pub struct RecordValidator<'a> {
    config: &'a MigrationConfig,
}

impl<'a> RecordValidator<'a> {
    pub fn new(config: &'a MigrationConfig) -> Self {
        Self { config }
    }

    /// Empty result means valid. Checks run in order: required fields,
    /// format rules, GST cross-check, foreign keys, without short-circuits.
    pub fn validate(
        &self,
        record: &SourceRecord,
        spec: &CollectionSpec,
        imported: &ImportedIdSet,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for field in spec.required_fields {
            if !record.non_empty(field) {
                errors.push(ValidationError {
                    field: (*field).to_string(),
                    error: "required field missing or empty".to_string(),
                    value: record.scalar_string(field),
                    expected: None,
                });
            }
        }

        for rule in spec.format_rules {
            if !record.present(rule.field) {
                continue;
            }
            let Some(text) = record.text(rule.field) else {
                errors.push(ValidationError {
                    field: rule.field.to_string(),
                    error: format!("{}: expected a string value", rule.name),
                    value: record.scalar_string(rule.field),
                    expected: Some(rule.expected.to_string()),
                });
                continue;
            };
            if !(rule.matches)(text) {
                errors.push(ValidationError {
                    field: rule.field.to_string(),
                    error: format!("{} violated", rule.name),
                    value: Some(text.to_string()),
                    expected: Some(rule.expected.to_string()),
                });
            }
        }

        if let Some(gst) = &spec.gst {
            if let Some(expected) =
                rules::gst_deviation(record, gst, self.config.gst_divisor, self.config.gst_tolerance)
            {
                errors.push(ValidationError {
                    field: gst.gst_field.to_string(),
                    error: format!(
                        "GST amount deviates from {}/{} beyond tolerance {}",
                        gst.total_field, self.config.gst_divisor, self.config.gst_tolerance
                    ),
                    value: record.scalar_string(gst.gst_field),
                    expected: Some(format!("{expected:.2}")),
                });
            }
        }

        for fk in spec.foreign_keys {
            match record.scalar_string(fk.field) {
                Some(value) => {
                    if !imported.contains(fk.references, &value) {
                        errors.push(ValidationError {
                            field: fk.field.to_string(),
                            error: format!(
                                "foreign key does not resolve in {} imported this run",
                                fk.references
                            ),
                            value: Some(value),
                            expected: None,
                        });
                    }
                }
                None => {
                    // Absent-and-optional is fine. Required FK fields are
                    // normally also in required_fields; report here only when
                    // the registry declares them required without that.
                    if fk.required && !spec.required_fields.contains(&fk.field) {
                        errors.push(ValidationError {
                            field: fk.field.to_string(),
                            error: "required foreign key missing".to_string(),
                            value: None,
                            expected: None,
                        });
                    }
                }
            }
        }

        errors
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

    fn validator(config: &MigrationConfig) -> RecordValidator<'_> {
        RecordValidator::new(config)
    }

    #[test]
    fn collects_every_failure_in_one_pass() {
        let config = MigrationConfig::default();
        let spec = registry::find("accounts").unwrap();
        let mut imported = ImportedIdSet::default();
        imported.insert("users", "u1");

        // Missing name, bad BSB, unresolved user: three distinct errors.
        let rec = record(json!({"id": "a1", "user_id": "ghost", "bsb": "12-345"}));
        let errors = validator(&config).validate(&rec, spec, &imported);
        assert_eq!(errors.len(), 3);

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"bsb"));
        assert!(fields.contains(&"user_id"));
    }

    #[test]
    fn optional_foreign_key_may_be_absent() {
        let config = MigrationConfig::default();
        let spec = registry::find("transactions").unwrap();
        let mut imported = ImportedIdSet::default();
        imported.insert("accounts", "acc1");

        let rec = record(json!({
            "id": "t1",
            "account_id": "acc1",
            "amount": 110.0,
            "gst_amount": 10.0,
            "occurred_at": "2025-07-01T10:00:00Z",
        }));
        assert!(validator(&config).validate(&rec, spec, &imported).is_empty());
    }

    #[test]
    fn present_optional_foreign_key_must_resolve() {
        let config = MigrationConfig::default();
        let spec = registry::find("transactions").unwrap();
        let mut imported = ImportedIdSet::default();
        imported.insert("accounts", "acc1");

        let rec = record(json!({
            "id": "t1",
            "account_id": "acc1",
            "category_id": "ghost",
            "amount": 55.0,
            "occurred_at": "2025-07-01T10:00:00Z",
        }));
        let errors = validator(&config).validate(&rec, spec, &imported);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "category_id");
    }

    #[test]
    fn gst_tolerance_comes_from_configuration() {
        let mut config = MigrationConfig::default();
        let spec = registry::find("transactions").unwrap();
        let mut imported = ImportedIdSet::default();
        imported.insert("accounts", "acc1");

        let rec = record(json!({
            "id": "t1",
            "account_id": "acc1",
            "amount": 110.0,
            "gst_amount": 10.5,
            "occurred_at": "2025-07-01T10:00:00Z",
        }));
        let errors = validator(&config).validate(&rec, spec, &imported);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].expected.as_deref(), Some("10.00"));

        // A looser tolerance accepts the same record.
        config.gst_tolerance = 1.0;
        assert!(validator(&config).validate(&rec, spec, &imported).is_empty());
    }
}
