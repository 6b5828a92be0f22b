//! Static collection registry and dependency ordering.
//!
//! Every collection the pipeline knows about is declared here once; the rest
//! of the importer and verifier is generic over these descriptors. The
//! declared dependency edges must form a DAG; a cycle is a configuration
//! error and aborts startup rather than looping.

use std::collections::HashMap;

use thiserror::Error;

use crate::rules::{FieldRule, GstRule, BSB_RULE, BUDGET_PERIOD_RULE, CATEGORY_KIND_RULE, PHONE_RULE};

/// A declared foreign-key edge from a source field to another collection.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKeySpec {
    pub field: &'static str,
    pub references: &'static str,
    /// Optional edges tolerate an absent or null value.
    pub required: bool,
}

/// Immutable descriptor for one collection → table mapping.
#[derive(Debug, Clone, Copy)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub source_file: &'static str,
    pub dependencies: &'static [&'static str],
    pub required_fields: &'static [&'static str],
    /// Unique-field tuples probed by the duplicate detector. Empty means the
    /// collection legitimately allows repeated rows.
    pub unique_tuples: &'static [&'static [&'static str]],
    pub foreign_keys: &'static [ForeignKeySpec],
    pub format_rules: &'static [FieldRule],
    pub gst: Option<GstRule>,
    /// Fields compared during sampled verification.
    pub compare_fields: &'static [&'static str],
    /// Subset of `compare_fields` compared with a numeric tolerance.
    pub amount_fields: &'static [&'static str],
    /// Fields hashed into a destination id when the source row has none.
    pub natural_key: &'static [&'static str],
}

static COLLECTIONS: &[CollectionSpec] = &[
    CollectionSpec {
        name: "users",
        table: "users",
        source_file: "users.json",
        dependencies: &[],
        required_fields: &["id", "email"],
        unique_tuples: &[&["email"]],
        foreign_keys: &[],
        format_rules: &[PHONE_RULE],
        gst: None,
        compare_fields: &["email", "full_name", "phone"],
        amount_fields: &[],
        natural_key: &["email"],
    },
    CollectionSpec {
        name: "categories",
        table: "categories",
        source_file: "categories.json",
        dependencies: &[],
        required_fields: &["id", "name", "kind"],
        unique_tuples: &[&["name", "kind"]],
        foreign_keys: &[],
        format_rules: &[CATEGORY_KIND_RULE],
        gst: None,
        compare_fields: &["name", "kind"],
        amount_fields: &[],
        natural_key: &["name", "kind"],
    },
    CollectionSpec {
        name: "accounts",
        table: "accounts",
        source_file: "accounts.json",
        dependencies: &["users"],
        required_fields: &["id", "user_id", "name"],
        unique_tuples: &[&["user_id", "bsb", "account_number"]],
        foreign_keys: &[ForeignKeySpec {
            field: "user_id",
            references: "users",
            required: true,
        }],
        format_rules: &[BSB_RULE],
        gst: None,
        compare_fields: &["name", "bsb", "account_number"],
        amount_fields: &[],
        natural_key: &["user_id", "bsb", "account_number"],
    },
    CollectionSpec {
        name: "transactions",
        table: "transactions",
        source_file: "transactions.json",
        dependencies: &["accounts", "categories"],
        required_fields: &["id", "account_id", "amount", "occurred_at"],
        unique_tuples: &[],
        foreign_keys: &[
            ForeignKeySpec {
                field: "account_id",
                references: "accounts",
                required: true,
            },
            ForeignKeySpec {
                field: "category_id",
                references: "categories",
                required: false,
            },
        ],
        format_rules: &[],
        gst: Some(GstRule {
            total_field: "amount",
            gst_field: "gst_amount",
        }),
        compare_fields: &["amount", "gst_amount", "description", "occurred_at"],
        amount_fields: &["amount", "gst_amount"],
        natural_key: &["account_id", "occurred_at", "amount"],
    },
    CollectionSpec {
        name: "budgets",
        table: "budgets",
        source_file: "budgets.json",
        dependencies: &["users", "categories"],
        required_fields: &["id", "user_id", "category_id", "amount", "period"],
        unique_tuples: &[&["user_id", "category_id", "period"]],
        foreign_keys: &[
            ForeignKeySpec {
                field: "user_id",
                references: "users",
                required: true,
            },
            ForeignKeySpec {
                field: "category_id",
                references: "categories",
                required: true,
            },
        ],
        format_rules: &[BUDGET_PERIOD_RULE],
        gst: None,
        compare_fields: &["amount", "period"],
        amount_fields: &["amount"],
        natural_key: &["user_id", "category_id", "period"],
    },
];

pub fn collections() -> &'static [CollectionSpec] {
    COLLECTIONS
}

pub fn find(name: &str) -> Option<&'static CollectionSpec> {
    COLLECTIONS.iter().find(|spec| spec.name == name)
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("collection {collection} depends on unknown collection {dependency}")]
    UnknownDependency {
        collection: String,
        dependency: String,
    },
    #[error("dependency cycle among collections: {0}")]
    DependencyCycle(String),
}

/// Topological sort over the declared edges, preserving declaration order
/// among ready collections so runs are deterministic.
pub fn dependency_order(
    specs: &'static [CollectionSpec],
) -> Result<Vec<&'static CollectionSpec>, RegistryError> {
    let by_name: HashMap<&str, &'static CollectionSpec> =
        specs.iter().map(|spec| (spec.name, spec)).collect();

    for spec in specs {
        for dep in spec.dependencies {
            if !by_name.contains_key(dep) {
                return Err(RegistryError::UnknownDependency {
                    collection: spec.name.to_string(),
                    dependency: (*dep).to_string(),
                });
            }
        }
    }

    let mut ordered: Vec<&'static CollectionSpec> = Vec::with_capacity(specs.len());
    let mut satisfied: Vec<&str> = Vec::new();
    while ordered.len() < specs.len() {
        let mut progressed = false;
        for spec in specs {
            if satisfied.contains(&spec.name) {
                continue;
            }
            if spec.dependencies.iter().all(|d| satisfied.contains(d)) {
                satisfied.push(spec.name);
                ordered.push(spec);
                progressed = true;
            }
        }
        if !progressed {
            let stuck: Vec<&str> = specs
                .iter()
                .filter(|spec| !satisfied.contains(&spec.name))
                .map(|spec| spec.name)
                .collect();
            return Err(RegistryError::DependencyCycle(stuck.join(", ")));
        }
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_orders_dependencies_first() {
        let order = dependency_order(collections()).unwrap();
        let names: Vec<&str> = order.iter().map(|s| s.name).collect();
        let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();

        for spec in collections() {
            for dep in spec.dependencies {
                assert!(
                    pos(dep) < pos(spec.name),
                    "{} must come before {}",
                    dep,
                    spec.name
                );
            }
        }
        assert_eq!(names.len(), collections().len());
    }

    const CYCLE: &[CollectionSpec] = &[
        CollectionSpec {
            name: "a",
            table: "a",
            source_file: "a.json",
            dependencies: &["b"],
            required_fields: &[],
            unique_tuples: &[],
            foreign_keys: &[],
            format_rules: &[],
            gst: None,
            compare_fields: &[],
            amount_fields: &[],
            natural_key: &[],
        },
        CollectionSpec {
            name: "b",
            table: "b",
            source_file: "b.json",
            dependencies: &["a"],
            required_fields: &[],
            unique_tuples: &[],
            foreign_keys: &[],
            format_rules: &[],
            gst: None,
            compare_fields: &[],
            amount_fields: &[],
            natural_key: &[],
        },
    ];

    #[test]
    fn cycle_is_a_fatal_configuration_error() {
        let err = dependency_order(CYCLE).unwrap_err();
        matches!(err, RegistryError::DependencyCycle(_))
            .then_some(())
            .unwrap();
    }

    const DANGLING: &[CollectionSpec] = &[CollectionSpec {
        name: "a",
        table: "a",
        source_file: "a.json",
        dependencies: &["ghost"],
        required_fields: &[],
        unique_tuples: &[],
        foreign_keys: &[],
        format_rules: &[],
        gst: None,
        compare_fields: &[],
        amount_fields: &[],
        natural_key: &[],
    }];

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = dependency_order(DANGLING).unwrap_err();
        matches!(err, RegistryError::UnknownDependency { .. })
            .then_some(())
            .unwrap();
    }
}
