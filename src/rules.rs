//! Named, reusable format rules for source fields.
//!
//! Each rule is a pure predicate over the field's text; rules are attached to
//! collections in the registry and evaluated by the record validator only
//! when the field is present and non-null. The GST cross-check is the one
//! cross-field rule and takes its tolerance from configuration.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::source::SourceRecord;

/// A field-shape predicate with enough metadata to produce a useful
/// diagnostic without re-running the check.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub name: &'static str,
    pub expected: &'static str,
    pub matches: fn(&str) -> bool,
}

/// Cross-field percentage check: `gst_field` must equal
/// `total_field / divisor` within the configured tolerance.
#[derive(Debug, Clone, Copy)]
pub struct GstRule {
    pub total_field: &'static str,
    pub gst_field: &'static str,
}

pub const BSB_RULE: FieldRule = FieldRule {
    field: "bsb",
    name: "bsb_format",
    expected: "NNN-NNN",
    matches: bsb_matches,
};

pub const PHONE_RULE: FieldRule = FieldRule {
    field: "phone",
    name: "phone_format",
    expected: "8-15 digits, optional leading + and separators",
    matches: phone_matches,
};

pub const CATEGORY_KIND_RULE: FieldRule = FieldRule {
    field: "kind",
    name: "category_kind",
    expected: "one of expense, income, transfer",
    matches: category_kind_matches,
};

pub const BUDGET_PERIOD_RULE: FieldRule = FieldRule {
    field: "period",
    name: "budget_period",
    expected: "YYYY-MM",
    matches: budget_period_matches,
};

static BSB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{3}-\d{3}$").expect("bsb pattern compiles"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?\d[\d ()\-]{6,14}$").expect("phone pattern compiles"));

static PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").expect("period pattern compiles"));

fn bsb_matches(value: &str) -> bool {
    BSB_RE.is_match(value)
}

fn phone_matches(value: &str) -> bool {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    (8..=15).contains(&digits) && PHONE_RE.is_match(value)
}

fn category_kind_matches(value: &str) -> bool {
    matches!(value, "expense" | "income" | "transfer")
}

fn budget_period_matches(value: &str) -> bool {
    PERIOD_RE.is_match(value)
}

/// Evaluate the GST cross-check for one record. Returns the expected value
/// when the declared GST amount drifts beyond `tolerance`; `None` when the
/// record passes or either field is absent (absence is a required-field
/// concern, not a format one).
pub fn gst_deviation(
    record: &SourceRecord,
    rule: &GstRule,
    divisor: f64,
    tolerance: f64,
) -> Option<f64> {
    let total = record.number(rule.total_field)?;
    let declared = record.number(rule.gst_field)?;
    let expected = total / divisor;
    if (declared - expected).abs() > tolerance {
        Some(expected)
    } else {
        None
    }
}
