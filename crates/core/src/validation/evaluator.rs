//! Rule evaluator. Pure logic, no database access.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

use super::hooks::CustomRuleRegistry;
use super::rules::{FieldViolation, RuleKind, ValidationResult, ValidationRule, ValidationSeverity};
use crate::entity::TargetEntity;
use crate::field_value::{FieldValue, RawRecord};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9()\-.\s]{7,20}$").expect("valid phone regex")
});
static TAX_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2}-\d{7}|\d{3}-\d{2}-\d{4}|\d{9})$").expect("valid tax id regex")
});
static POSTAL_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("valid postal code regex"));

/// Rule type recorded when a custom rule names an unregistered hook.
pub const RULE_TYPE_UNKNOWN_HOOK: &str = "unknown_hook";

/// Evaluate every rule that applies to `entity` against a transformed record.
///
/// The returned result is unscored; the quality scorer fills in
/// `quality_score`.
pub fn evaluate_rules(
    rules: &[ValidationRule],
    data: &RawRecord,
    entity: TargetEntity,
    hooks: &CustomRuleRegistry,
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for rule in rules.iter().filter(|r| r.applies_to(entity)) {
        match evaluate_single_rule(rule, data, hooks) {
            RuleCheck::Pass => {}
            RuleCheck::Violation(v) => match rule.severity {
                ValidationSeverity::Error => errors.push(v),
                ValidationSeverity::Warning => warnings.push(v),
            },
            RuleCheck::Misconfigured(v) => warnings.push(v),
        }
    }

    ValidationResult::new(errors, warnings)
}

enum RuleCheck {
    Pass,
    Violation(FieldViolation),
    /// The rule itself is broken; reported as a warning, never blocks.
    Misconfigured(FieldViolation),
}

fn evaluate_single_rule(
    rule: &ValidationRule,
    data: &RawRecord,
    hooks: &CustomRuleRegistry,
) -> RuleCheck {
    let value = data.get(&rule.field).filter(|v| !v.is_empty());

    match rule.kind {
        RuleKind::Required => match value {
            None => RuleCheck::Violation(violation(rule, None)),
            Some(_) => RuleCheck::Pass,
        },
        // The remaining kinds do not enforce presence.
        RuleKind::Format => match value {
            None => RuleCheck::Pass,
            Some(v) => evaluate_format(rule, v),
        },
        RuleKind::Range => match value {
            None => RuleCheck::Pass,
            Some(v) => check(rule, v, in_range(&rule.params, v)),
        },
        RuleKind::Custom => {
            let Some(v) = value else {
                return RuleCheck::Pass;
            };
            let hook_name = rule.params.get("hook").and_then(Value::as_str).unwrap_or("");
            match hooks.get(hook_name) {
                Some(hook) => check(rule, v, hook(v, &rule.params)),
                None => RuleCheck::Misconfigured(FieldViolation {
                    field: rule.field.clone(),
                    rule_type: RULE_TYPE_UNKNOWN_HOOK.to_string(),
                    message: format!("Custom validation hook '{hook_name}' is not registered"),
                    value: None,
                }),
            }
        }
    }
}

fn violation(rule: &ValidationRule, value: Option<&FieldValue>) -> FieldViolation {
    FieldViolation {
        field: rule.field.clone(),
        rule_type: rule.kind.as_str().to_string(),
        message: rule.message.clone(),
        value: value.map(FieldValue::to_json),
    }
}

fn check(rule: &ValidationRule, value: &FieldValue, passed: bool) -> RuleCheck {
    if passed {
        RuleCheck::Pass
    } else {
        RuleCheck::Violation(violation(rule, Some(value)))
    }
}

fn evaluate_format(rule: &ValidationRule, value: &FieldValue) -> RuleCheck {
    let Some(text) = value.as_text() else {
        return RuleCheck::Pass;
    };
    let text = text.trim();

    if let Some(pattern) = rule.params.get("pattern").and_then(Value::as_str) {
        return match Regex::new(pattern) {
            Ok(re) => check(rule, value, re.is_match(text)),
            Err(e) => RuleCheck::Misconfigured(FieldViolation {
                field: rule.field.clone(),
                rule_type: rule.kind.as_str().to_string(),
                message: format!("Invalid pattern '{pattern}': {e}"),
                value: None,
            }),
        };
    }

    let re: &Regex = match rule.params.get("format").and_then(Value::as_str) {
        Some("email") => &*EMAIL_RE,
        Some("phone") => &*PHONE_RE,
        Some("tax_id") => &*TAX_ID_RE,
        Some("postal_code") => &*POSTAL_CODE_RE,
        other => {
            return RuleCheck::Misconfigured(FieldViolation {
                field: rule.field.clone(),
                rule_type: rule.kind.as_str().to_string(),
                message: format!("Unknown format '{}'", other.unwrap_or("")),
                value: None,
            })
        }
    };
    check(rule, value, re.is_match(text))
}

/// Check numeric, date, or length bounds from `params`.
fn in_range(params: &Value, value: &FieldValue) -> bool {
    if let FieldValue::Date(d) = value {
        let bound = |key: &str| {
            params
                .get(key)
                .and_then(Value::as_str)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        };
        return bound("min").map_or(true, |min| *d >= min)
            && bound("max").map_or(true, |max| *d <= max);
    }

    let numeric = match value {
        FieldValue::Number(n) => Some(*n),
        FieldValue::String(s) if params.get("min").is_some() || params.get("max").is_some() => {
            match s.trim().parse::<f64>() {
                Ok(n) => Some(n),
                Err(_) => return false,
            }
        }
        _ => None,
    };
    if let Some(n) = numeric {
        let min = params.get("min").and_then(Value::as_f64).unwrap_or(f64::NEG_INFINITY);
        let max = params.get("max").and_then(Value::as_f64).unwrap_or(f64::INFINITY);
        if n < min || n > max {
            return false;
        }
    }

    if let Some(text) = value.as_text() {
        let len = text.chars().count() as u64;
        let min_len = params.get("min_length").and_then(Value::as_u64).unwrap_or(0);
        let max_len = params.get("max_length").and_then(Value::as_u64).unwrap_or(u64::MAX);
        if len < min_len || len > max_len {
            return false;
        }
    }
    true
}
