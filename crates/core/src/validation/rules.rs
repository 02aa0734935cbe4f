//! Validation rule and result types.

use serde::{Deserialize, Serialize};

use crate::entity::TargetEntity;

/// Kind of check a rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Field must be present and non-empty.
    Required,
    /// Field must match a named format (`email`, `phone`, `tax_id`,
    /// `postal_code`) or a `pattern` regex.
    Format,
    /// Numeric, date or length bounds (`min`, `max`, `min_length`, `max_length`).
    Range,
    /// Named hook from the [`CustomRuleRegistry`](super::hooks::CustomRuleRegistry).
    Custom,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Format => "format",
            Self::Range => "range",
            Self::Custom => "custom",
        }
    }
}

/// A validation rule from a job's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Canonical (post-transformation) field the rule checks.
    pub field: String,
    pub kind: RuleKind,
    #[serde(default)]
    pub params: serde_json::Value,
    pub message: String,
    #[serde(default)]
    pub severity: ValidationSeverity,
    /// Restrict the rule to one target entity; `None` applies it to all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<TargetEntity>,
}

impl ValidationRule {
    pub fn required(field: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: RuleKind::Required,
            params: serde_json::Value::Null,
            message: format!("{field} is required"),
            severity: ValidationSeverity::Error,
            entity: None,
        }
    }

    pub fn email(field: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: RuleKind::Format,
            params: serde_json::json!({ "format": "email" }),
            message: format!("{field} must be a valid email address"),
            severity: ValidationSeverity::Error,
            entity: None,
        }
    }

    pub fn for_entity(mut self, entity: TargetEntity) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn as_warning(mut self) -> Self {
        self.severity = ValidationSeverity::Warning;
        self
    }

    /// Whether this rule should run for records resolved to `entity`.
    pub fn applies_to(&self, entity: TargetEntity) -> bool {
        self.entity.map_or(true, |e| e == entity)
    }
}

/// Whether a rule violation blocks the import or is informational.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    #[default]
    Error,
    Warning,
}

/// Aggregated outcome of transforming, validating and scoring one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<FieldViolation>,
    pub warnings: Vec<FieldViolation>,
    /// Filled in by the quality scorer; `1.0` until scored.
    pub quality_score: f64,
}

impl ValidationResult {
    pub fn new(errors: Vec<FieldViolation>, warnings: Vec<FieldViolation>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            quality_score: 1.0,
        }
    }
}

/// A single field-level rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub rule_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}
