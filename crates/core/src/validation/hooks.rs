//! Named custom validation hooks addressed by `custom` rules.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::field_value::FieldValue;

/// A custom check: returns `true` when `value` passes given the rule `params`.
pub type CustomCheck = Arc<dyn Fn(&FieldValue, &serde_json::Value) -> bool + Send + Sync>;

pub const HOOK_POSITIVE_AMOUNT: &str = "positive_amount";
pub const HOOK_NOT_FUTURE_DATE: &str = "not_future_date";
pub const HOOK_US_STATE_CODE: &str = "us_state_code";
pub const HOOK_ONE_OF: &str = "one_of";

const US_STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY", "PR",
];

/// Registry of custom hooks, keyed by name.
#[derive(Clone)]
pub struct CustomRuleRegistry {
    hooks: HashMap<String, CustomCheck>,
}

impl CustomRuleRegistry {
    /// An empty registry with no hooks.
    pub fn empty() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// Register (or replace) a hook.
    pub fn register<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&FieldValue, &serde_json::Value) -> bool + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(check));
    }

    pub fn get(&self, name: &str) -> Option<&CustomCheck> {
        self.hooks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }
}

impl Default for CustomRuleRegistry {
    /// The built-in hooks.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(HOOK_POSITIVE_AMOUNT, |value, _| {
            matches!(value, FieldValue::Number(n) if *n > 0.0)
        });
        registry.register(HOOK_NOT_FUTURE_DATE, |value, _| match value {
            FieldValue::Date(d) => *d <= Utc::now().date_naive(),
            _ => false,
        });
        registry.register(HOOK_US_STATE_CODE, |value, _| {
            value
                .as_text()
                .map(|s| US_STATE_CODES.contains(&s.trim().to_ascii_uppercase().as_str()))
                .unwrap_or(false)
        });
        registry.register(HOOK_ONE_OF, |value, params| {
            let Some(text) = value.as_text() else {
                return false;
            };
            params
                .get("values")
                .and_then(|v| v.as_array())
                .map(|allowed| allowed.iter().any(|a| a.as_str() == Some(text.as_str())))
                .unwrap_or(false)
        });
        registry
    }
}

impl std::fmt::Debug for CustomRuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.hooks.keys().collect();
        names.sort();
        f.debug_struct("CustomRuleRegistry")
            .field("hooks", &names)
            .finish()
    }
}
