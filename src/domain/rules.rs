//! Declarative query-parameter rules.
//!
//! A [`QueryRules`] set is built once per route and checked against the raw
//! query map of every request. Unlike the standalone validators, checking
//! accumulates every violation instead of stopping at the first one.

use std::collections::HashMap;

/// Expected shape of a query value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    String,
}

/// Constraint on a single query parameter.
///
/// For `Number` fields `min`/`max` bound the value; for `String` fields they
/// bound the length in characters.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    required: bool,
    kind: FieldKind,
    min: Option<f64>,
    max: Option<f64>,
    allowed: Option<Vec<String>>,
}

impl FieldRule {
    fn of_kind(kind: FieldKind) -> Self {
        Self {
            required: false,
            kind,
            min: None,
            max: None,
            allowed: None,
        }
    }

    pub fn number() -> Self {
        Self::of_kind(FieldKind::Number)
    }

    pub fn string() -> Self {
        Self::of_kind(FieldKind::String)
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn range(self, min: f64, max: f64) -> Self {
        self.min(min).max(max)
    }

    #[must_use]
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Appends every violation of this rule by `value` to `errors`.
    fn check(&self, field: &str, value: Option<&str>, errors: &mut Vec<String>) {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            if self.required {
                errors.push(format!("{field} is required"));
            }
            return;
        };

        match self.kind {
            FieldKind::Number => match raw.parse::<f64>() {
                Ok(number) if !number.is_nan() => {
                    if let Some(min) = self.min.filter(|min| number < *min) {
                        errors.push(format!("{field} must be at least {min}"));
                    }
                    if let Some(max) = self.max.filter(|max| number > *max) {
                        errors.push(format!("{field} must be at most {max}"));
                    }
                }
                _ => errors.push(format!("{field} must be a number")),
            },
            FieldKind::String => {
                let length = raw.chars().count() as f64;
                if let Some(min) = self.min.filter(|min| length < *min) {
                    errors.push(format!("{field} must be at least {min} characters"));
                }
                if let Some(max) = self.max.filter(|max| length > *max) {
                    errors.push(format!("{field} must be at most {max} characters"));
                }
            }
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|candidate| candidate == raw) {
                errors.push(format!("{field} must be one of: {}", allowed.join(", ")));
            }
        }
    }
}

/// Ordered set of field rules for one route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRules {
    rules: Vec<(String, FieldRule)>,
}

impl QueryRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule. Errors are reported in the order fields were added.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.push((name.into(), rule));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Checks every rule against `params` and returns all violations at once.
    pub fn check(&self, params: &HashMap<String, String>) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for (field, rule) in &self.rules {
            rule.check(field, params.get(field).map(String::as_str), &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
