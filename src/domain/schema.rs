use crate::domain::value_objects::{FieldName, FieldValue};
use crate::shared::error::SyncError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How edits to a field reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavePolicy {
    /// Persisted after the debounce window closes.
    Debounced,
    /// Persisted inline from the edit call; the caller sees the save result.
    Immediate,
}

impl SavePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SavePolicy::Debounced => "debounced",
            SavePolicy::Immediate => "immediate",
        }
    }
}

#[derive(Debug, Clone)]
pub enum FieldValidator {
    NonEmpty,
    MaxLength(usize),
    NumberRange { min: f64, max: f64 },
}

impl FieldValidator {
    /// Null always passes: clearing a field is a valid edit regardless of the
    /// rules attached to it.
    pub fn check(&self, field: &FieldName, value: &FieldValue) -> Result<(), SyncError> {
        match (self, value) {
            (_, FieldValue::Null) => Ok(()),
            (FieldValidator::NonEmpty, FieldValue::Text(text)) => {
                if text.trim().is_empty() {
                    Err(validation_error(field, "must not be empty"))
                } else {
                    Ok(())
                }
            }
            (FieldValidator::MaxLength(max), FieldValue::Text(text)) => {
                if text.chars().count() > *max {
                    Err(validation_error(
                        field,
                        &format!("must not exceed {max} characters"),
                    ))
                } else {
                    Ok(())
                }
            }
            (FieldValidator::NumberRange { min, max }, FieldValue::Number(n)) => {
                if *n >= *min && *n <= *max {
                    Ok(())
                } else {
                    Err(validation_error(
                        field,
                        &format!("must be between {min} and {max}"),
                    ))
                }
            }
            (FieldValidator::NumberRange { .. }, other) => Err(validation_error(
                field,
                &format!("expected a number, got {}", other.type_name()),
            )),
            (_, other) => Err(validation_error(
                field,
                &format!("expected text, got {}", other.type_name()),
            )),
        }
    }
}

fn validation_error(field: &FieldName, reason: &str) -> SyncError {
    SyncError::Validation {
        field: field.as_str().to_string(),
        reason: reason.to_string(),
    }
}

/// Declaration of one editable field: its default, the backend column it maps
/// to, the rules an edit must satisfy, and how its saves are triggered.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: FieldName,
    default: FieldValue,
    column: String,
    policy: SavePolicy,
    validators: Vec<FieldValidator>,
}

impl FieldSpec {
    pub fn new(name: FieldName) -> Self {
        let column = name.as_str().to_string();
        Self {
            name,
            default: FieldValue::Null,
            column,
            policy: SavePolicy::Debounced,
            validators: Vec::new(),
        }
    }

    pub fn with_default(mut self, value: FieldValue) -> Self {
        self.default = value;
        self
    }

    /// Remote column name when it differs from the field name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn with_policy(mut self, policy: SavePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_validator(mut self, validator: FieldValidator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn name(&self) -> &FieldName {
        &self.name
    }

    pub fn default_value(&self) -> &FieldValue {
        &self.default
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn policy(&self) -> SavePolicy {
        self.policy
    }

    pub fn validate_value(&self, value: &FieldValue) -> Result<(), SyncError> {
        for validator in &self.validators {
            validator.check(&self.name, value)?;
        }
        Ok(())
    }
}

/// The ordered set of fields one record carries. Snapshots and batch payloads
/// follow registration order.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
    index: HashMap<String, usize>,
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, String> {
        if fields.is_empty() {
            return Err("Schema requires at least one field".to_string());
        }
        let mut index = HashMap::with_capacity(fields.len());
        for (position, spec) in fields.iter().enumerate() {
            if index
                .insert(spec.name().as_str().to_string(), position)
                .is_some()
            {
                return Err(format!("Duplicate field in schema: {}", spec.name()));
            }
        }
        Ok(Self { fields, index })
    }

    pub fn get(&self, name: &FieldName) -> Option<&FieldSpec> {
        self.index
            .get(name.as_str())
            .map(|position| &self.fields[*position])
    }

    pub fn contains(&self, name: &FieldName) -> bool {
        self.index.contains_key(name.as_str())
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(value: &str) -> FieldName {
        FieldName::new(value.to_string()).unwrap()
    }

    #[test]
    fn column_defaults_to_field_name() {
        let spec = FieldSpec::new(name("headline"));
        assert_eq!(spec.column(), "headline");
        assert_eq!(spec.policy(), SavePolicy::Debounced);

        let mapped = FieldSpec::new(name("headline")).with_column("profile_headline");
        assert_eq!(mapped.column(), "profile_headline");
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let result = FieldSchema::new(vec![
            FieldSpec::new(name("bio")),
            FieldSpec::new(name("bio")),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn empty_schema_is_rejected() {
        assert!(FieldSchema::new(Vec::new()).is_err());
    }

    #[test]
    fn lookup_follows_registration() {
        let schema = FieldSchema::new(vec![
            FieldSpec::new(name("headline")),
            FieldSpec::new(name("bio")),
        ])
        .unwrap();
        assert!(schema.contains(&name("bio")));
        assert!(!schema.contains(&name("tagline")));
        assert_eq!(schema.get(&name("headline")).unwrap().column(), "headline");
        assert_eq!(schema.len(), 2);
    }

    #[test]
    fn number_range_checks_bounds_and_type() {
        let field = name("completeness");
        let range = FieldValidator::NumberRange {
            min: 0.0,
            max: 100.0,
        };
        assert!(range.check(&field, &FieldValue::from(55.0)).is_ok());
        assert!(range.check(&field, &FieldValue::from(100.0)).is_ok());
        assert!(range.check(&field, &FieldValue::from(-1.0)).is_err());
        assert!(range.check(&field, &FieldValue::from(100.5)).is_err());
        assert!(range.check(&field, &FieldValue::from("55")).is_err());
    }

    #[test]
    fn text_validators_pass_null_through() {
        let field = name("headline");
        assert!(FieldValidator::NonEmpty.check(&field, &FieldValue::Null).is_ok());
        assert!(
            FieldValidator::MaxLength(3)
                .check(&field, &FieldValue::Null)
                .is_ok()
        );
        assert!(
            FieldValidator::NonEmpty
                .check(&field, &FieldValue::from("  "))
                .is_err()
        );
        assert!(
            FieldValidator::MaxLength(3)
                .check(&field, &FieldValue::from("abcd"))
                .is_err()
        );
    }

    #[test]
    fn spec_runs_all_validators_in_order() {
        let spec = FieldSpec::new(name("headline"))
            .with_validator(FieldValidator::NonEmpty)
            .with_validator(FieldValidator::MaxLength(10));
        assert!(spec.validate_value(&FieldValue::from("founder")).is_ok());
        assert!(spec.validate_value(&FieldValue::from("")).is_err());
        assert!(
            spec.validate_value(&FieldValue::from("a very long headline"))
                .is_err()
        );
    }
}
