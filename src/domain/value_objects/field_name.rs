use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_FIELD_NAME_LEN: usize = 128;

/// Schema-registered identifier of one editable field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldName(String);

impl FieldName {
    pub fn new(value: String) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Field name cannot be empty".to_string());
        }
        if value.len() > MAX_FIELD_NAME_LEN {
            return Err(format!(
                "Field name cannot exceed {MAX_FIELD_NAME_LEN} bytes"
            ));
        }
        if value.chars().any(char::is_whitespace) {
            return Err("Field name cannot contain whitespace".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<FieldName> for String {
    fn from(value: FieldName) -> Self {
        value.0
    }
}
