use serde::{Deserialize, Serialize};
use std::fmt;

/// Value carried by one field: free text, a number, or explicitly unset.
///
/// Comparison is exact. Dirty tracking and the stale-save guard both rely on
/// equality of the value that was sent against the value currently held, so
/// no normalization happens here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    #[default]
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Number(_) => "number",
            FieldValue::Null => "null",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(value) => write!(f, "{value}"),
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => FieldValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_exact() {
        assert_eq!(FieldValue::from("seed"), FieldValue::from("seed"));
        assert_ne!(FieldValue::from("seed"), FieldValue::from("Seed"));
        assert_ne!(FieldValue::from(10.0), FieldValue::from(10.5));
        assert_eq!(FieldValue::Null, FieldValue::Null);
        assert_ne!(FieldValue::from("10"), FieldValue::from(10.0));
    }

    #[test]
    fn untagged_serde_maps_to_plain_json() {
        assert_eq!(
            serde_json::to_string(&FieldValue::from("pre-seed")).unwrap(),
            "\"pre-seed\""
        );
        assert_eq!(serde_json::to_string(&FieldValue::from(72.5)).unwrap(), "72.5");
        assert_eq!(serde_json::to_string(&FieldValue::Null).unwrap(), "null");

        assert_eq!(
            serde_json::from_str::<FieldValue>("null").unwrap(),
            FieldValue::Null
        );
        assert_eq!(
            serde_json::from_str::<FieldValue>("3.5").unwrap(),
            FieldValue::Number(3.5)
        );
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        let missing: Option<&str> = None;
        assert_eq!(FieldValue::from(missing), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("x")), FieldValue::from("x"));
    }
}
