use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    pub fn kind(&self) -> SaveErrorKind {
        match self {
            SyncError::UnknownField(_) => SaveErrorKind::Validation,
            SyncError::Validation { .. } => SaveErrorKind::Validation,
            SyncError::Network(_) => SaveErrorKind::Network,
            SyncError::Auth(_) => SaveErrorKind::Auth,
            SyncError::Constraint(_) => SaveErrorKind::Constraint,
            SyncError::Timeout(_) => SaveErrorKind::Timeout,
            SyncError::Internal(_) => SaveErrorKind::Internal,
        }
    }

    /// Failures that indicate the backend was unreachable rather than
    /// rejecting the request. At load time these propagate instead of being
    /// absorbed as an empty record.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::Timeout(_))
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Internal(err.to_string())
    }
}

impl From<String> for SyncError {
    fn from(err: String) -> Self {
        SyncError::Internal(err)
    }
}

impl From<&str> for SyncError {
    fn from(err: &str) -> Self {
        SyncError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Classification of a save or load failure, persisted into field and record
/// snapshots as the most recent error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SaveErrorKind {
    Validation,
    Network,
    Auth,
    Constraint,
    Timeout,
    Internal,
}

impl SaveErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveErrorKind::Validation => "validation",
            SaveErrorKind::Network => "network",
            SaveErrorKind::Auth => "auth",
            SaveErrorKind::Constraint => "constraint",
            SaveErrorKind::Timeout => "timeout",
            SaveErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for SaveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaveErrorKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "validation" => Ok(SaveErrorKind::Validation),
            "network" => Ok(SaveErrorKind::Network),
            "auth" => Ok(SaveErrorKind::Auth),
            "constraint" => Ok(SaveErrorKind::Constraint),
            "timeout" => Ok(SaveErrorKind::Timeout),
            "internal" => Ok(SaveErrorKind::Internal),
            _ => Err(()),
        }
    }
}
