//! Structured error kinds for resolution and linkage.
//!
//! Stage functions return `anyhow::Result`; failures that callers must tell
//! apart are raised as [`ResolveError`] and can be recovered with
//! `anyhow::Error::downcast_ref`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A match or join key references columns the input does not have
    Schema,
    /// A required upstream artifact is missing
    DataAvailability,
    /// The input has no records
    EmptyInput,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Schema => write!(f, "schema"),
            ErrorKind::DataAvailability => write!(f, "data_availability"),
            ErrorKind::EmptyInput => write!(f, "empty_input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Key columns absent; the pass or join strategy is skipped
    Schema { context: String, missing: Vec<String> },
    /// Corrected dataset, correction report, registry or key columns missing
    DataAvailability { artifact: String, message: String },
    /// Zero records; outputs degrade to empty collections
    EmptyInput { context: String },
}

impl ResolveError {
    pub fn schema(context: impl Into<String>, missing: Vec<String>) -> Self {
        Self::Schema {
            context: context.into(),
            missing,
        }
    }

    pub fn data_availability(artifact: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataAvailability {
            artifact: artifact.into(),
            message: message.into(),
        }
    }

    pub fn empty_input(context: impl Into<String>) -> Self {
        Self::EmptyInput {
            context: context.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema { .. } => ErrorKind::Schema,
            Self::DataAvailability { .. } => ErrorKind::DataAvailability,
            Self::EmptyInput { .. } => ErrorKind::EmptyInput,
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema { context, missing } => {
                write!(f, "{context}: missing column(s) {}", missing.join(", "))
            }
            Self::DataAvailability { artifact, message } => {
                write!(f, "{artifact} unavailable: {message}")
            }
            Self::EmptyInput { context } => write!(f, "{context}: no records"),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Kind of the first [`ResolveError`] in an error chain, if any
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ResolveError>())
        .map(ResolveError::kind)
}

/// Serializable failure or warning (kind + message) for run reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// `None` for failures outside the structured kinds (I/O, parse errors)
    pub kind: Option<ErrorKind>,
    pub message: String,
}

impl From<&ResolveError> for ErrorReport {
    fn from(err: &ResolveError) -> Self {
        Self {
            kind: Some(err.kind()),
            message: err.to_string(),
        }
    }
}

impl From<&anyhow::Error> for ErrorReport {
    fn from(err: &anyhow::Error) -> Self {
        Self {
            kind: error_kind(err),
            message: format!("{err:#}"),
        }
    }
}
