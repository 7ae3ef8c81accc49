//! Error types shared by every pipeline stage.
//!
//! Errors fall in two classes: record-level failures, which name the 1-based
//! position of the offending queue message and can be skipped, and terminal
//! failures, which stop the run.

use std::fmt;

use crate::codec::DecodingError;

/// Result alias used across the crate
pub type EtlResult<T> = Result<T, EtlError>;

/// Pipeline stage an error or a log line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extract => write!(f, "extract"),
            Stage::Transform => write!(f, "transform"),
            Stage::Load => write!(f, "load"),
        }
    }
}

/// Error type for the ETL pipeline
#[derive(Debug)]
pub enum EtlError {
    /// Transport or parse failure talking to the queue
    QueueUnavailable(String),
    /// A stage received zero items
    EmptyBatch(Stage),
    /// A message body lacks a required field
    MissingField {
        position: usize,
        field: &'static str,
    },
    /// A message body is not a JSON object of the expected shape
    InvalidMessage {
        position: usize,
        reason: String,
    },
    /// `app_version` cannot be truncated to an integer
    MalformedVersion {
        position: usize,
        value: Option<String>,
    },
    Decoding(DecodingError),
    /// The database connection could not be opened or prepared
    Connection(String),
    /// A single row insert failed
    Insert {
        position: usize,
        source: diesel::result::Error,
    },
    Config(String),
}

impl EtlError {
    /// Whether the error concerns one record and can be skipped
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            EtlError::MissingField { .. }
                | EtlError::InvalidMessage { .. }
                | EtlError::MalformedVersion { .. }
                | EtlError::Insert { .. }
        )
    }

    /// 1-based position of the queue message the error refers to, if any
    pub fn position(&self) -> Option<usize> {
        match self {
            EtlError::MissingField { position, .. }
            | EtlError::InvalidMessage { position, .. }
            | EtlError::MalformedVersion { position, .. }
            | EtlError::Insert { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Stage the error is reported against
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EtlError::QueueUnavailable(_) => Some(Stage::Extract),
            EtlError::EmptyBatch(stage) => Some(*stage),
            EtlError::MissingField { .. } | EtlError::InvalidMessage { .. } => Some(Stage::Transform),
            EtlError::MalformedVersion { .. }
            | EtlError::Connection(_)
            | EtlError::Insert { .. } => Some(Stage::Load),
            EtlError::Decoding(_) | EtlError::Config(_) => None,
        }
    }
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtlError::QueueUnavailable(msg) => write!(f, "Queue unavailable: {}", msg),
            EtlError::EmptyBatch(stage) => write!(f, "Empty batch at {} stage", stage),
            EtlError::MissingField { position, field } => {
                write!(f, "Message {} is invalid - '{}' is not available", position, field)
            }
            EtlError::InvalidMessage { position, reason } => {
                write!(f, "Message {} is invalid - {}", position, reason)
            }
            EtlError::MalformedVersion { position, value: Some(value) } => {
                write!(f, "Message {} has malformed app_version '{}'", position, value)
            }
            EtlError::MalformedVersion { position, value: None } => {
                write!(f, "Message {} has no app_version", position)
            }
            EtlError::Decoding(e) => write!(f, "{}", e),
            EtlError::Connection(msg) => write!(f, "Database connection error: {}", msg),
            EtlError::Insert { position, source } => {
                write!(f, "Failed to insert message {}: {}", position, source)
            }
            EtlError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for EtlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EtlError::Decoding(e) => Some(e),
            EtlError::Insert { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DecodingError> for EtlError {
    fn from(err: DecodingError) -> Self {
        EtlError::Decoding(err)
    }
}

impl From<reqwest::Error> for EtlError {
    fn from(err: reqwest::Error) -> Self {
        EtlError::QueueUnavailable(err.to_string())
    }
}

impl From<diesel::ConnectionError> for EtlError {
    fn from(err: diesel::ConnectionError) -> Self {
        EtlError::Connection(err.to_string())
    }
}
