//! Error taxonomy shared by search, negotiation and booking
use std::convert::Infallible;

#[derive(thiserror::Error, Debug)]
pub enum FreightError {
    #[error("invalid input: {0}")]
    ClientInput(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Tells the caller what to do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fix your input.
    Input,
    /// The resource is gone or never existed.
    Gone,
    /// Try again, possibly with fresh state.
    Retry,
    Internal,
}

impl FreightError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::ClientInput(msg.into())
    }
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ClientInput(_) => ErrorCategory::Input,
            Self::NotFound { .. } => ErrorCategory::Gone,
            Self::Conflict(_) | Self::ServiceUnavailable(_) => ErrorCategory::Retry,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Retry
    }
}

impl From<sled::Error> for FreightError {
    fn from(err: sled::Error) -> Self {
        Self::ServiceUnavailable(format!("store: {err}"))
    }
}

impl From<minicbor::decode::Error> for FreightError {
    fn from(err: minicbor::decode::Error) -> Self {
        Self::Internal(format!("failed to decode record: {err}"))
    }
}

impl From<minicbor::encode::Error<Infallible>> for FreightError {
    fn from(err: minicbor::encode::Error<Infallible>) -> Self {
        Self::Internal(format!("failed to encode record: {err}"))
    }
}

/// A [`FreightError`] tagged with the trace id of the request that raised it.
#[derive(thiserror::Error, Debug)]
#[error("[{trace_id}] {error}")]
pub struct Failure {
    pub trace_id: String,
    pub category: ErrorCategory,
    #[source]
    pub error: FreightError,
}

impl Failure {
    /// Wraps and logs an error. Internal errors are logged in full and
    /// surfaced with a generic message.
    pub fn new(trace_id: &str, error: FreightError) -> Self {
        let category = error.category();
        match category {
            ErrorCategory::Internal => {
                tracing::error!(trace_id = %trace_id, error = ?error, "request failed")
            }
            _ => tracing::warn!(trace_id = %trace_id, category = ?category, "{error}"),
        }
        Self {
            trace_id: trace_id.to_string(),
            category,
            error,
        }
    }

    pub fn public_message(&self) -> String {
        match self.category {
            ErrorCategory::Internal => format!("internal error (trace {})", self.trace_id),
            _ => self.error.to_string(),
        }
    }
}

pub type FreightResult<T> = Result<T, FreightError>;
