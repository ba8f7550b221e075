//! Failure classification for retry decisions.
//!
//! Unknown failures are treated as retryable.

use std::io;

use lazy_static::lazy_static;
use regex::RegexSet;
use thiserror::Error;
use tracing::trace;

lazy_static! {
    static ref NON_RETRYABLE: RegexSet = RegexSet::new([
        r"\b(400|401|403|404|422)\b",
        r"unauthori[sz]ed|authentication|not authenticated|invalid api key|forbidden",
        r"permission denied|access denied",
        r"not found|no such file|enoent",
        r"invalid (input|request|argument|format|json)|malformed|bad request|validation (error|failed)",
        r"syntax ?error|parse error|failed to parse|unexpected token",
    ])
    .expect("non-retryable patterns are valid");

    static ref RETRYABLE: RegexSet = RegexSet::new([
        r"timeout|timed out|etimedout|deadline exceeded",
        r"econnreset|econnrefused|enotfound|eai_again|socket hang up|broken pipe",
        r"network|connection (reset|refused|closed|aborted)",
        r"rate.?limit|too many requests|\b429\b|quota",
        r"\b5\d\d\b|internal server error|bad gateway|service unavailable|gateway timeout",
        r"overloaded|temporar(y|ily) unavailable|try again",
    ])
    .expect("retryable patterns are valid");
}

/// Whether a failed attempt is worth repeating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Retryable)
    }
}

/// Explicit classification an analyzer can attach to its error.
///
/// Takes precedence over message matching anywhere in the error chain.
#[derive(Debug, Clone, Error)]
pub enum FailureHint {
    #[error("{0}")]
    Permanent(String),
    #[error("{0}")]
    Transient(String),
}

impl FailureHint {
    pub fn permanent(message: impl Into<String>) -> anyhow::Error {
        Self::Permanent(message.into()).into()
    }

    pub fn transient(message: impl Into<String>) -> anyhow::Error {
        Self::Transient(message.into()).into()
    }
}

/// A single attempt exceeded the configured timeout
#[derive(Debug, Clone, Copy, Error)]
#[error("attempt timed out after {timeout_ms}ms")]
pub struct AttemptTimedOut {
    pub timeout_ms: u64,
}

/// Classify an analysis failure.
///
/// Order: explicit hints, timeouts, `io::ErrorKind`, then message patterns
/// over the whole chain (non-retryable first). Anything else is retryable.
pub fn classify(error: &anyhow::Error) -> ErrorClass {
    for cause in error.chain() {
        if let Some(hint) = cause.downcast_ref::<FailureHint>() {
            return match hint {
                FailureHint::Permanent(_) => ErrorClass::NonRetryable,
                FailureHint::Transient(_) => ErrorClass::Retryable,
            };
        }
        if cause.downcast_ref::<AttemptTimedOut>().is_some()
            || cause.downcast_ref::<tokio::time::error::Elapsed>().is_some()
        {
            return ErrorClass::Retryable;
        }
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            if let Some(class) = classify_io_kind(io_error.kind()) {
                return class;
            }
        }
    }

    classify_message(&format!("{:#}", error))
}

/// Classify a bare error message
pub fn classify_message(message: &str) -> ErrorClass {
    let message = message.to_lowercase();
    if NON_RETRYABLE.is_match(&message) {
        return ErrorClass::NonRetryable;
    }
    if !RETRYABLE.is_match(&message) {
        trace!(%message, "unclassified failure, treating as retryable");
    }
    ErrorClass::Retryable
}

fn classify_io_kind(kind: io::ErrorKind) -> Option<ErrorClass> {
    use io::ErrorKind::*;

    match kind {
        NotFound | PermissionDenied | InvalidInput | InvalidData | Unsupported => {
            Some(ErrorClass::NonRetryable)
        }
        TimedOut | ConnectionReset | ConnectionRefused | ConnectionAborted | BrokenPipe
        | Interrupted | WouldBlock | UnexpectedEof => Some(ErrorClass::Retryable),
        _ => None,
    }
}
