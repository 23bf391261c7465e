//! Error types for the jenkins-proto crate.

use thiserror::Error;

/// Errors produced while decoding server responses or parsing user input.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// A response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Decoding(String),

    /// A `JOB[/ID]` selector could not be parsed.
    #[error("invalid selector '{input}': {reason}")]
    InvalidSelector {
        /// The selector as typed.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A `key=value,...` parameter list could not be parsed.
    #[error("invalid build parameters '{input}': {reason}")]
    InvalidParams {
        /// The parameter list as typed.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An expected XML element is absent.
    #[error("<{0}> element not found")]
    MissingElement(&'static str),

    /// A value violated a domain invariant.
    #[error("validation error: {0}")]
    Validation(String),
}
