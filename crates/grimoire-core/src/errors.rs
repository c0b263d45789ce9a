use thiserror::Error;

use crate::sanitize::SanitizeError;

/// Core error types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization error.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] grimoire_canonical::CanonicalizationError),
    /// The record broke a schema rule.
    #[error(transparent)]
    Validation(#[from] grimoire_canonical::ValidationError),
    /// Untrusted input rejected by the import policy.
    #[error("rejected input: {0}")]
    Rejected(#[from] SanitizeError),
    /// A structured blob is not an object or a field has the wrong shape.
    #[error("malformed structured field {field}: {reason}")]
    MalformedField {
        /// Field name.
        field: String,
        /// What was wrong.
        reason: String,
    },
    /// A merge choice names a field that is not in either record.
    #[error("merge choice names unknown field '{0}'")]
    UnknownMergeField(String),
    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
