//! Machine-readable error codes.
//!
//! Every error surfaced in a response carries one of these codes under
//! `extensions.code`, so clients can branch on failure class without
//! parsing messages.

use serde::{Deserialize, Serialize};

/// Failure class for a response error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request was rejected before execution started (depth/complexity
    /// limits, unknown fields or types, persisted-query policy).
    Validation,
    /// The request deadline expired before the field resolved.
    Timeout,
    /// A batched downstream call failed as a whole.
    BatchFailure,
    /// An engine fault: the response is still well-formed, but the engine
    /// observed a contract violation at runtime.
    Internal,
    /// A field resolver reported a failure.
    ResolverError,
}

impl ErrorCode {
    /// The wire representation, as serialized into `extensions.code`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Timeout => "TIMEOUT",
            Self::BatchFailure => "BATCH_FAILURE",
            Self::Internal => "INTERNAL",
            Self::ResolverError => "RESOLVER_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
