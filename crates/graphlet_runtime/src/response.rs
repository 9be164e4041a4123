//! Response types for graphlet.
//!
//! The wire shape is `{ data, errors }`. `data` is omitted entirely when
//! execution never started (validation or planning rejection); a started
//! request always carries `data`, possibly `null`, alongside any collected
//! errors. Partial success — populated `data` next to a non-empty `errors`
//! list — is the expected steady state for partially failing queries.

use graphlet_core::{ErrorCode, PathSegment, ResponsePath};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An error entry in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// The error message.
    pub message: String,
    /// Path from the response root to the failed field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: ResponsePath,
    /// Machine-readable extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ErrorExtensions>,
}

/// The `extensions` object attached to an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorExtensions {
    pub code: ErrorCode,
}

impl GraphQLError {
    /// Creates an error with a message and no path.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            extensions: None,
        }
    }

    /// Attaches the response path.
    pub fn with_path(mut self, path: ResponsePath) -> Self {
        self.path = path;
        self
    }

    /// Attaches an error code extension.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.extensions = Some(ErrorExtensions { code });
        self
    }

    /// The attached code, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        self.extensions.as_ref().map(|ext| ext.code)
    }
}

impl std::fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// A complete response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The response data. `None` means execution never started and the key
    /// is omitted from the serialized form; `Some(Value::Null)` means the
    /// whole tree was nulled by propagation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Collected errors in the order they were recorded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl Response {
    /// Creates a response carrying data and any collected errors.
    pub fn of(data: Value, errors: Vec<GraphQLError>) -> Self {
        Self {
            data: Some(data),
            errors,
        }
    }

    /// Creates a rejection response: no `data` key, one error.
    pub fn request_error(error: GraphQLError) -> Self {
        Self {
            data: None,
            errors: vec![error],
        }
    }

    /// True if any error was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Error at a given index, for assertions and diagnostics.
    pub fn error(&self, index: usize) -> Option<&GraphQLError> {
        self.errors.get(index)
    }
}

/// Convenience constructor for a path, used widely in tests.
pub fn path(segments: &[&str]) -> ResponsePath {
    segments.iter().map(|s| PathSegment::from(*s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_omits_data_key() {
        let response = Response::request_error(
            GraphQLError::new("query depth 12 exceeds the maximum of 10")
                .with_code(ErrorCode::Validation),
        );

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["errors"][0]["extensions"]["code"], "VALIDATION");
    }

    #[test]
    fn test_nulled_data_serializes_as_null() {
        let response = Response::of(
            Value::Null,
            vec![GraphQLError::new("boom")
                .with_path(path(&["a"]))
                .with_code(ErrorCode::ResolverError)],
        );

        let json = serde_json::to_value(&response).unwrap();
        assert!(json["data"].is_null());
        assert_eq!(json["errors"][0]["path"][0], "a");
    }

    #[test]
    fn test_empty_errors_omitted() {
        let response = Response::of(serde_json::json!({"ok": true}), Vec::new());
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("errors").is_none());
        assert_eq!(json["data"]["ok"], true);
    }
}
