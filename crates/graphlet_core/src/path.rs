//! Response paths for graphlet.
//!
//! A path identifies a position in the response tree as a sequence of
//! response keys and list indices, e.g. `["user", "posts", 0, "author"]`.

use serde::{Deserialize, Serialize};

/// A single step in a response path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A response key (field name or alias).
    Field(String),
    /// An index into a list value.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Field(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Field(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(key) => write!(f, "{}", key),
            Self::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A full path from the response root to a field.
pub type ResponsePath = Vec<PathSegment>;

/// Renders a path as a dotted string for log output.
pub fn display_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segment_serde() {
        let path: ResponsePath = vec![
            PathSegment::from("user"),
            PathSegment::from("posts"),
            PathSegment::from(0usize),
            PathSegment::from("author"),
        ];

        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"["user","posts",0,"author"]"#);

        let parsed: ResponsePath = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, path);
    }

    #[test]
    fn test_display_path() {
        let path = vec![
            PathSegment::from("books"),
            PathSegment::from(2usize),
            PathSegment::from("title"),
        ];
        assert_eq!(display_path(&path), "books.2.title");
    }
}
