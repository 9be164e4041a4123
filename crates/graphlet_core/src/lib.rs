//! Core primitives for graphlet.
//!
//! This crate provides foundational types shared across the runtime and CLI:
//! - `path`: response paths (field keys and list indices)
//! - `code`: machine-readable error codes carried in error extensions

pub mod code;
pub mod path;

pub use code::ErrorCode;
pub use path::{PathSegment, ResponsePath};
