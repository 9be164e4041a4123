//! Selection trees for graphlet.
//!
//! An [`Operation`] is the parsed form of one client request: the operation
//! kind plus an ordered tree of [`SelectionNode`]s. Parsing query text (and
//! expanding fragments and type conditions) is the job of an external
//! parser; this engine consumes the resulting tree. The types serialize
//! with serde so operations can be stored and shipped as JSON.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Variable bindings supplied alongside an operation.
pub type Variables = FxHashMap<String, Value>;

/// The kind of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// Human-readable name, used in error messages and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

/// A parsed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub selections: Vec<SelectionNode>,
}

impl Operation {
    /// Creates an operation of the given kind with no selections.
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            name: None,
            selections: Vec::new(),
        }
    }

    /// Creates a query operation.
    pub fn query() -> Self {
        Self::new(OperationKind::Query)
    }

    /// Creates a mutation operation.
    pub fn mutation() -> Self {
        Self::new(OperationKind::Mutation)
    }

    /// Sets the operation name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends a root selection.
    pub fn selection(mut self, node: SelectionNode) -> Self {
        self.selections.push(node);
        self
    }
}

/// One node in a selection tree.
///
/// Order of `selections` is significant: it dictates response key order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionNode {
    /// The field name on the parent type.
    pub name: String,
    /// Response key override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Argument values in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<(String, ArgumentValue)>,
    /// Child selections; empty for scalar/enum results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selections: Vec<SelectionNode>,
}

impl SelectionNode {
    /// Creates a leaf selection of the named field.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: Vec::new(),
            selections: Vec::new(),
        }
    }

    /// Sets the response key alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds a literal argument.
    pub fn argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments
            .push((name.into(), ArgumentValue::Literal(value)));
        self
    }

    /// Adds an argument bound to a variable.
    pub fn variable_argument(mut self, name: impl Into<String>, variable: impl Into<String>) -> Self {
        self.arguments.push((
            name.into(),
            ArgumentValue::Variable {
                name: variable.into(),
            },
        ));
        self
    }

    /// Appends a child selection.
    pub fn selection(mut self, node: SelectionNode) -> Self {
        self.selections.push(node);
        self
    }

    /// The key this field occupies in the response object.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An argument value: either a literal or a `$variable` reference.
///
/// The JSON form of a variable reference is `{"$var": "name"}`; anything
/// else deserializes as a literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Variable {
        #[serde(rename = "$var")]
        name: String,
    },
    Literal(Value),
}
