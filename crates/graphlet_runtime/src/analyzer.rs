//! Pre-execution query analysis.
//!
//! The analyzer measures a selection tree against the schema before any
//! resolver runs: selection depth and a complexity estimate. Queries that
//! exceed the configured limits are rejected outright, so rejection is
//! all-or-nothing. The walk is a pure computation over the tree.

use thiserror::Error;

use crate::config::EngineConfig;
use crate::schema::Schema;
use crate::selection::{Operation, SelectionNode};

/// Rejection raised before execution starts. Responses for these carry no
/// `data` key at all.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("query depth {depth} exceeds the maximum of {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("query complexity {complexity} exceeds the maximum of {max}")]
    ComplexityExceeded { complexity: usize, max: usize },

    #[error("unknown field '{field}' on type '{type_name}'")]
    UnknownField { type_name: String, field: String },

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("schema does not define a {0} root type")]
    UndefinedRoot(&'static str),

    #[error("field '{field}' of composite type '{type_name}' requires a selection set")]
    MissingSelectionSet { type_name: String, field: String },

    #[error("field '{field}' of leaf type '{type_name}' cannot have a selection set")]
    UnexpectedSelectionSet { type_name: String, field: String },

    #[error("persisted query '{0}' was not found")]
    PersistedQueryNotFound(String),

    #[error("this engine only accepts persisted queries")]
    PersistedQueriesRequired,
}

/// Depth and complexity of an analyzed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryMetrics {
    /// Maximum nesting of selection sets.
    pub depth: usize,
    /// Recursive cost sum over the full tree.
    pub complexity: usize,
}

/// Measures operations against a schema and the configured limits.
#[derive(Debug)]
pub struct QueryAnalyzer<'a> {
    schema: &'a Schema,
    config: &'a EngineConfig,
}

impl<'a> QueryAnalyzer<'a> {
    /// Creates an analyzer over a schema and configuration.
    pub fn new(schema: &'a Schema, config: &'a EngineConfig) -> Self {
        Self { schema, config }
    }

    /// Measures the operation and enforces the configured limits.
    ///
    /// No resolver is invoked; on rejection execution never starts.
    pub fn analyze(&self, operation: &Operation) -> Result<QueryMetrics, ValidationError> {
        let root_type = self
            .schema
            .root_type(operation.kind)
            .ok_or(ValidationError::UndefinedRoot(operation.kind.as_str()))?;

        let (depth, complexity) = self.measure(root_type, &operation.selections)?;
        let metrics = QueryMetrics { depth, complexity };
        tracing::debug!(
            depth = metrics.depth,
            complexity = metrics.complexity,
            "analyzed operation"
        );

        if metrics.depth > self.config.max_depth {
            return Err(ValidationError::DepthExceeded {
                depth: metrics.depth,
                max: self.config.max_depth,
            });
        }
        if metrics.complexity > self.config.max_complexity {
            return Err(ValidationError::ComplexityExceeded {
                complexity: metrics.complexity,
                max: self.config.max_complexity,
            });
        }
        Ok(metrics)
    }

    /// Returns (max nesting, cost) of one selection set.
    fn measure(
        &self,
        type_name: &str,
        selections: &[SelectionNode],
    ) -> Result<(usize, usize), ValidationError> {
        let mut max_depth = 0;
        let mut cost = 0;

        for selection in selections {
            if selection.name == "__typename" {
                max_depth = max_depth.max(1);
                cost += 1;
                continue;
            }

            let field = self.schema.lookup_field(type_name, &selection.name).ok_or_else(|| {
                ValidationError::UnknownField {
                    type_name: type_name.to_string(),
                    field: selection.name.clone(),
                }
            })?;

            let result_type_name = field.ty.named_type();
            let result_type = self
                .schema
                .get_type(result_type_name)
                .ok_or_else(|| ValidationError::UnknownType(result_type_name.to_string()))?;

            let field_cost = self.config.field_cost(type_name, &selection.name);

            if result_type.is_leaf() {
                if !selection.selections.is_empty() {
                    return Err(ValidationError::UnexpectedSelectionSet {
                        type_name: result_type_name.to_string(),
                        field: selection.name.clone(),
                    });
                }
                max_depth = max_depth.max(1);
                cost += field_cost;
                continue;
            }

            if selection.selections.is_empty() {
                return Err(ValidationError::MissingSelectionSet {
                    type_name: result_type_name.to_string(),
                    field: selection.name.clone(),
                });
            }

            let (child_depth, child_cost) =
                self.measure(result_type_name, &selection.selections)?;

            // A list field multiplies its subtree by the estimated list size.
            let subtree_cost = if field.ty.is_list_like() {
                child_cost * self.config.list_cost_multiplier
            } else {
                child_cost
            };

            max_depth = max_depth.max(1 + child_depth);
            cost += field_cost + subtree_cost;
        }

        Ok((max_depth, cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, ObjectDef, SchemaBuilder, TypeRef};
    use crate::selection::SelectionNode;

    fn library_schema() -> Schema {
        SchemaBuilder::new()
            .query_type("Query")
            .object(
                ObjectDef::new("Query")
                    .field(FieldDef::new(
                        "books",
                        TypeRef::list(TypeRef::named("Book")),
                    ))
                    .field(FieldDef::new(
                        "book",
                        TypeRef::option(TypeRef::named("Book")),
                    )),
            )
            .object(
                ObjectDef::new("Book")
                    .field(FieldDef::new("title", TypeRef::named("String")))
                    .field(FieldDef::new(
                        "author",
                        TypeRef::option(TypeRef::named("Author")),
                    )),
            )
            .object(
                ObjectDef::new("Author")
                    .field(FieldDef::new("name", TypeRef::named("String")))
                    .field(FieldDef::new(
                        "books",
                        TypeRef::list(TypeRef::named("Book")),
                    )),
            )
            .build()
            .unwrap()
    }

    fn books_with_authors() -> Operation {
        Operation::query().selection(
            SelectionNode::field("books")
                .selection(SelectionNode::field("title"))
                .selection(
                    SelectionNode::field("author").selection(SelectionNode::field("name")),
                ),
        )
    }

    #[test]
    fn test_depth_measurement() {
        let schema = library_schema();
        let config = EngineConfig::default();
        let analyzer = QueryAnalyzer::new(&schema, &config);

        let metrics = analyzer.analyze(&books_with_authors()).unwrap();
        // books -> author -> name nests three selection sets.
        assert_eq!(metrics.depth, 3);
    }

    #[test]
    fn test_complexity_multiplies_list_subtrees() {
        let schema = library_schema();
        let config = EngineConfig::default().with_list_cost_multiplier(10);
        let analyzer = QueryAnalyzer::new(&schema, &config);

        let metrics = analyzer.analyze(&books_with_authors()).unwrap();
        // author subtree costs 1 (name) + 1 (author) = 2; books subtree is
        // title (1) + 2 = 3, multiplied by the list estimate, + 1 for books.
        assert_eq!(metrics.complexity, 31);
    }

    #[test]
    fn test_depth_limit_rejects() {
        let schema = library_schema();
        let config = EngineConfig::default().with_max_depth(2);
        let analyzer = QueryAnalyzer::new(&schema, &config);

        let err = analyzer.analyze(&books_with_authors()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::DepthExceeded { depth: 3, max: 2 }
        ));
    }

    #[test]
    fn test_complexity_limit_rejects() {
        let schema = library_schema();
        let config = EngineConfig::default().with_max_complexity(10);
        let analyzer = QueryAnalyzer::new(&schema, &config);

        let err = analyzer.analyze(&books_with_authors()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ComplexityExceeded { complexity: 31, max: 10 }
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let schema = library_schema();
        let config = EngineConfig::default();
        let analyzer = QueryAnalyzer::new(&schema, &config);

        let op = Operation::query().selection(SelectionNode::field("movies"));
        let err = analyzer.analyze(&op).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnknownField { ref field, .. } if field == "movies"
        ));
    }

    #[test]
    fn test_leaf_with_selection_set_rejected() {
        let schema = library_schema();
        let config = EngineConfig::default();
        let analyzer = QueryAnalyzer::new(&schema, &config);

        let op = Operation::query().selection(
            SelectionNode::field("books").selection(
                SelectionNode::field("title").selection(SelectionNode::field("oops")),
            ),
        );
        assert!(matches!(
            analyzer.analyze(&op).unwrap_err(),
            ValidationError::UnexpectedSelectionSet { .. }
        ));
    }

    #[test]
    fn test_typename_costs_one() {
        let schema = library_schema();
        let config = EngineConfig::default();
        let analyzer = QueryAnalyzer::new(&schema, &config);

        let op = Operation::query().selection(SelectionNode::field("__typename"));
        let metrics = analyzer.analyze(&op).unwrap();
        assert_eq!(metrics, QueryMetrics { depth: 1, complexity: 1 });
    }
}
