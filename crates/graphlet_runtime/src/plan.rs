//! Query planning for graphlet.
//!
//! The planner walks a selection tree together with the schema and produces
//! an execution plan: mutation root fields form a strict [`PlanNode::Sequence`]
//! (write ordering is a contract, never parallelized), while query root
//! fields and all other sibling sets form [`PlanNode::Parallel`] nodes.
//! Argument values are coerced here — variables substituted and declared
//! defaults applied — so the executor only ever sees concrete values.

use serde_json::Value;
use thiserror::Error;

use crate::schema::{Schema, TypeRef};
use crate::selection::{ArgumentValue, Operation, OperationKind, SelectionNode, Variables};

/// A planning error. Unresolved selection references are rejected here,
/// before any resolver runs.
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    #[error("unknown field '{field}' on type '{type_name}'")]
    UnknownField { type_name: String, field: String },

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("schema does not define a {0} root type")]
    UndefinedRoot(&'static str),

    #[error("subscriptions are not supported by this runtime")]
    SubscriptionUnsupported,

    #[error("field '{field}' does not accept argument '{argument}'")]
    UnknownArgument { field: String, argument: String },

    #[error("argument '{argument}' of field '{field}' references undefined variable '${variable}'")]
    UndefinedVariable {
        field: String,
        argument: String,
        variable: String,
    },

    #[error("missing required argument '{argument}' on field '{field}'")]
    MissingArgument { field: String, argument: String },

    #[error("field '{field}' of composite type '{type_name}' requires a selection set")]
    MissingSelectionSet { type_name: String, field: String },

    #[error("field '{field}' of leaf type '{type_name}' cannot have a selection set")]
    UnexpectedSelectionSet { type_name: String, field: String },
}

/// An executable plan for one operation.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// The operation kind the plan was built from.
    pub operation: OperationKind,
    /// The root node: `Sequence` for mutations, `Parallel` otherwise.
    pub root: PlanNode,
}

/// A node in the execution plan.
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// Children execute strictly in order.
    Sequence(Vec<PlanNode>),
    /// Children execute concurrently; output order still follows node order.
    Parallel(Vec<PlanNode>),
    /// An object-typed field with nested selections.
    Field {
        field: FieldPlan,
        children: Box<PlanNode>,
    },
    /// A scalar/enum field; resolution terminates here.
    Leaf { field: FieldPlan },
}

/// Everything the executor needs to resolve one field.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    /// Key this field occupies in the response object.
    pub response_key: String,
    /// Field name on the parent type.
    pub name: String,
    /// The parent type name.
    pub parent_type: String,
    /// Declared result type, carrying nullability.
    pub ty: TypeRef,
    /// Resolver identity bound at schema build time.
    pub resolver: String,
    /// Concrete argument values.
    pub arguments: Vec<(String, Value)>,
}

/// The query planner.
#[derive(Debug)]
pub struct Planner<'a> {
    schema: &'a Schema,
}

impl<'a> Planner<'a> {
    /// Creates a planner over a schema.
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Plans an operation, substituting the given variables.
    pub fn plan(
        &self,
        operation: &Operation,
        variables: &Variables,
    ) -> Result<ExecutionPlan, PlanError> {
        if operation.kind == OperationKind::Subscription {
            return Err(PlanError::SubscriptionUnsupported);
        }

        let root_type = self
            .schema
            .root_type(operation.kind)
            .ok_or(PlanError::UndefinedRoot(operation.kind.as_str()))?;

        let nodes = self.plan_selections(root_type, &operation.selections, variables)?;
        let root = match operation.kind {
            OperationKind::Mutation => PlanNode::Sequence(nodes),
            _ => PlanNode::Parallel(nodes),
        };

        Ok(ExecutionPlan {
            operation: operation.kind,
            root,
        })
    }

    fn plan_selections(
        &self,
        type_name: &str,
        selections: &[SelectionNode],
        variables: &Variables,
    ) -> Result<Vec<PlanNode>, PlanError> {
        let mut nodes = Vec::with_capacity(selections.len());

        for selection in selections {
            if selection.name == "__typename" {
                nodes.push(PlanNode::Leaf {
                    field: FieldPlan {
                        response_key: selection.response_key().to_string(),
                        name: "__typename".to_string(),
                        parent_type: type_name.to_string(),
                        ty: TypeRef::named("String"),
                        resolver: String::new(),
                        arguments: Vec::new(),
                    },
                });
                continue;
            }

            let field = self.schema.lookup_field(type_name, &selection.name).ok_or_else(|| {
                PlanError::UnknownField {
                    type_name: type_name.to_string(),
                    field: selection.name.clone(),
                }
            })?;

            let arguments = self.coerce_arguments(selection, field, variables)?;
            let field_plan = FieldPlan {
                response_key: selection.response_key().to_string(),
                name: selection.name.clone(),
                parent_type: type_name.to_string(),
                ty: field.ty.clone(),
                resolver: self.schema.resolver_id(type_name, field),
                arguments,
            };

            let result_type_name = field.ty.named_type();
            let result_type = self
                .schema
                .get_type(result_type_name)
                .ok_or_else(|| PlanError::UnknownType(result_type_name.to_string()))?;

            if result_type.is_leaf() {
                if !selection.selections.is_empty() {
                    return Err(PlanError::UnexpectedSelectionSet {
                        type_name: result_type_name.to_string(),
                        field: selection.name.clone(),
                    });
                }
                nodes.push(PlanNode::Leaf { field: field_plan });
            } else {
                if selection.selections.is_empty() {
                    return Err(PlanError::MissingSelectionSet {
                        type_name: result_type_name.to_string(),
                        field: selection.name.clone(),
                    });
                }
                let children =
                    self.plan_selections(result_type_name, &selection.selections, variables)?;
                nodes.push(PlanNode::Field {
                    field: field_plan,
                    children: Box::new(PlanNode::Parallel(children)),
                });
            }
        }

        Ok(nodes)
    }

    /// Resolves supplied arguments against the field's declared argument
    /// list: variables substituted, defaults applied, required arguments
    /// enforced.
    fn coerce_arguments(
        &self,
        selection: &SelectionNode,
        field: &crate::schema::FieldDef,
        variables: &Variables,
    ) -> Result<Vec<(String, Value)>, PlanError> {
        for (name, _) in &selection.arguments {
            if !field.arguments.contains_key(name) {
                return Err(PlanError::UnknownArgument {
                    field: selection.name.clone(),
                    argument: name.clone(),
                });
            }
        }

        let mut coerced = Vec::with_capacity(field.arguments.len());
        for (name, def) in &field.arguments {
            let supplied = selection
                .arguments
                .iter()
                .find(|(supplied_name, _)| supplied_name == name);

            let value = match supplied {
                Some((_, ArgumentValue::Literal(value))) => Some(value.clone()),
                Some((_, ArgumentValue::Variable { name: variable })) => {
                    Some(variables.get(variable).cloned().ok_or_else(|| {
                        PlanError::UndefinedVariable {
                            field: selection.name.clone(),
                            argument: name.clone(),
                            variable: variable.clone(),
                        }
                    })?)
                }
                None => def.default_value.clone(),
            };

            match value {
                Some(value) => coerced.push((name.clone(), value)),
                None if !def.ty.is_nullable() => {
                    return Err(PlanError::MissingArgument {
                        field: selection.name.clone(),
                        argument: name.clone(),
                    })
                }
                None => {}
            }
        }

        Ok(coerced)
    }
}
