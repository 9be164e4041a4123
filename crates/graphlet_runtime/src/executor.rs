//! Plan execution for graphlet.
//!
//! The executor resolves a plan wave by wave: sibling fields run as
//! concurrent futures joined in selection order, mutation root fields run
//! strictly in sequence, and list results fan out one concurrent child
//! execution per element. Field failures never escape the executor — they
//! are recorded with their response path and folded into the result tree
//! by the nullability rule:
//!
//! - a nullable field that fails becomes `null`, siblings unaffected;
//! - a non-null field that fails (or resolves to null) propagates upward,
//!   nulling enclosing results until a nullable position absorbs it, or the
//!   whole `data` tree becomes `null` at the root. The error is recorded
//!   once, at the origin.

use futures::future::join_all;
use graphlet_core::path::display_path;
use graphlet_core::{ErrorCode, PathSegment, ResponsePath};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::time::{timeout_at, Instant};

use crate::loader::{BatchCoordinator, BatchKey, LoadError};
use crate::plan::{ExecutionPlan, FieldPlan, PlanNode};
use crate::resolver::{ResolverArgs, ResolverError, ResolverInfo, ResolverMap};
use crate::response::{GraphQLError, Response};
use crate::selection::Variables;

/// Per-request execution context.
///
/// Created at request start and dropped after assembly; never shared across
/// requests. Resolvers receive a shared reference and reach the batch
/// coordinator, variables, the deadline, and request-scoped data through it.
#[derive(Debug, Clone)]
pub struct Context {
    data: FxHashMap<String, Value>,
    variables: Variables,
    deadline: Instant,
    coordinator: Arc<BatchCoordinator>,
}

impl Context {
    /// Creates a context for one request.
    pub fn new(variables: Variables, deadline: Instant, coordinator: Arc<BatchCoordinator>) -> Self {
        Self {
            data: FxHashMap::default(),
            variables,
            deadline,
            coordinator,
        }
    }

    /// The request deadline.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Gets a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// All variable bindings.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Loads a value through the named batch loader, joining the current
    /// wave's batch.
    pub async fn load(&self, loader_id: &str, key: impl Into<BatchKey>) -> Result<Value, LoadError> {
        self.coordinator.load(loader_id, key).await
    }

    /// Seeds the batch cache for a key, bypassing the loader.
    pub fn prime(&self, loader_id: &str, key: impl Into<BatchKey>, value: Value) {
        self.coordinator.prime(loader_id, key, value);
    }

    /// Stores request-scoped data (auth principal, locale, ...). Seeded
    /// before execution starts; resolvers read it with [`Context::get`].
    pub fn set<T: serde::Serialize>(&mut self, key: impl Into<String>, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.data.insert(key.into(), v);
        }
    }

    /// Reads request-scoped data.
    pub fn get<T: for<'de> serde::Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(
            Variables::default(),
            Instant::now() + std::time::Duration::from_secs(5),
            Arc::new(BatchCoordinator::new(Arc::new(FxHashMap::default()))),
        )
    }
}

/// The plan executor.
pub struct Executor {
    resolvers: Arc<ResolverMap>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("resolvers", &self.resolvers)
            .finish()
    }
}

impl Executor {
    /// Creates an executor over a resolver map.
    pub fn new(resolvers: Arc<ResolverMap>) -> Self {
        Self { resolvers }
    }

    /// Executes a plan to completion and assembles the response.
    ///
    /// Always returns a well-formed response carrying `data`; field-level
    /// failures surface in `errors`, never as panics or early returns.
    pub async fn execute(&self, plan: &ExecutionPlan, ctx: &Context) -> Response {
        let state = ExecState {
            resolvers: &self.resolvers,
            ctx,
            errors: Mutex::new(Vec::new()),
        };

        let root_value = Value::Object(Map::new());
        let data = match execute_node(&plan.root, &root_value, Vec::new(), &state).await {
            Completed::Value(value) => value,
            Completed::Propagated => Value::Null,
        };

        let errors = state
            .errors
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tracing::debug!(
            operation = plan.operation.as_str(),
            errors = errors.len(),
            "execution finished"
        );
        Response::of(data, errors)
    }
}

/// Shared state for one plan execution.
struct ExecState<'a> {
    resolvers: &'a ResolverMap,
    ctx: &'a Context,
    errors: Mutex<Vec<GraphQLError>>,
}

impl ExecState<'_> {
    fn record(&self, error: GraphQLError) {
        self.errors.lock().unwrap().push(error);
    }
}

/// Outcome of completing one field or node.
enum Completed {
    /// A concrete value, possibly `Null`.
    Value(Value),
    /// A non-null failure still looking for a nullable ancestor.
    Propagated,
}

/// Folds a failure into the value tree: nullable positions absorb it as
/// `null`, non-null positions propagate it to the parent.
fn failure(nullable: bool) -> Completed {
    if nullable {
        Completed::Value(Value::Null)
    } else {
        Completed::Propagated
    }
}

fn single(key: String, value: Value) -> Completed {
    let mut object = Map::new();
    object.insert(key, value);
    Completed::Value(Value::Object(object))
}

fn code_for(error: &ResolverError) -> ErrorCode {
    match error {
        ResolverError::Batch(_) => ErrorCode::BatchFailure,
        ResolverError::Internal(_) => ErrorCode::Internal,
        _ => ErrorCode::ResolverError,
    }
}

/// Executes a plan node against a parent value.
fn execute_node<'a>(
    node: &'a PlanNode,
    parent: &'a Value,
    path: ResponsePath,
    state: &'a ExecState<'a>,
) -> Pin<Box<dyn Future<Output = Completed> + Send + 'a>> {
    Box::pin(async move {
        match node {
            // Mutation roots: strict order, each field fully resolved before
            // the next starts. A propagated failure poisons the chain.
            PlanNode::Sequence(nodes) => {
                let mut result = Map::new();
                for child in nodes {
                    match execute_node(child, parent, path.clone(), state).await {
                        Completed::Value(Value::Object(object)) => result.extend(object),
                        Completed::Value(_) => {}
                        Completed::Propagated => return Completed::Propagated,
                    }
                }
                Completed::Value(Value::Object(result))
            }
            // Sibling fields: concurrent execution, output merged in node
            // order so completion timing never reorders response keys.
            PlanNode::Parallel(nodes) => {
                let results = join_all(
                    nodes
                        .iter()
                        .map(|child| execute_node(child, parent, path.clone(), state)),
                )
                .await;
                let mut result = Map::new();
                for completed in results {
                    match completed {
                        Completed::Value(Value::Object(object)) => result.extend(object),
                        Completed::Value(_) => {}
                        Completed::Propagated => return Completed::Propagated,
                    }
                }
                Completed::Value(Value::Object(result))
            }
            PlanNode::Field { field, children } => {
                execute_field(field, Some(children.as_ref()), parent, path, state).await
            }
            PlanNode::Leaf { field } => execute_field(field, None, parent, path, state).await,
        }
    })
}

/// Resolves one field and completes its value.
fn execute_field<'a>(
    field: &'a FieldPlan,
    children: Option<&'a PlanNode>,
    parent: &'a Value,
    mut path: ResponsePath,
    state: &'a ExecState<'a>,
) -> Pin<Box<dyn Future<Output = Completed> + Send + 'a>> {
    Box::pin(async move {
        path.push(PathSegment::Field(field.response_key.clone()));

        // The engine answers __typename without a resolver.
        if field.name == "__typename" {
            return single(
                field.response_key.clone(),
                Value::String(field.parent_type.clone()),
            );
        }

        let Some(resolver) = state.resolvers.get(&field.resolver) else {
            state.record(
                GraphQLError::new(format!("no resolver bound for '{}'", field.resolver))
                    .with_path(path)
                    .with_code(ErrorCode::Internal),
            );
            return wrap(field, failure(field.ty.is_nullable()));
        };

        let args = ResolverArgs::from_pairs(field.arguments.clone());
        let info = ResolverInfo::new(field.name.as_str(), field.parent_type.as_str(), field.ty.clone())
            .with_path(path.clone());

        let resolved = timeout_at(
            state.ctx.deadline(),
            resolver.resolve(parent, &args, state.ctx, &info),
        )
        .await;

        let outcome = match resolved {
            // Deadline expired before the resolver finished. Work already
            // dispatched downstream drains in its own task; the result is
            // discarded here.
            Err(_elapsed) => {
                state.record(
                    GraphQLError::new(format!(
                        "request deadline exceeded while resolving '{}'",
                        display_path(&path)
                    ))
                    .with_path(path.clone())
                    .with_code(ErrorCode::Timeout),
                );
                failure(field.ty.is_nullable())
            }
            Ok(Err(error)) => {
                tracing::debug!(
                    field = %display_path(&path),
                    error = %error,
                    "resolver failed"
                );
                state.record(
                    GraphQLError::new(error.to_string())
                        .with_path(path.clone())
                        .with_code(code_for(&error)),
                );
                failure(field.ty.is_nullable())
            }
            Ok(Ok(value)) => complete_value(&field.ty, value, children, path, state).await,
        };

        wrap(field, outcome)
    })
}

/// Wraps a completed field value under its response key.
fn wrap(field: &FieldPlan, outcome: Completed) -> Completed {
    match outcome {
        Completed::Value(value) => single(field.response_key.clone(), value),
        Completed::Propagated => Completed::Propagated,
    }
}

/// Completes a resolved value against its declared type: null checks, list
/// fan-out, and child-selection execution.
fn complete_value<'a>(
    ty: &'a crate::schema::TypeRef,
    value: Value,
    children: Option<&'a PlanNode>,
    path: ResponsePath,
    state: &'a ExecState<'a>,
) -> Pin<Box<dyn Future<Output = Completed> + Send + 'a>> {
    use crate::schema::TypeRef;

    Box::pin(async move {
        let nullable = ty.is_nullable();

        if value.is_null() {
            if nullable {
                return Completed::Value(Value::Null);
            }
            state.record(
                GraphQLError::new(format!(
                    "non-null field '{}' resolved to null",
                    display_path(&path)
                ))
                .with_path(path)
                .with_code(ErrorCode::Internal),
            );
            return Completed::Propagated;
        }

        match ty.non_null() {
            TypeRef::List(element) => {
                let Value::Array(items) = value else {
                    state.record(
                        GraphQLError::new(format!(
                            "field '{}' expected a list value",
                            display_path(&path)
                        ))
                        .with_path(path)
                        .with_code(ErrorCode::Internal),
                    );
                    return failure(nullable);
                };

                // One concurrent child execution per element, output in
                // element order.
                let futures: Vec<_> = items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let mut item_path = path.clone();
                        item_path.push(PathSegment::Index(index));
                        complete_value(element.as_ref(), item, children, item_path, state)
                    })
                    .collect();

                let mut completed_items = Vec::with_capacity(futures.len());
                let mut propagated = false;
                for completed in join_all(futures).await {
                    match completed {
                        Completed::Value(item) => completed_items.push(item),
                        Completed::Propagated => propagated = true,
                    }
                }
                if propagated {
                    return failure(nullable);
                }
                Completed::Value(Value::Array(completed_items))
            }
            _ => match children {
                // Scalar/enum results are terminal; emitted as resolved.
                None => Completed::Value(value),
                Some(children_node) => {
                    match execute_node(children_node, &value, path, state).await {
                        Completed::Value(object) => Completed::Value(object),
                        Completed::Propagated => failure(nullable),
                    }
                }
            },
        }
    })
}
