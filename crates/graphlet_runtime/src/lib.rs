//! Execution runtime for graphlet.
//!
//! This crate provides the query execution engine:
//! - `schema`: immutable type registry and schema building
//! - `selection`: parsed operation and selection-tree model
//! - `analyzer`: pre-execution depth/complexity limits
//! - `plan`: selection-tree planning (sequential mutations, parallel siblings)
//! - `resolver`: field resolver trait and registry
//! - `loader`: per-request batch coordination (DataLoader pattern)
//! - `executor`: plan execution, nullability propagation, deadlines
//! - `response`: response and error wire types
//! - `persisted`: persisted-query lookup contract
//! - `config`: engine configuration
//! - `engine`: the facade wiring it all together

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod executor;
pub mod loader;
pub mod persisted;
pub mod plan;
pub mod resolver;
pub mod response;
pub mod schema;
pub mod selection;

pub use analyzer::{QueryAnalyzer, QueryMetrics, ValidationError};
pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder, OperationSource, Request};
pub use executor::{Context, Executor};
pub use loader::{BatchCoordinator, BatchError, BatchKey, BatchLoader, FnBatchLoader, LoadError};
pub use persisted::{InMemoryPersistedQueries, PersistedQueryStore};
pub use plan::{ExecutionPlan, FieldPlan, PlanError, PlanNode, Planner};
pub use resolver::{
    AsyncFnResolver, DefaultResolver, FnResolver, Resolver, ResolverArgs, ResolverError,
    ResolverInfo, ResolverMap, ResolverResult,
};
pub use response::{ErrorExtensions, GraphQLError, Response};
pub use schema::{
    ArgumentDef, EnumDef, FieldDef, InputObjectDef, InterfaceDef, ObjectDef, ScalarDef, Schema,
    SchemaBuilder, SchemaError, TypeDef, TypeRef, UnionDef,
};
pub use selection::{ArgumentValue, Operation, OperationKind, SelectionNode, Variables};

pub use graphlet_core::{ErrorCode, PathSegment, ResponsePath};
