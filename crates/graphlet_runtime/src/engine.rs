//! The graphlet engine facade.
//!
//! An [`Engine`] owns the validated schema, resolver bindings, batch
//! loaders, configuration, and an optional persisted-query store — all
//! built once at startup and immutable afterwards. Each call to
//! [`Engine::execute`] runs the full request pipeline: persisted-query
//! resolution, analysis, planning, and plan execution against a fresh
//! per-request [`Context`].

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;

use crate::analyzer::{QueryAnalyzer, ValidationError};
use crate::config::EngineConfig;
use crate::executor::{Context, Executor};
use crate::loader::{BatchCoordinator, BatchLoader};
use crate::persisted::PersistedQueryStore;
use crate::plan::Planner;
use crate::resolver::ResolverMap;
use crate::response::{GraphQLError, Response};
use crate::schema::{Schema, SchemaError};
use crate::selection::{Operation, Variables};
use graphlet_core::ErrorCode;

/// One incoming request: an operation (inline or persisted) plus variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(flatten)]
    pub source: OperationSource,
    #[serde(default, skip_serializing_if = "Variables::is_empty")]
    pub variables: Variables,
}

impl Request {
    /// Builds a request for an inline operation.
    pub fn operation(operation: Operation) -> Self {
        Self {
            source: OperationSource::Operation(operation),
            variables: Variables::default(),
        }
    }

    /// Builds a request referencing a persisted operation.
    pub fn persisted(hash: impl Into<String>) -> Self {
        Self {
            source: OperationSource::Persisted(hash.into()),
            variables: Variables::default(),
        }
    }

    /// Binds a variable.
    pub fn variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

/// How the request identifies its operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationSource {
    /// The parsed operation travels with the request.
    Operation(Operation),
    /// The operation is referenced by its persisted identifier.
    Persisted(String),
}

/// The assembled engine.
pub struct Engine {
    schema: Arc<Schema>,
    config: EngineConfig,
    loaders: Arc<FxHashMap<String, Arc<dyn BatchLoader>>>,
    persisted: Option<Arc<dyn PersistedQueryStore>>,
    executor: Executor,
}

impl Engine {
    /// Starts building an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The engine's schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Measures a request without executing it.
    pub async fn check(&self, request: &Request) -> Result<crate::analyzer::QueryMetrics, ValidationError> {
        let operation = self.resolve_operation(request).await?;
        QueryAnalyzer::new(&self.schema, &self.config).analyze(&operation)
    }

    /// Executes a request to completion.
    ///
    /// Never panics and never returns early on field failures: rejected
    /// requests yield an errors-only response, started requests always
    /// carry `data`.
    pub async fn execute(&self, request: Request) -> Response {
        self.execute_with_data(request, FxHashMap::default()).await
    }

    /// Executes a request with request-scoped data pre-seeded into the
    /// context (auth principal, locale, ...).
    pub async fn execute_with_data(
        &self,
        request: Request,
        data: FxHashMap<String, Value>,
    ) -> Response {
        let started = Instant::now();

        let operation = match self.resolve_operation(&request).await {
            Ok(operation) => operation,
            Err(error) => return reject(&error),
        };

        let analyzer = QueryAnalyzer::new(&self.schema, &self.config);
        let metrics = match analyzer.analyze(&operation) {
            Ok(metrics) => metrics,
            Err(error) => {
                tracing::info!(error = %error, "request rejected by analyzer");
                return reject(&error);
            }
        };

        let plan = match Planner::new(&self.schema).plan(&operation, &request.variables) {
            Ok(plan) => plan,
            Err(error) => {
                tracing::info!(error = %error, "request rejected by planner");
                return Response::request_error(
                    GraphQLError::new(error.to_string()).with_code(ErrorCode::Validation),
                );
            }
        };

        let coordinator = Arc::new(BatchCoordinator::new(Arc::clone(&self.loaders)));
        let deadline = Instant::now() + self.config.request_timeout();
        let mut ctx = Context::new(request.variables, deadline, coordinator);
        for (key, value) in data {
            ctx.set(key, value);
        }

        let response = self.executor.execute(&plan, &ctx).await;
        tracing::debug!(
            operation = operation.kind.as_str(),
            depth = metrics.depth,
            complexity = metrics.complexity,
            errors = response.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request served"
        );
        response
    }

    /// Resolves the request's operation, honoring the persisted-query
    /// policy. Consulted before analysis.
    async fn resolve_operation(&self, request: &Request) -> Result<Operation, ValidationError> {
        match &request.source {
            OperationSource::Operation(operation) => {
                if self.config.enforce_persisted_queries_only {
                    return Err(ValidationError::PersistedQueriesRequired);
                }
                Ok(operation.clone())
            }
            OperationSource::Persisted(hash) => {
                let store = self
                    .persisted
                    .as_ref()
                    .ok_or_else(|| ValidationError::PersistedQueryNotFound(hash.clone()))?;
                store
                    .lookup(hash)
                    .await
                    .ok_or_else(|| ValidationError::PersistedQueryNotFound(hash.clone()))
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("loaders", &self.loaders.len())
            .field("persisted", &self.persisted.is_some())
            .finish()
    }
}

/// Builds a rejection response: no `data` key, code `VALIDATION`.
fn reject(error: &ValidationError) -> Response {
    Response::request_error(
        GraphQLError::new(error.to_string()).with_code(ErrorCode::Validation),
    )
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    schema: Option<Schema>,
    resolvers: ResolverMap,
    loaders: FxHashMap<String, Arc<dyn BatchLoader>>,
    persisted: Option<Arc<dyn PersistedQueryStore>>,
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Creates an empty builder with the default resolver map installed.
    pub fn new() -> Self {
        Self {
            schema: None,
            resolvers: ResolverMap::new(),
            loaders: FxHashMap::default(),
            persisted: None,
            config: EngineConfig::default(),
        }
    }

    /// Sets the schema. Required.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Replaces the resolver map.
    pub fn resolvers(mut self, resolvers: ResolverMap) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Registers a batch loader under an identity.
    pub fn loader(mut self, id: impl Into<String>, loader: impl BatchLoader + 'static) -> Self {
        self.loaders.insert(id.into(), Arc::new(loader));
        self
    }

    /// Installs a persisted-query store.
    pub fn persisted_store(mut self, store: impl PersistedQueryStore + 'static) -> Self {
        self.persisted = Some(Arc::new(store));
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Assembles the engine. Fails if no schema was supplied.
    pub fn build(self) -> Result<Engine, SchemaError> {
        let schema = self.schema.ok_or(SchemaError::MissingSchema)?;
        Ok(Engine {
            schema: Arc::new(schema),
            config: self.config,
            loaders: Arc::new(self.loaders),
            persisted: self.persisted,
            executor: Executor::new(Arc::new(self.resolvers)),
        })
    }
}
