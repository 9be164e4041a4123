//! Resolver system for graphlet.
//!
//! This module provides the resolver trait and infrastructure for field
//! resolution. Resolvers are registered against a resolver identity
//! (by default `"Type.field"`) at engine build time; dispatch is a static
//! map lookup, never reflection.

use crate::executor::Context;
use crate::loader::LoadError;
use crate::schema::TypeRef;
use graphlet_core::ResponsePath;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Arguments passed to a resolver, already coerced by the planner
/// (variables substituted, defaults applied).
#[derive(Debug, Clone, Default)]
pub struct ResolverArgs {
    args: FxHashMap<String, Value>,
}

impl ResolverArgs {
    /// Creates empty resolver args.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates resolver args from (name, value) pairs.
    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        Self {
            args: pairs.into_iter().collect(),
        }
    }

    /// Gets an argument by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Gets an argument as a specific type.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.args
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Gets a required argument, failing the resolver if it is absent.
    pub fn require<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, ResolverError> {
        self.args
            .get(name)
            .ok_or_else(|| ResolverError::MissingArgument(name.to_string()))
            .and_then(|v| {
                serde_json::from_value(v.clone())
                    .map_err(|e| ResolverError::ArgumentParse(name.to_string(), e.to_string()))
            })
    }

    /// Returns true if no arguments were supplied.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Sets an argument.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.args.insert(name.into(), value);
    }
}

/// Info about the field being resolved.
#[derive(Debug, Clone)]
pub struct ResolverInfo {
    /// The field name being resolved.
    pub field_name: String,
    /// The parent type name.
    pub parent_type: String,
    /// The declared result type.
    pub return_type: TypeRef,
    /// Path to this field in the response.
    pub path: ResponsePath,
}

impl ResolverInfo {
    /// Creates resolver info for a field.
    pub fn new(
        field_name: impl Into<String>,
        parent_type: impl Into<String>,
        return_type: TypeRef,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            parent_type: parent_type.into(),
            return_type,
            path: Vec::new(),
        }
    }

    /// Sets the response path.
    pub fn with_path(mut self, path: ResponsePath) -> Self {
        self.path = path;
        self
    }
}

/// Result type for resolvers.
pub type ResolverResult = Result<Value, ResolverError>;

/// Future type for async resolvers.
pub type ResolverFuture<'a> = Pin<Box<dyn Future<Output = ResolverResult> + Send + 'a>>;

/// Error from a resolver.
#[derive(Debug, Clone, Error)]
pub enum ResolverError {
    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("failed to parse argument '{0}': {1}")]
    ArgumentParse(String, String),

    #[error("batch load failed: {0}")]
    Batch(String),

    #[error("{0}")]
    Custom(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResolverError {
    /// Builds a custom error from any message.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

impl From<LoadError> for ResolverError {
    fn from(error: LoadError) -> Self {
        match error {
            LoadError::Batch(batch) => Self::Batch(batch.message),
            LoadError::MissingKey(_) | LoadError::UnknownLoader(_) => {
                Self::Internal(error.to_string())
            }
        }
    }
}

/// Trait for field resolvers.
pub trait Resolver: Send + Sync {
    /// Resolves a field value from its parent value and arguments.
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a>;
}

/// A boxed resolver.
pub type BoxedResolver = Box<dyn Resolver>;

/// A wrapper for sync resolver functions.
pub struct FnResolver<F> {
    func: F,
}

impl<F> FnResolver<F>
where
    F: Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> ResolverResult + Send + Sync,
{
    /// Creates a new function resolver.
    pub fn new(f: F) -> Self {
        Self { func: f }
    }
}

impl<F> Resolver for FnResolver<F>
where
    F: Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> ResolverResult + Send + Sync,
{
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        let result = (self.func)(parent, args, ctx, info);
        Box::pin(async move { result })
    }
}

/// An async resolver function type.
pub type AsyncResolverFn =
    Arc<dyn Fn(Value, ResolverArgs, Context, ResolverInfo) -> ResolverFuture<'static> + Send + Sync>;

/// A wrapper for async resolver functions.
pub struct AsyncFnResolver {
    func: AsyncResolverFn,
}

impl AsyncFnResolver {
    /// Creates a new async function resolver.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, ResolverArgs, Context, ResolverInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        Self {
            func: Arc::new(move |parent, args, ctx, info| Box::pin(f(parent, args, ctx, info))),
        }
    }
}

impl Resolver for AsyncFnResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        let parent = parent.clone();
        let args = args.clone();
        let ctx = ctx.clone();
        let info = info.clone();
        let func = Arc::clone(&self.func);
        Box::pin(async move { func(parent, args, ctx, info).await })
    }
}

/// Default resolver that reads the same-named property off the parent
/// object, falling back to the snake_case spelling.
pub struct DefaultResolver;

impl Resolver for DefaultResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        _args: &'a ResolverArgs,
        _ctx: &'a Context,
        info: &'a ResolverInfo,
    ) -> ResolverFuture<'a> {
        let field_name = &info.field_name;
        let result = match parent {
            Value::Object(map) => {
                if let Some(value) = map.get(field_name) {
                    Ok(value.clone())
                } else {
                    let snake_case = to_snake_case(field_name);
                    Ok(map.get(&snake_case).cloned().unwrap_or(Value::Null))
                }
            }
            Value::Null => Ok(Value::Null),
            _ => Err(ResolverError::FieldNotFound(field_name.clone())),
        };
        Box::pin(async move { result })
    }
}

/// Converts camelCase to snake_case.
fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_lowercase().next().unwrap());
        } else {
            result.push(c);
        }
    }
    result
}

/// Storage for resolvers, keyed by resolver identity.
#[derive(Default)]
pub struct ResolverMap {
    resolvers: FxHashMap<String, BoxedResolver>,
    /// Fallback for identities with no registration.
    default_resolver: Option<BoxedResolver>,
}

impl ResolverMap {
    /// Creates a resolver map with the property-access default installed.
    pub fn new() -> Self {
        Self {
            resolvers: FxHashMap::default(),
            default_resolver: Some(Box::new(DefaultResolver)),
        }
    }

    /// Registers a resolver for a type's field under the `"Type.field"`
    /// identity.
    pub fn register<R: Resolver + 'static>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: R,
    ) {
        let id = format!("{}.{}", type_name.into(), field_name.into());
        self.register_id(id, resolver);
    }

    /// Registers a resolver under an explicit identity.
    pub fn register_id<R: Resolver + 'static>(&mut self, id: impl Into<String>, resolver: R) {
        self.resolvers.insert(id.into(), Box::new(resolver));
    }

    /// Registers a sync function as a resolver.
    pub fn register_fn<F>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        f: F,
    ) where
        F: Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> ResolverResult
            + Send
            + Sync
            + 'static,
    {
        self.register(type_name, field_name, FnResolver::new(f));
    }

    /// Registers an async function as a resolver.
    pub fn register_async<F, Fut>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        f: F,
    ) where
        F: Fn(Value, ResolverArgs, Context, ResolverInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        self.register(type_name, field_name, AsyncFnResolver::new(f));
    }

    /// Gets the resolver bound to an identity, falling back to the default.
    pub fn get(&self, id: &str) -> Option<&dyn Resolver> {
        self.resolvers
            .get(id)
            .map(|r| r.as_ref())
            .or(self.default_resolver.as_deref())
    }

    /// Replaces the default resolver.
    pub fn set_default<R: Resolver + 'static>(&mut self, resolver: R) {
        self.default_resolver = Some(Box::new(resolver));
    }

    /// Removes the default resolver; unregistered fields become errors.
    pub fn remove_default(&mut self) {
        self.default_resolver = None;
    }
}

impl Debug for ResolverMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverMap")
            .field("resolver_count", &self.resolvers.len())
            .field("has_default", &self.default_resolver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_info(field: &str, parent: &str) -> ResolverInfo {
        ResolverInfo::new(field, parent, TypeRef::option(TypeRef::named("String")))
    }

    #[test]
    fn test_resolver_args() {
        let mut args = ResolverArgs::new();
        args.set("id", serde_json::json!(123));
        args.set("name", serde_json::json!("test"));

        assert_eq!(args.get_as::<i64>("id"), Some(123));
        assert_eq!(args.get_as::<String>("name"), Some("test".to_string()));
        assert_eq!(args.get_as::<i64>("missing"), None);
        assert!(args.require::<i64>("missing").is_err());
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("publishedYear"), "published_year");
        assert_eq!(to_snake_case("birthYear"), "birth_year");
        assert_eq!(to_snake_case("id"), "id");
    }

    #[tokio::test]
    async fn test_default_resolver_reads_properties() {
        let resolver = DefaultResolver;
        let parent = serde_json::json!({"name": "Harper Lee", "birth_year": 1926});
        let args = ResolverArgs::new();
        let ctx = Context::for_tests();

        let result = resolver
            .resolve(&parent, &args, &ctx, &test_info("name", "Author"))
            .await;
        assert_eq!(result.unwrap(), serde_json::json!("Harper Lee"));

        // camelCase falls back to the snake_case property.
        let result = resolver
            .resolve(&parent, &args, &ctx, &test_info("birthYear", "Author"))
            .await;
        assert_eq!(result.unwrap(), serde_json::json!(1926));
    }

    #[tokio::test]
    async fn test_fn_resolver() {
        let resolver = FnResolver::new(|_parent, args, _ctx, _info| {
            let id: i64 = args.require("id")?;
            Ok(serde_json::json!({"id": id}))
        });

        let parent = serde_json::json!({});
        let mut args = ResolverArgs::new();
        args.set("id", serde_json::json!(42));
        let ctx = Context::for_tests();

        let result = resolver
            .resolve(&parent, &args, &ctx, &test_info("book", "Query"))
            .await;
        assert_eq!(result.unwrap(), serde_json::json!({"id": 42}));
    }

    #[tokio::test]
    async fn test_async_resolver() {
        let resolver = AsyncFnResolver::new(|_parent, _args, _ctx, info| async move {
            Ok(Value::String(info.field_name))
        });

        let parent = serde_json::json!({});
        let args = ResolverArgs::new();
        let ctx = Context::for_tests();

        let result = resolver
            .resolve(&parent, &args, &ctx, &test_info("echo", "Query"))
            .await;
        assert_eq!(result.unwrap(), serde_json::json!("echo"));
    }

    #[tokio::test]
    async fn test_resolver_map_fallback() {
        let mut map = ResolverMap::new();
        map.register_fn("Query", "hello", |_parent, _args, _ctx, _info| {
            Ok(serde_json::json!("Hello, World!"))
        });

        assert!(map.get("Query.hello").is_some());
        // Unregistered identities fall back to the default resolver.
        assert!(map.get("Author.name").is_some());

        map.remove_default();
        assert!(map.get("Author.name").is_none());
    }
}
