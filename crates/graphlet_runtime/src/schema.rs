//! Schema registry for graphlet.
//!
//! The schema is built once at startup, validated, and then shared read-only
//! for the lifetime of the process. Types live in a name-keyed arena; all
//! cross-type references are names resolved through that arena, so cyclic
//! type graphs need no ownership edges.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::selection::OperationKind;

/// Error raised while building a schema. These abort engine construction;
/// no request is served against a schema that failed validation.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    #[error("type '{0}' is declared more than once")]
    DuplicateType(String),

    #[error("field '{type_name}.{field_name}' references unknown type '{referenced}'")]
    UnknownTypeRef {
        type_name: String,
        field_name: String,
        referenced: String,
    },

    #[error("union '{union_name}' references unknown member type '{member}'")]
    UnknownUnionMember { union_name: String, member: String },

    #[error("field '{type_name}.{field_name}' has input object result type '{referenced}'")]
    InputObjectResult {
        type_name: String,
        field_name: String,
        referenced: String,
    },

    #[error("schema does not declare a query root type")]
    MissingQueryType,

    #[error("root type '{0}' is not a registered object type")]
    InvalidRootType(String),

    #[error("engine requires a schema")]
    MissingSchema,
}

/// Reference to a type, carrying nullability.
///
/// `Named` and `List` positions are non-null; wrapping in `Option` marks a
/// nullable position. `Option(List(Option(Named)))` is a nullable list of
/// nullable elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRef {
    Named(String),
    Option(Box<TypeRef>),
    List(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn option(inner: TypeRef) -> Self {
        Self::Option(Box::new(inner))
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    /// True if this position may hold null.
    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Option(_))
    }

    /// Strips one layer of nullability, if present.
    pub fn non_null(&self) -> &TypeRef {
        match self {
            Self::Option(inner) => inner,
            other => other,
        }
    }

    /// The element type, if this is a (possibly nullable) list.
    pub fn as_list(&self) -> Option<&TypeRef> {
        match self.non_null() {
            Self::List(inner) => Some(inner),
            _ => None,
        }
    }

    /// True if a list appears anywhere in the wrapper chain.
    pub fn is_list_like(&self) -> bool {
        match self {
            Self::Named(_) => false,
            Self::Option(inner) => inner.is_list_like(),
            Self::List(_) => true,
        }
    }

    /// The innermost named type.
    pub fn named_type(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Option(inner) | Self::List(inner) => inner.named_type(),
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{}!", name),
            Self::Option(inner) => match inner.as_ref() {
                Self::Named(name) => write!(f, "{}", name),
                Self::List(element) => write!(f, "[{}]", element),
                nested => write!(f, "{}", nested),
            },
            Self::List(inner) => write!(f, "[{}]!", inner),
        }
    }
}

/// A type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
    Interface(InterfaceDef),
    Union(UnionDef),
    Enum(EnumDef),
    InputObject(InputObjectDef),
}

impl TypeDef {
    /// The declared name of this type.
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(def) => &def.name,
            Self::Object(def) => &def.name,
            Self::Interface(def) => &def.name,
            Self::Union(def) => &def.name,
            Self::Enum(def) => &def.name,
            Self::InputObject(def) => &def.name,
        }
    }

    /// True for scalar and enum types: selections terminate here.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_))
    }

    /// The field map, for types that carry fields.
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match self {
            Self::Object(def) => Some(&def.fields),
            Self::Interface(def) => Some(&def.fields),
            _ => None,
        }
    }
}

/// Scalar type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarDef {
    pub name: String,
    pub description: Option<String>,
}

/// Object type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

impl ObjectDef {
    /// Creates an empty object type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    /// Adds a field, keyed by its name.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Sets the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Declares an implemented interface.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }
}

/// Interface type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
}

/// Union type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionDef {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<String>,
}

/// Enum type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<String>,
}

/// Input object type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, ArgumentDef>,
}

/// A field on an object or interface type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, ArgumentDef>,
    /// Resolver identity override. When absent the field is bound to
    /// `"Type.field"`.
    pub resolver: Option<String>,
}

impl FieldDef {
    /// Creates a field with the given result type.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            arguments: IndexMap::new(),
            resolver: None,
        }
    }

    /// Adds an argument definition.
    pub fn argument(mut self, arg: ArgumentDef) -> Self {
        self.arguments.insert(arg.name.clone(), arg);
        self
    }

    /// Sets the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Binds the field to a named resolver identity.
    pub fn resolver(mut self, id: impl Into<String>) -> Self {
        self.resolver = Some(id.into());
        self
    }
}

/// An argument on a field (or a field of an input object).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentDef {
    pub name: String,
    pub ty: TypeRef,
    pub default_value: Option<Value>,
}

impl ArgumentDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default_value: None,
        }
    }

    /// Sets the default applied when the argument is omitted.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// An immutable, validated schema.
///
/// Built once through [`SchemaBuilder`]; concurrent reads from many requests
/// are safe without locking because no writer exists after `build()`.
#[derive(Debug, Clone)]
pub struct Schema {
    query_type: String,
    mutation_type: Option<String>,
    types: IndexMap<String, TypeDef>,
}

impl Schema {
    /// Gets a type by name.
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Iterates all registered types in declaration order.
    pub fn types(&self) -> impl Iterator<Item = (&String, &TypeDef)> {
        self.types.iter()
    }

    /// The root type name for an operation kind, if the schema declares one.
    pub fn root_type(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => Some(&self.query_type),
            OperationKind::Mutation => self.mutation_type.as_deref(),
            OperationKind::Subscription => None,
        }
    }

    /// Looks up a field on an object or interface type.
    pub fn lookup_field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.types
            .get(type_name)
            .and_then(TypeDef::fields)
            .and_then(|fields| fields.get(field_name))
    }

    /// The resolver identity bound to a field.
    pub fn resolver_id(&self, type_name: &str, field: &FieldDef) -> String {
        field
            .resolver
            .clone()
            .unwrap_or_else(|| format!("{}.{}", type_name, field.name))
    }
}

/// Builder for [`Schema`]. Registration happens during startup only;
/// `build()` validates and freezes the registry.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    query_type: Option<String>,
    mutation_type: Option<String>,
    types: IndexMap<String, TypeDef>,
    duplicate: Option<String>,
}

impl SchemaBuilder {
    /// Creates a builder with the built-in scalars pre-registered.
    pub fn new() -> Self {
        let mut builder = Self::default();
        for name in ["Int", "Float", "String", "Boolean", "ID"] {
            builder.types.insert(
                name.to_string(),
                TypeDef::Scalar(ScalarDef {
                    name: name.to_string(),
                    description: Some(format!("Built-in {name} scalar")),
                }),
            );
        }
        builder
    }

    /// Sets the query root type name.
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.query_type = Some(name.into());
        self
    }

    /// Sets the mutation root type name.
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.mutation_type = Some(name.into());
        self
    }

    /// Registers a type. Duplicate names are reported by `build()`.
    pub fn add_type(mut self, type_def: TypeDef) -> Self {
        let name = type_def.name().to_string();
        if self.types.insert(name.clone(), type_def).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(name);
        }
        self
    }

    /// Registers an object type.
    pub fn object(self, def: ObjectDef) -> Self {
        self.add_type(TypeDef::Object(def))
    }

    /// Validates the registered types and freezes the schema.
    pub fn build(self) -> Result<Schema, SchemaError> {
        if let Some(name) = self.duplicate {
            return Err(SchemaError::DuplicateType(name));
        }

        let query_type = self.query_type.ok_or(SchemaError::MissingQueryType)?;
        for root in std::iter::once(&query_type).chain(self.mutation_type.iter()) {
            match self.types.get(root) {
                Some(TypeDef::Object(_)) => {}
                _ => return Err(SchemaError::InvalidRootType(root.clone())),
            }
        }

        // Every name a field, argument, or union member references must be
        // registered, and field result types must be output types.
        for (type_name, type_def) in &self.types {
            if let Some(fields) = type_def.fields() {
                for field in fields.values() {
                    let referenced = field.ty.named_type();
                    match self.types.get(referenced) {
                        None => {
                            return Err(SchemaError::UnknownTypeRef {
                                type_name: type_name.clone(),
                                field_name: field.name.clone(),
                                referenced: referenced.to_string(),
                            })
                        }
                        Some(TypeDef::InputObject(_)) => {
                            return Err(SchemaError::InputObjectResult {
                                type_name: type_name.clone(),
                                field_name: field.name.clone(),
                                referenced: referenced.to_string(),
                            })
                        }
                        Some(_) => {}
                    }
                    for arg in field.arguments.values() {
                        let referenced = arg.ty.named_type();
                        if !self.types.contains_key(referenced) {
                            return Err(SchemaError::UnknownTypeRef {
                                type_name: type_name.clone(),
                                field_name: field.name.clone(),
                                referenced: referenced.to_string(),
                            });
                        }
                    }
                }
            }
            if let TypeDef::Union(def) = type_def {
                for member in &def.members {
                    if !self.types.contains_key(member) {
                        return Err(SchemaError::UnknownUnionMember {
                            union_name: def.name.clone(),
                            member: member.clone(),
                        });
                    }
                }
            }
        }

        Ok(Schema {
            query_type,
            mutation_type: self.mutation_type,
            types: self.types,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_type() -> ObjectDef {
        ObjectDef::new("User")
            .field(FieldDef::new("id", TypeRef::named("ID")))
            .field(FieldDef::new(
                "name",
                TypeRef::option(TypeRef::named("String")),
            ))
    }

    #[test]
    fn test_builder_validates_roots() {
        let err = SchemaBuilder::new().build().unwrap_err();
        assert!(matches!(err, SchemaError::MissingQueryType));

        let err = SchemaBuilder::new()
            .query_type("Query")
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRootType(name) if name == "Query"));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let err = SchemaBuilder::new()
            .query_type("Query")
            .object(ObjectDef::new("Query").field(FieldDef::new("ok", TypeRef::named("Boolean"))))
            .object(user_type())
            .object(ObjectDef::new("User"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateType(name) if name == "User"));
    }

    #[test]
    fn test_dangling_type_ref_rejected() {
        let err = SchemaBuilder::new()
            .query_type("Query")
            .object(ObjectDef::new("Query").field(FieldDef::new("user", TypeRef::named("User"))))
            .build()
            .unwrap_err();
        assert!(
            matches!(err, SchemaError::UnknownTypeRef { ref referenced, .. } if referenced == "User")
        );
    }

    #[test]
    fn test_lookup_field_and_resolver_id() {
        let schema = SchemaBuilder::new()
            .query_type("Query")
            .object(ObjectDef::new("Query").field(FieldDef::new("user", TypeRef::named("User"))))
            .object(user_type())
            .build()
            .unwrap();

        let field = schema.lookup_field("Query", "user").unwrap();
        assert_eq!(schema.resolver_id("Query", field), "Query.user");
        assert!(schema.lookup_field("Query", "missing").is_none());
        assert!(schema.lookup_field("User", "name").is_some());

        let field = FieldDef::new("user", TypeRef::named("User")).resolver("fetch_user");
        assert_eq!(schema.resolver_id("Query", &field), "fetch_user");
    }

    #[test]
    fn test_type_ref_helpers() {
        let ty = TypeRef::option(TypeRef::list(TypeRef::option(TypeRef::named("Post"))));
        assert!(ty.is_nullable());
        assert!(ty.is_list_like());
        assert_eq!(ty.named_type(), "Post");
        let element = ty.as_list().unwrap();
        assert!(element.is_nullable());
        assert_eq!(ty.to_string(), "[Post]");

        let ty = TypeRef::named("String");
        assert!(!ty.is_nullable());
        assert!(ty.as_list().is_none());
        assert_eq!(ty.to_string(), "String!");
    }
}
