//! Executable GraphQL schemas built from a [`Catalog`] of generic declarations.
//!
//! Building a schema happens in two phases. First, starting from the query root (and any extra
//! types registered with [`SchemaBuilder::register_type`]) every reachable type is resolved through
//! a build-scoped [`TypeRegistry`], which instantiates generic types on demand and produces a flat
//! [`SchemaDefinition`]. Second, the definition is translated into an `async_graphql` dynamic
//! schema, with one object type per concrete type and one resolver per field.
//!
//! Resolvers serve [`Instance`] values. The root [`Instance`] is supplied with each request, and
//! every object nested inside it is served by reference. When an object is returned through a union
//! or an interface, it is [classified](super::classify) to tell the engine which concrete type it
//! belongs to.
//!
//! # Example
//!
//! ```
//! # use generic_graphql::prelude::*;
//! # async_std::task::block_on(async {
//! let mut catalog = Catalog::default();
//! catalog.declare(
//!     TypeDescriptor::object("Edge")
//!         .param("T")
//!         .field("cursor", TypeExpr::ID)
//!         .field("node", TypeExpr::param("T")),
//! )?;
//! catalog.declare(
//!     TypeDescriptor::object("Query").field("int_edge", TypeExpr::apply("Edge", [TypeExpr::INT])),
//! )?;
//! let schema = SchemaBuilder::new(catalog).finish()?;
//!
//! let root = Instance::new("Query").with(
//!     "int_edge",
//!     Instance::new("Edge").with("cursor", Data::id("1")).with("node", 1),
//! );
//! let response = schema
//!     .execute("{ intEdge { __typename cursor node } }", root)
//!     .await;
//! assert_eq!(
//!     response.data,
//!     value!({ "intEdge": { "__typename": "IntEdge", "cursor": "1", "node": 1 } })
//! );
//! # Ok::<_, generic_graphql::Error>(())
//! # }).unwrap();
//! ```

use super::{
    classify::Classifier,
    names::NameStyle,
    registry::{InterfaceType, SchemaDefinition, TypeRegistry, DEFAULT_MAX_INSTANTIATIONS},
    resolver::{Binding, Resolver},
    type_system::{Catalog, FieldDescriptor, Scalar, TypeExpr},
    value::{Data, Instance},
};
use crate::error::{
    ConflictingFieldNamesSnafu, Result, SchemaSnafu, TypeMismatchSnafu, UnknownTypeSnafu,
};
use async_graphql::{
    dynamic::{
        self, Field, FieldFuture, FieldValue, Interface, InterfaceField, Object, ResolverContext,
        TypeRef, Union,
    },
    Number, Request, Response, Value,
};
use convert_case::{Case, Casing};
use derivative::Derivative;
use snafu::OptionExt;
use std::collections::HashMap;
use std::sync::Arc;

/// Options for building a [`Schema`].
#[derive(Clone, Debug)]
pub struct SchemaConfig {
    /// The name of the query root type.
    pub query: String,
    /// How scalar arguments are named in synthesized type names.
    pub naming: NameStyle,
    /// Convert field names to camelCase in the GraphQL schema.
    pub auto_camel_case: bool,
    /// The maximum depth of a query.
    pub max_depth: Option<usize>,
    /// The maximum complexity of a query.
    pub max_complexity: Option<usize>,
    /// Whether introspection queries are allowed.
    pub introspection: bool,
    /// The maximum number of concrete object types the schema may contain.
    pub max_instantiations: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            query: "Query".into(),
            naming: NameStyle::default(),
            auto_camel_case: true,
            max_depth: None,
            max_complexity: None,
            introspection: true,
            max_instantiations: DEFAULT_MAX_INSTANTIATIONS,
        }
    }
}

impl SchemaConfig {
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn naming(mut self, naming: NameStyle) -> Self {
        self.naming = naming;
        self
    }

    pub fn auto_camel_case(mut self, enabled: bool) -> Self {
        self.auto_camel_case = enabled;
        self
    }

    pub fn limit_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn limit_complexity(mut self, complexity: usize) -> Self {
        self.max_complexity = Some(complexity);
        self
    }

    pub fn disable_introspection(mut self) -> Self {
        self.introspection = false;
        self
    }

    pub fn max_instantiations(mut self, limit: usize) -> Self {
        self.max_instantiations = limit;
        self
    }

    fn field_name(&self, name: &str) -> String {
        if self.auto_camel_case {
            name.to_case(Case::Camel)
        } else {
            name.to_string()
        }
    }

    /// Fail if two fields of `ty` have the same name once converted with [`Self::field_name`].
    fn check_field_names(&self, ty: &str, fields: &[FieldDescriptor]) -> Result<()> {
        let mut names = HashMap::new();
        for field in fields {
            let name = self.field_name(field.name());
            if let Some(first) = names.insert(name.clone(), field.name()) {
                return ConflictingFieldNamesSnafu {
                    ty,
                    name,
                    first,
                    second: field.name(),
                }
                .fail();
            }
        }
        Ok(())
    }
}

/// Builds a [`Schema`] from a [`Catalog`].
#[derive(Debug)]
pub struct SchemaBuilder {
    catalog: Catalog,
    config: SchemaConfig,
    types: Vec<TypeExpr>,
}

impl SchemaBuilder {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            config: Default::default(),
            types: vec![],
        }
    }

    pub fn config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    /// Include `ty` in the schema even if it is not reachable from the query root.
    ///
    /// `ty` may be any type expression without placeholders, such as `Edge[int]`.
    pub fn register_type(mut self, ty: TypeExpr) -> Self {
        self.types.push(ty);
        self
    }

    /// Resolve every type in the schema, without building an executable schema.
    pub fn definition(self) -> Result<SchemaDefinition> {
        let registry = TypeRegistry::new(Arc::new(self.catalog))
            .with_naming(self.config.naming)
            .with_max_instantiations(self.config.max_instantiations);
        let resolver = Resolver::new(&registry);
        for ty in &self.types {
            resolver.resolve(ty, &Binding::default())?;
        }
        registry.finish(&self.config.query)
    }

    /// Build an executable schema.
    pub fn finish(self) -> Result<Schema> {
        let config = self.config.clone();
        let definition = Arc::new(self.definition()?);

        for interface in definition.interfaces() {
            config.check_field_names(interface.name(), interface.fields())?;
        }
        for object in definition.objects() {
            config.check_field_names(object.name(), object.fields())?;
        }

        let mut builder = dynamic::Schema::build(definition.query(), None, None);
        for interface in definition.interfaces() {
            builder = builder.register(build_interface(interface, &config));
        }
        for union in definition.unions() {
            builder = builder.register(
                union
                    .members()
                    .iter()
                    .fold(Union::new(union.name()), |ty, member| ty.possible_type(member)),
            );
        }
        for object in definition.objects() {
            let mut ty = Object::new(object.name());
            if let Some(doc) = object.doc() {
                ty = ty.description(doc);
            }
            for interface in object.interfaces() {
                ty = ty.implement(interface);
            }
            for field in object.fields() {
                ty = ty.field(build_field(&definition, field, &config));
            }
            builder = builder.register(ty);
        }

        if let Some(depth) = config.max_depth {
            builder = builder.limit_depth(depth);
        }
        if let Some(complexity) = config.max_complexity {
            builder = builder.limit_complexity(complexity);
        }
        if !config.introspection {
            builder = builder.disable_introspection();
        }

        let inner = builder.finish().map_err(|err| {
            SchemaSnafu {
                error: err.to_string(),
            }
            .build()
        })?;
        tracing::info!(
            "built schema with {} object types rooted at {}",
            definition.objects().len(),
            definition.query()
        );
        Ok(Schema { inner, definition })
    }
}

/// An executable GraphQL schema.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Schema {
    #[derivative(Debug = "ignore")]
    inner: dynamic::Schema,
    definition: Arc<SchemaDefinition>,
}

impl Schema {
    pub fn build(catalog: Catalog) -> SchemaBuilder {
        SchemaBuilder::new(catalog)
    }

    /// Execute `request` against the query root `root`.
    pub async fn execute(&self, request: impl Into<Request>, root: Instance) -> Response {
        self.inner
            .execute(request.into().data(RootValue(root)))
            .await
    }

    /// Execute `request`, blocking the current thread until it completes.
    pub fn execute_sync(&self, request: impl Into<Request>, root: Instance) -> Response {
        futures::executor::block_on(self.execute(request, root))
    }

    /// The schema in GraphQL SDL.
    pub fn sdl(&self) -> String {
        self.inner.sdl()
    }

    pub fn definition(&self) -> &SchemaDefinition {
        &self.definition
    }
}

/// The query root value of a request.
struct RootValue(Instance);

fn build_interface(interface: &InterfaceType, config: &SchemaConfig) -> Interface {
    let mut ty = Interface::new(interface.name());
    if let Some(doc) = interface.doc() {
        ty = ty.description(doc);
    }
    for field in interface.fields() {
        let mut gql = InterfaceField::new(
            config.field_name(field.name()),
            type_ref(field.declared_type()),
        );
        if let Some(doc) = field.doc() {
            gql = gql.description(doc);
        }
        ty = ty.field(gql);
    }
    ty
}

fn build_field(
    definition: &Arc<SchemaDefinition>,
    field: &FieldDescriptor,
    config: &SchemaConfig,
) -> Field {
    let definition = definition.clone();
    let name = field.name().to_string();
    let ty = field.declared_type().clone();
    let mut gql = Field::new(
        config.field_name(field.name()),
        type_ref(field.declared_type()),
        move |ctx| {
            let res = resolve_field(&definition, &name, &ty, &ctx);
            FieldFuture::new(async move { res })
        },
    );
    if let Some(doc) = field.doc() {
        gql = gql.description(doc);
    }
    gql
}

fn resolve_field<'a>(
    definition: &SchemaDefinition,
    field: &str,
    ty: &TypeExpr,
    ctx: &ResolverContext<'a>,
) -> async_graphql::Result<Option<FieldValue<'a>>> {
    let parent_value: &'a FieldValue<'a> = ctx.parent_value;
    let parent = match parent_value.try_downcast_ref::<Instance>() {
        Ok(instance) => instance,
        Err(_) => &ctx.ctx.data::<RootValue>()?.0,
    };
    let value = Serializer::new(definition).serialize(ty, parent.get(field))?;
    Ok(Some(value))
}

/// The GraphQL type of a field of resolved type `ty`.
fn type_ref(ty: &TypeExpr) -> TypeRef {
    match ty {
        TypeExpr::Optional(inner) => nullable_type_ref(inner),
        ty => TypeRef::NonNull(Box::new(nullable_type_ref(ty))),
    }
}

fn nullable_type_ref(ty: &TypeExpr) -> TypeRef {
    match ty {
        TypeExpr::Scalar(scalar) => TypeRef::named(scalar.to_string()),
        TypeExpr::Object(name)
        | TypeExpr::Union {
            name: Some(name), ..
        } => TypeRef::named(name),
        TypeExpr::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
        TypeExpr::Optional(inner) => nullable_type_ref(inner),
        // Resolution eliminates these.
        TypeExpr::Param(_) | TypeExpr::Apply { .. } | TypeExpr::Union { name: None, .. } => {
            TypeRef::named(ty.to_string())
        }
    }
}

/// Converts runtime [`Data`] into values for the execution engine.
struct Serializer<'d> {
    definition: &'d SchemaDefinition,
}

impl<'d> Serializer<'d> {
    fn new(definition: &'d SchemaDefinition) -> Self {
        Self { definition }
    }

    fn serialize<'a>(&self, ty: &TypeExpr, data: &'a Data) -> Result<FieldValue<'a>> {
        match (ty, data) {
            (TypeExpr::Optional(_), Data::Null) => Ok(FieldValue::NULL),
            (TypeExpr::Optional(inner), data) => self.serialize(inner, data),
            (TypeExpr::List(inner), Data::List(items)) => Ok(FieldValue::list(
                items
                    .iter()
                    .map(|item| self.serialize(inner, item))
                    .collect::<Result<Vec<_>>>()?,
            )),
            (TypeExpr::Scalar(scalar), data) => Ok(FieldValue::value(scalar_value(*scalar, data)?)),
            (TypeExpr::Object(name), Data::Object(instance)) => {
                let value = FieldValue::borrowed_any(instance);
                if self.definition.interface(name).is_some() {
                    let implementors = self.definition.implementors(name);
                    let concrete = Classifier::new(self.definition).classify(instance, &implementors)?;
                    Ok(value.with_type(concrete.to_string()))
                } else {
                    Ok(value)
                }
            }
            (
                TypeExpr::Union {
                    name: Some(name), ..
                },
                Data::Object(instance),
            ) => {
                let union = self
                    .definition
                    .union(name)
                    .context(UnknownTypeSnafu { name })?;
                let concrete =
                    Classifier::new(self.definition).classify(instance, union.members())?;
                Ok(FieldValue::borrowed_any(instance).with_type(concrete.to_string()))
            }
            (ty, data) => TypeMismatchSnafu {
                expected: ty.to_string(),
                found: data.describe(),
            }
            .fail(),
        }
    }
}

fn scalar_value(scalar: Scalar, data: &Data) -> Result<Value> {
    let value = match (scalar, data) {
        (Scalar::Int, Data::Int(i)) => Some(Value::from(*i)),
        (Scalar::Float, Data::Float(f)) => Number::from_f64(*f).map(Value::Number),
        (Scalar::Float, Data::Int(i)) => Number::from_f64(*i as f64).map(Value::Number),
        (Scalar::String, Data::String(s)) => Some(Value::from(s.clone())),
        (Scalar::Boolean, Data::Boolean(b)) => Some(Value::from(*b)),
        (Scalar::Id, Data::Id(id) | Data::String(id)) => Some(Value::from(id.clone())),
        (Scalar::Id, Data::Int(i)) => Some(Value::from(i.to_string())),
        _ => None,
    };
    value.context(TypeMismatchSnafu {
        expected: scalar.to_string(),
        found: data.describe(),
    })
}
