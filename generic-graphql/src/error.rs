//! Errors encountered while declaring types, building a schema, or serializing results.
//!
//! Errors fall into two groups. Declaration and schema-construction errors (everything except
//! [`NoMatchingUnionMember`](Error::NoMatchingUnionMember),
//! [`AmbiguousUnionValue`](Error::AmbiguousUnionValue) and [`TypeMismatch`](Error::TypeMismatch))
//! are fatal: they are returned from [`Catalog::declare`](crate::graphql::type_system::Catalog::declare)
//! or [`SchemaBuilder::finish`](crate::graphql::schema::SchemaBuilder::finish) before any query can
//! run. The remaining errors occur while serializing the result of a single field, and are reported
//! by the execution engine as a field error without affecting other fields or queries.

use crate::graphql::type_system::{Placeholder, TypeExpr};
use itertools::Itertools;
use snafu::Snafu;

/// Errors reported by this crate.
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("type {name} is declared more than once"))]
    DuplicateDeclaration { name: String },

    #[snafu(display("type parameter {param} is declared more than once on {ty}"))]
    DuplicateTypeParameter { ty: String, param: Placeholder },

    #[snafu(display("field {field} is declared more than once on {ty}"))]
    DuplicateField { ty: String, field: String },

    #[snafu(display("fields {first} and {second} of {ty} are both exposed as {name}"))]
    ConflictingFieldNames {
        ty: String,
        name: String,
        first: String,
        second: String,
    },

    #[snafu(display("type parameter {param} of {ty} is not used by any field"))]
    UnusedTypeParameter { ty: String, param: Placeholder },

    #[snafu(display("type parameter {param} is not bound in {context}"))]
    UnboundTypeParameter { context: String, param: Placeholder },

    #[snafu(display("interface {name} cannot have type parameters"))]
    GenericInterface { name: String },

    #[snafu(display("{ty} cannot extend {base}: {reason}"))]
    InvalidBase {
        ty: String,
        base: String,
        reason: String,
    },

    #[snafu(display("unknown type {name}"))]
    UnknownType { name: String },

    #[snafu(display("{generic} expects {expected} type arguments, but {found} were given"))]
    ArityMismatch {
        generic: String,
        expected: usize,
        found: usize,
    },

    #[snafu(display("{name} is not generic, but was given type arguments"))]
    NotGeneric { name: String },

    #[snafu(display("{name} is generic and must be given type arguments"))]
    MissingTypeArguments { name: String },

    #[snafu(display("{member} cannot be a member of a union, only object types can"))]
    InvalidUnionMember { member: TypeExpr },

    #[snafu(display(
        "union {union} has more than one member resolving to {name} ({})",
        members.iter().join(", ")
    ))]
    AmbiguousUnionMember {
        union: String,
        name: String,
        members: Vec<TypeExpr>,
    },

    #[snafu(display("type name {name} is synthesized by both {existing} and {conflicting}"))]
    NameCollision {
        name: String,
        existing: String,
        conflicting: String,
    },

    #[snafu(display("{name} is not an interface"))]
    NotAnInterface { name: String },

    #[snafu(display("{name} is an interface and cannot be instantiated as an object"))]
    NotAnObject { name: String },

    #[snafu(display("{name} was requested while it is still being constructed"))]
    RecursiveInstantiation { name: String },

    #[snafu(display("more than {limit} concrete types were synthesized (instantiating {key})"))]
    TooManyInstantiations { limit: usize, key: String },

    #[snafu(display(
        "unable to find a type for {origin} with arguments ({}) among [{}]",
        arguments.iter().map(|arg| arg.as_ref().map_or("?".to_string(), |arg| arg.to_string())).join(", "),
        candidates.iter().join(", ")
    ))]
    NoMatchingUnionMember {
        origin: String,
        arguments: Vec<Option<TypeExpr>>,
        candidates: Vec<String>,
    },

    #[snafu(display(
        "value of type {origin} matches more than one of [{}]",
        candidates.iter().join(", ")
    ))]
    AmbiguousUnionValue {
        origin: String,
        candidates: Vec<String>,
    },

    #[snafu(display("type mismatch: expected {expected}, got {found}"))]
    TypeMismatch { expected: String, found: String },

    #[snafu(display("error building schema: {error}"))]
    Schema { error: String },
}

/// The result of fallible operations in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
