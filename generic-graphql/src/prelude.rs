//! Common items that you will always want in scope when declaring generic types.

pub use crate::graphql::{
    async_graphql::{self, value},
    names::NameStyle,
    schema::{Schema, SchemaBuilder, SchemaConfig},
    type_system::{Catalog, FieldDescriptor, Scalar, TypeDescriptor, TypeExpr},
    value::{Data, Instance},
};
