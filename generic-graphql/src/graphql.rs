//! Declaring generic GraphQL types and serving them through an executable schema.

pub mod classify;
pub mod names;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod type_system;
pub mod value;

// Re-export commonly used `async_graphql` types.
pub use async_graphql::{value, Request, Response, Value};

// Re-export `async_graphql` directly as an escape hatch.
pub extern crate async_graphql;
