//! Generic GraphQL types, resolved into concrete schema types.
//!
//! GraphQL has no notion of type parameters: every object type in a schema is concrete. It is
//! nevertheless common to define families of types which differ only in the type of some of their
//! fields (`IntEdge`, `UserEdge`, `UserConnection`, ...). This crate lets such families be
//! declared once, as generic types, and instantiated wherever they are used.
//!
//! The crate consists of a few layers:
//!
//! * A [type system](graphql::type_system) for declaring object types and interfaces, with type
//!   parameters, inheritance and unions.
//! * A [resolver](graphql::resolver) and [registry](graphql::registry) which turn every use of a
//!   generic type into a concrete type with a deterministic, globally unique
//!   [name](graphql::names), memoizing instantiations so that equal uses share one type.
//! * A [classifier](graphql::classify) which works out, at query time, which concrete type a value
//!   of a generic type belongs to when it is returned through a union or an interface.
//! * A [schema](graphql::schema) adapter which builds an executable `async_graphql` schema serving
//!   [runtime values](graphql::value).

use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub mod error;
pub mod graphql;
pub mod prelude;

pub use error::{Error, Result};

/// Initialize tracing.
pub fn init_logging() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        color_eyre::install().ok();
        tracing_subscriber::fmt()
            .with_ansi(true)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    });
}
