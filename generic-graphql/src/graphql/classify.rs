//! Choosing the concrete type of a value returned through a union or an interface.
//!
//! When a field has a union type like `Union[Fallback, Edge[int]]`, the execution engine must be
//! told which member each returned object belongs to. For non-generic members this is simply the
//! object's type name. Objects of a generic type are constructed under the generic name, though,
//! and a union may contain several instantiations of the same generic (`Union[Edge[int],
//! Edge[str]]`), so the concrete type has to be worked out from the value's type arguments.
//!
//! Those arguments are taken from the value itself if it was constructed with explicit arguments.
//! Otherwise they are inferred from field data: the declared type of each field of the generic type
//! is matched against the runtime value of that field, and every placeholder which lines up with a
//! value of a known type is bound to that type. Some values carry no information (nulls, empty
//! lists), so some arguments may remain unknown. A candidate type matches a value if it was
//! instantiated from the value's generic type and agrees with every argument that is known. An
//! inferred argument also agrees with a candidate's argument that it can be served as, like an
//! `Int` where a `Float` is declared, but only when no candidate agrees exactly.

use super::{
    registry::{InstanceKey, SchemaDefinition},
    type_system::{Placeholder, Scalar, TypeExpr},
    value::{Data, Instance},
};
use crate::error::{AmbiguousUnionValueSnafu, NoMatchingUnionMemberSnafu, Result};
use itertools::Itertools;
use std::collections::HashMap;

/// Arguments of a generic value, where known.
type Inferred = HashMap<Placeholder, TypeExpr>;

/// Resolves runtime values to concrete types of a [`SchemaDefinition`].
#[derive(Clone, Copy, Debug)]
pub struct Classifier<'d> {
    definition: &'d SchemaDefinition,
}

impl<'d> Classifier<'d> {
    pub fn new(definition: &'d SchemaDefinition) -> Self {
        Self { definition }
    }

    /// Pick the concrete type among `candidates` which `value` is an instance of.
    pub fn classify<'c>(&self, value: &Instance, candidates: &'c [String]) -> Result<&'c str> {
        // An instance which names one of the candidates directly needs no further work.
        if let Some(candidate) = candidates.iter().find(|c| c.as_str() == value.type_name()) {
            return Ok(candidate.as_str());
        }

        let arguments = self.arguments(value);
        // Explicit arguments must match exactly. Inferred ones only describe the field data, which
        // may be coercible to the declared argument, but an exact match is preferred.
        let explicit = value.arguments().is_some();
        let fits = |key: &InstanceKey, exact: bool| {
            key.generic == value.type_name()
                && key.arguments.len() == arguments.len()
                && key
                    .arguments
                    .iter()
                    .zip(&arguments)
                    .all(|(expected, actual)| match actual {
                        None => true,
                        Some(actual) if exact => actual == expected,
                        Some(actual) => accepts(expected, actual),
                    })
        };
        let origins = candidates
            .iter()
            .filter_map(|candidate| {
                let key = self.definition.object(candidate)?.origin()?;
                Some((candidate, key))
            })
            .collect::<Vec<_>>();
        let mut matches = origins
            .iter()
            .filter(|(_, key)| fits(key, true))
            .map(|(candidate, _)| *candidate)
            .collect::<Vec<_>>();
        if matches.is_empty() && !explicit {
            matches = origins
                .iter()
                .filter(|(_, key)| fits(key, false))
                .map(|(candidate, _)| *candidate)
                .collect();
        }

        match matches.as_slice() {
            [candidate] => {
                tracing::trace!("classified {value} as {candidate}");
                Ok(candidate.as_str())
            }
            [] => NoMatchingUnionMemberSnafu {
                origin: value.type_name(),
                arguments,
                candidates: candidates.to_vec(),
            }
            .fail(),
            _ => AmbiguousUnionValueSnafu {
                origin: value.type_name(),
                candidates: matches.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
            }
            .fail(),
        }
    }

    /// The type arguments of `value`, where they can be determined.
    ///
    /// The result has one entry per type parameter of the value's generic type, in declaration
    /// order. Values of non-generic types have no arguments. Explicit arguments are always known;
    /// one which names no type in the schema is kept as given, and so matches no candidate.
    pub fn arguments(&self, value: &Instance) -> Vec<Option<TypeExpr>> {
        if let Some(arguments) = value.arguments() {
            return arguments
                .iter()
                .map(|arg| {
                    Some(
                        self.definition
                            .canonicalize(arg)
                            .unwrap_or_else(|| arg.clone()),
                    )
                })
                .collect();
        }

        let catalog = self.definition.catalog();
        let Ok(desc) = catalog.get(value.type_name()) else {
            return vec![];
        };
        if !desc.is_generic() {
            return vec![];
        }

        let mut inferred = Inferred::new();
        if let Ok(fields) = catalog.effective_fields(desc) {
            for field in fields {
                self.infer(field.declared_type(), value.get(field.name()), &mut inferred);
            }
        }
        desc.type_parameters()
            .iter()
            .map(|param| inferred.remove(param))
            .collect()
    }

    /// The canonical type of a runtime value, if it can be determined.
    fn type_of(&self, data: &Data) -> Option<TypeExpr> {
        match data {
            Data::Null => None,
            Data::Boolean(_) => Some(Scalar::Boolean.into()),
            Data::Int(_) => Some(Scalar::Int.into()),
            Data::Float(_) => Some(Scalar::Float.into()),
            Data::String(_) => Some(Scalar::String.into()),
            Data::Id(_) => Some(Scalar::Id.into()),
            Data::List(items) => items
                .iter()
                .find_map(|item| self.type_of(item))
                .map(TypeExpr::list),
            Data::Object(instance) => self.type_of_instance(instance),
        }
    }

    fn type_of_instance(&self, instance: &Instance) -> Option<TypeExpr> {
        let name = instance.type_name();
        if self.definition.object(name).is_some() && instance.arguments().is_none() {
            return Some(TypeExpr::object(name));
        }
        let arguments = self
            .arguments(instance)
            .into_iter()
            .collect::<Option<Vec<_>>>()?;
        if let Some(concrete) = self
            .definition
            .instance(&InstanceKey::new(name, arguments.clone()))
        {
            return Some(TypeExpr::object(concrete));
        }
        if instance.arguments().is_some() {
            return None;
        }

        // The inferred arguments may only be coercible to those of an existing instantiation.
        self.definition
            .objects()
            .iter()
            .filter(|object| {
                object.origin().map_or(false, |key| {
                    key.generic == name
                        && key.arguments.len() == arguments.len()
                        && key
                            .arguments
                            .iter()
                            .zip(&arguments)
                            .all(|(expected, actual)| accepts(expected, actual))
                })
            })
            .exactly_one()
            .ok()
            .map(|object| TypeExpr::object(object.name()))
    }

    /// Bind placeholders in `pattern` by matching it against the runtime value `data`.
    fn infer(&self, pattern: &TypeExpr, data: &Data, inferred: &mut Inferred) {
        match (pattern, data) {
            (_, Data::Null) => {}
            (TypeExpr::Optional(inner), data) => self.infer(inner, data, inferred),
            (TypeExpr::List(inner), Data::List(items)) => {
                for item in items {
                    self.infer(inner, item, inferred);
                }
            }
            (TypeExpr::Apply { generic, arguments }, Data::Object(instance))
                if instance.type_name() == generic.as_str() =>
            {
                for (pattern, actual) in arguments.iter().zip(self.arguments(instance)) {
                    if let Some(actual) = actual {
                        self.unify(pattern, &actual, inferred);
                    }
                }
            }
            (pattern, data) => {
                if let Some(actual) = self.type_of(data) {
                    self.unify(pattern, &actual, inferred);
                }
            }
        }
    }

    /// Bind placeholders in `pattern` by matching it against the canonical type `actual`.
    ///
    /// The first type found for a placeholder wins. A value which disagrees with it will fail to
    /// serialize later on.
    fn unify(&self, pattern: &TypeExpr, actual: &TypeExpr, inferred: &mut Inferred) {
        match (pattern, actual) {
            (TypeExpr::Param(param), actual) => {
                inferred
                    .entry(param.clone())
                    .or_insert_with(|| actual.clone());
            }
            (TypeExpr::List(pattern), TypeExpr::List(actual))
            | (TypeExpr::Optional(pattern), TypeExpr::Optional(actual)) => {
                self.unify(pattern, actual, inferred)
            }
            (TypeExpr::Optional(pattern), actual) => self.unify(pattern, actual, inferred),
            (TypeExpr::Apply { generic, arguments }, TypeExpr::Object(name)) => {
                let Some(key) = self
                    .definition
                    .object(name)
                    .and_then(|object| object.origin())
                else {
                    return;
                };
                if key.generic == *generic {
                    for (pattern, actual) in arguments.iter().zip(&key.arguments) {
                        self.unify(pattern, actual, inferred);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Whether a value whose type was inferred as `actual` can be served as type `expected`.
fn accepts(expected: &TypeExpr, actual: &TypeExpr) -> bool {
    if expected == actual {
        return true;
    }
    match (expected, actual) {
        (TypeExpr::Scalar(expected), TypeExpr::Scalar(actual)) => expected.accepts(*actual),
        (TypeExpr::List(expected), TypeExpr::List(actual))
        | (TypeExpr::Optional(expected), TypeExpr::Optional(actual)) => accepts(expected, actual),
        // Nulls are never inferred, so a non-null type fits an optional argument.
        (TypeExpr::Optional(expected), actual) => accepts(expected, actual),
        (TypeExpr::Union { members, .. }, actual) => {
            members.iter().any(|member| accepts(member, actual))
        }
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::Error,
        graphql::{
            registry::TypeRegistry,
            resolver::{Binding, Resolver},
            type_system::{Catalog, TypeDescriptor},
        },
    };
    use std::sync::Arc;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog
            .declare(TypeDescriptor::object("User").field("name", TypeExpr::STRING))
            .unwrap();
        catalog
            .declare(
                TypeDescriptor::object("Edge")
                    .param("T")
                    .field("cursor", TypeExpr::ID)
                    .field("node", TypeExpr::optional(TypeExpr::param("T"))),
            )
            .unwrap();
        catalog
            .declare(
                TypeDescriptor::object("Page")
                    .param("T")
                    .field("nodes", TypeExpr::list(TypeExpr::param("T"))),
            )
            .unwrap();
        catalog
            .declare(
                TypeDescriptor::object("Connection")
                    .param("T")
                    .field("edge", TypeExpr::apply("Edge", [TypeExpr::param("T")])),
            )
            .unwrap();
        catalog
            .declare(TypeDescriptor::object("Query").field("name", TypeExpr::STRING))
            .unwrap();
        catalog
    }

    fn resolve(types: impl IntoIterator<Item = TypeExpr>) -> SchemaDefinition {
        let registry = TypeRegistry::new(Arc::new(catalog()));
        let resolver = Resolver::new(&registry);
        for ty in types {
            resolver.resolve(&ty, &Binding::default()).unwrap();
        }
        registry.finish("Query").unwrap()
    }

    fn definition() -> SchemaDefinition {
        resolve([
            TypeExpr::union([
                TypeExpr::apply("Edge", [TypeExpr::INT]),
                TypeExpr::apply("Edge", [TypeExpr::STRING]),
                TypeExpr::object("User"),
            ]),
            TypeExpr::union([
                TypeExpr::object("User"),
                TypeExpr::apply("Page", [TypeExpr::object("User")]),
            ]),
            TypeExpr::apply("Connection", [TypeExpr::object("User")]),
            TypeExpr::apply("Connection", [TypeExpr::INT]),
        ])
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_non_generic() {
        let definition = definition();
        let classifier = Classifier::new(&definition);
        let candidates = names(&["IntEdge", "StrEdge", "User"]);
        assert_eq!(
            classifier
                .classify(&Instance::new("User").with("name", "P"), &candidates)
                .unwrap(),
            "User"
        );
    }

    #[test]
    fn test_inferred_scalar_argument() {
        let definition = definition();
        let classifier = Classifier::new(&definition);
        let candidates = names(&["IntEdge", "StrEdge", "User"]);
        assert_eq!(
            classifier
                .classify(&Instance::new("Edge").with("node", 1), &candidates)
                .unwrap(),
            "IntEdge"
        );
        assert_eq!(
            classifier
                .classify(&Instance::new("Edge").with("node", "a"), &candidates)
                .unwrap(),
            "StrEdge"
        );
    }

    #[test]
    fn test_explicit_argument() {
        let definition = definition();
        let classifier = Classifier::new(&definition);
        let candidates = names(&["IntEdge", "StrEdge", "User"]);
        assert_eq!(
            classifier
                .classify(&Instance::of("Edge", [TypeExpr::STRING]), &candidates)
                .unwrap(),
            "StrEdge"
        );
    }

    #[test]
    fn test_unknown_argument_is_ambiguous() {
        let definition = definition();
        let classifier = Classifier::new(&definition);
        let candidates = names(&["IntEdge", "StrEdge", "User"]);
        assert_eq!(
            classifier
                .classify(&Instance::new("Edge").with("cursor", Data::id("1")), &candidates)
                .unwrap_err(),
            Error::AmbiguousUnionValue {
                origin: "Edge".into(),
                candidates: names(&["IntEdge", "StrEdge"]),
            }
        );
    }

    #[test]
    fn test_empty_list_eliminates_by_origin() {
        let definition = definition();
        let classifier = Classifier::new(&definition);
        let candidates = names(&["User", "UserPage"]);
        let page = Instance::new("Page").with("nodes", Data::List(vec![]));
        assert_eq!(classifier.classify(&page, &candidates).unwrap(), "UserPage");
    }

    #[test]
    fn test_no_matching_member() {
        let definition = definition();
        let classifier = Classifier::new(&definition);
        let candidates = names(&["User", "UserPage"]);
        let page = Instance::new("Page").with("nodes", Data::List(vec!["bad example".into()]));
        let err = classifier.classify(&page, &candidates).unwrap_err();
        assert_eq!(
            err,
            Error::NoMatchingUnionMember {
                origin: "Page".into(),
                arguments: vec![Some(TypeExpr::STRING)],
                candidates: candidates.clone(),
            }
        );
        assert_eq!(
            err.to_string(),
            "unable to find a type for Page with arguments (String) among [User, UserPage]"
        );
    }

    #[test]
    fn test_nested_inference() {
        let definition = definition();
        let classifier = Classifier::new(&definition);
        let connection = Instance::new("Connection").with(
            "edge",
            Instance::new("Edge").with("node", Instance::new("User").with("name", "P")),
        );
        assert_eq!(
            classifier.arguments(&connection),
            [Some(TypeExpr::object("User"))]
        );
        assert_eq!(
            classifier
                .classify(&connection, &names(&["IntConnection", "UserConnection"]))
                .unwrap(),
            "UserConnection"
        );
    }

    #[test]
    fn test_inference_through_concrete_name() {
        let definition = definition();
        let classifier = Classifier::new(&definition);
        // The nested edge is constructed under its synthesized name.
        let connection =
            Instance::new("Connection").with("edge", Instance::new("IntEdge").with("node", 1));
        assert_eq!(classifier.arguments(&connection), [Some(TypeExpr::INT)]);
    }

    #[test]
    fn test_explicit_argument_without_instantiation() {
        let definition = resolve([TypeExpr::union([
            TypeExpr::object("User"),
            TypeExpr::apply("Edge", [TypeExpr::apply("Edge", [TypeExpr::INT])]),
        ])]);
        let classifier = Classifier::new(&definition);
        let candidates = names(&["User", "IntEdgeEdge"]);

        // `Edge[Str]` was never instantiated, so no `Edge[Edge[Str]]` can be among the candidates.
        let value = Instance::of("Edge", [TypeExpr::apply("Edge", [TypeExpr::STRING])]);
        assert_eq!(
            classifier.classify(&value, &candidates).unwrap_err(),
            Error::NoMatchingUnionMember {
                origin: "Edge".into(),
                arguments: vec![Some(TypeExpr::apply("Edge", [TypeExpr::STRING]))],
                candidates: candidates.clone(),
            }
        );

        let value = Instance::of("Edge", [TypeExpr::param("T")]);
        assert!(matches!(
            classifier.classify(&value, &candidates),
            Err(Error::NoMatchingUnionMember { .. })
        ));

        // The instantiated argument still classifies.
        let value = Instance::of("Edge", [TypeExpr::apply("Edge", [TypeExpr::INT])]);
        assert_eq!(
            classifier.classify(&value, &candidates).unwrap(),
            "IntEdgeEdge"
        );
    }

    #[test]
    fn test_coerced_scalar_arguments() {
        let definition = resolve([
            TypeExpr::union([
                TypeExpr::object("User"),
                TypeExpr::apply("Edge", [TypeExpr::FLOAT]),
            ]),
            TypeExpr::union([
                TypeExpr::object("User"),
                TypeExpr::apply("Edge", [TypeExpr::ID]),
            ]),
        ]);
        let classifier = Classifier::new(&definition);

        let floats = names(&["User", "FloatEdge"]);
        assert_eq!(
            classifier
                .classify(&Instance::new("Edge").with("node", 1), &floats)
                .unwrap(),
            "FloatEdge"
        );

        let ids = names(&["User", "IDEdge"]);
        assert_eq!(
            classifier
                .classify(&Instance::new("Edge").with("node", "abc"), &ids)
                .unwrap(),
            "IDEdge"
        );
        assert_eq!(
            classifier
                .classify(&Instance::new("Edge").with("node", 1), &ids)
                .unwrap(),
            "IDEdge"
        );
        assert!(matches!(
            classifier.classify(&Instance::new("Edge").with("node", true), &ids),
            Err(Error::NoMatchingUnionMember { .. })
        ));

        // Explicit arguments are not coerced.
        assert!(matches!(
            classifier.classify(&Instance::of("Edge", [TypeExpr::INT]), &floats),
            Err(Error::NoMatchingUnionMember { .. })
        ));
    }

    #[test]
    fn test_exact_argument_preferred_over_coercion() {
        let definition = resolve([TypeExpr::union([
            TypeExpr::apply("Edge", [TypeExpr::INT]),
            TypeExpr::apply("Edge", [TypeExpr::FLOAT]),
            TypeExpr::apply("Edge", [TypeExpr::ID]),
        ])]);
        let classifier = Classifier::new(&definition);
        let candidates = names(&["IntEdge", "FloatEdge", "IDEdge"]);
        assert_eq!(
            classifier
                .classify(&Instance::new("Edge").with("node", 1), &candidates)
                .unwrap(),
            "IntEdge"
        );
        assert_eq!(
            classifier
                .classify(&Instance::new("Edge").with("node", 1.5), &candidates)
                .unwrap(),
            "FloatEdge"
        );
    }

    #[test]
    fn test_nested_coerced_argument() {
        let definition = resolve([TypeExpr::union([
            TypeExpr::object("User"),
            TypeExpr::apply("Connection", [TypeExpr::FLOAT]),
        ])]);
        let classifier = Classifier::new(&definition);
        let connection =
            Instance::new("Connection").with("edge", Instance::new("Edge").with("node", 1));
        assert_eq!(
            classifier
                .classify(&connection, &names(&["User", "FloatConnection"]))
                .unwrap(),
            "FloatConnection"
        );
    }
}
