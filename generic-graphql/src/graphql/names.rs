//! Names for concrete instantiations of generic types.
//!
//! A generic type `Edge[T]` used as `Edge[int]` becomes a GraphQL object type called `IntEdge`:
//! the display name of each type argument, in the order the parameters were declared, followed by
//! the name of the generic type itself. Display names are derived from resolved type expressions,
//! so the argument of a nested instantiation is named after the concrete type it resolved to
//! (`Edge[Connection[User]]` is `UserConnectionEdge`).
//!
//! Synthesis is purely a function of the generic name and the argument names. Two structurally
//! different instantiations can synthesize the same name (consider `Edge[IntList]` where
//! `IntList` is a user-declared type, and `Edge[List[int]]`). Such collisions are not resolved
//! here; the [registry](super::registry) detects them and refuses to build the schema.

use super::type_system::{Scalar, TypeExpr};
use crate::error::{Result, UnboundTypeParameterSnafu};
use derive_more::Display;
use itertools::Itertools;

/// How scalar type arguments are rendered in synthesized names.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum NameStyle {
    /// Abbreviated scalar names: `Int`, `Float`, `Str`, `Bool` and `ID`.
    #[default]
    #[display(fmt = "short")]
    Short,
    /// The names of the GraphQL scalars: `Int`, `Float`, `String`, `Boolean` and `ID`.
    #[display(fmt = "graphql")]
    GraphQl,
}

impl NameStyle {
    /// The display name of `scalar` in this style.
    pub fn scalar(self, scalar: Scalar) -> &'static str {
        match (self, scalar) {
            (_, Scalar::Int) => "Int",
            (_, Scalar::Float) => "Float",
            (_, Scalar::Id) => "ID",
            (Self::Short, Scalar::String) => "Str",
            (Self::Short, Scalar::Boolean) => "Bool",
            (Self::GraphQl, Scalar::String) => "String",
            (Self::GraphQl, Scalar::Boolean) => "Boolean",
        }
    }
}

/// Synthesize the name of an instantiation of `generic` from the names of its arguments.
pub fn synthesize<I>(generic: &str, argument_names: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut name = argument_names
        .into_iter()
        .map(|arg| capitalize(arg.as_ref()))
        .join("");
    name.push_str(generic);
    name
}

/// The name used for `ty` when it appears as a type argument.
///
/// `ty` must already be resolved: references to generic types must have been replaced by the
/// concrete types they resolved to. Placeholders cannot be named and result in an error.
pub fn display_name(ty: &TypeExpr, style: NameStyle) -> Result<String> {
    Ok(match ty {
        TypeExpr::Scalar(scalar) => style.scalar(*scalar).to_string(),
        TypeExpr::Object(name) => capitalize(name),
        TypeExpr::List(inner) => format!("{}List", display_name(inner, style)?),
        TypeExpr::Optional(inner) => format!("{}Optional", display_name(inner, style)?),
        TypeExpr::Union {
            name: Some(name), ..
        } => capitalize(name),
        TypeExpr::Union {
            name: None,
            members,
        } => union_name(members, style)?,
        TypeExpr::Apply {
            generic,
            arguments,
        } => synthesize(
            generic,
            arguments
                .iter()
                .map(|arg| display_name(arg, style))
                .collect::<Result<Vec<_>>>()?,
        ),
        TypeExpr::Param(param) => {
            return UnboundTypeParameterSnafu {
                context: "a synthesized type name",
                param: param.clone(),
            }
            .fail()
        }
    })
}

/// The name of an anonymous union of `members`.
pub fn union_name(members: &[TypeExpr], style: NameStyle) -> Result<String> {
    members
        .iter()
        .map(|member| display_name(member, style))
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_single_parameter() {
        assert_eq!(synthesize("Edge", ["Int"]), "IntEdge");
        assert_eq!(synthesize("Edge", ["Product"]), "ProductEdge");
        assert_eq!(
            synthesize("EdgeWithCursor", ["SpecialPerson"]),
            "SpecialPersonEdgeWithCursor"
        );
    }

    #[test]
    fn test_multiple_parameters() {
        let args = [TypeExpr::INT, TypeExpr::STRING]
            .iter()
            .map(|arg| display_name(arg, NameStyle::Short))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(synthesize("Multiple", args), "IntStrMultiple");
    }

    #[test]
    fn test_styles() {
        assert_eq!(display_name(&TypeExpr::STRING, NameStyle::Short).unwrap(), "Str");
        assert_eq!(
            display_name(&TypeExpr::STRING, NameStyle::GraphQl).unwrap(),
            "String"
        );
        assert_eq!(
            display_name(&TypeExpr::BOOLEAN, NameStyle::Short).unwrap(),
            "Bool"
        );
        assert_eq!(
            display_name(&TypeExpr::BOOLEAN, NameStyle::GraphQl).unwrap(),
            "Boolean"
        );
        assert_eq!(display_name(&TypeExpr::ID, NameStyle::Short).unwrap(), "ID");
    }

    #[test]
    fn test_wrappers() {
        assert_eq!(
            display_name(&TypeExpr::list(TypeExpr::INT), NameStyle::Short).unwrap(),
            "IntList"
        );
        assert_eq!(
            display_name(
                &TypeExpr::optional(TypeExpr::object("user")),
                NameStyle::Short
            )
            .unwrap(),
            "UserOptional"
        );
        assert_eq!(
            display_name(
                &TypeExpr::union([TypeExpr::object("Fallback"), TypeExpr::object("IntEdge")]),
                NameStyle::Short
            )
            .unwrap(),
            "FallbackIntEdge"
        );
    }

    #[test]
    fn test_placeholder_has_no_name() {
        assert!(display_name(&TypeExpr::param("T"), NameStyle::Short).is_err());
    }

    #[test]
    fn test_empty_generic_name_parts() {
        assert_eq!(synthesize("Edge", Vec::<String>::new()), "Edge");
        assert_eq!(capitalize(""), "");
    }
}
