//! Resolution of declared field types into concrete types.
//!
//! The type of a field in a generic declaration may mention the declaration's type parameters,
//! directly (`node: T`), wrapped in lists and optionals (`nodes: List[Optional[T]]`), inside unions,
//! or as arguments to other generic types (`edge: Edge[T]`). Resolving a field type in the context
//! of a particular instantiation means substituting the instantiation's arguments for the
//! placeholders, and replacing every reference to a generic type with a reference to the concrete
//! type the [registry](super::registry) synthesizes for it.
//!
//! There are two flavors of substitution:
//! * [`substitute`] is purely structural. It replaces placeholders and nothing else. It is used to
//!   compute inherited fields, where the result still refers to the child's own placeholders.
//! * [`Resolver::resolve`] produces a fully concrete type, instantiating generic types as it goes.

use super::{
    names,
    registry::TypeRegistry,
    type_system::{Placeholder, TypeExpr, TypeKind},
};
use crate::error::{
    AmbiguousUnionMemberSnafu, InvalidUnionMemberSnafu, MissingTypeArgumentsSnafu, Result,
    UnboundTypeParameterSnafu,
};
use derive_more::{Deref, DerefMut, From, Into};
use itertools::Itertools;
use snafu::OptionExt;
use std::collections::HashMap;

/// A substitution of concrete types for type parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deref, DerefMut, From, Into)]
pub struct Binding(HashMap<Placeholder, TypeExpr>);

impl FromIterator<(Placeholder, TypeExpr)> for Binding {
    fn from_iter<I: IntoIterator<Item = (Placeholder, TypeExpr)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Binding {
    fn lookup(&self, param: &Placeholder) -> Result<&TypeExpr> {
        self.get(param).with_context(|| UnboundTypeParameterSnafu {
            context: format!(
                "binding {{{}}}",
                self.iter()
                    .map(|(param, ty)| format!("{param}: {ty}"))
                    .sorted()
                    .join(", ")
            ),
            param: param.clone(),
        })
    }
}

/// Replace every placeholder in `ty` with the type it is bound to.
///
/// This does not touch references to other types, so the result may still refer to generic types
/// (and, if the bound types mention placeholders, to placeholders).
pub fn substitute(ty: &TypeExpr, binding: &Binding) -> Result<TypeExpr> {
    Ok(match ty {
        TypeExpr::Scalar(_) | TypeExpr::Object(_) => ty.clone(),
        TypeExpr::Param(param) => binding.lookup(param)?.clone(),
        TypeExpr::List(inner) => TypeExpr::list(substitute(inner, binding)?),
        TypeExpr::Optional(inner) => TypeExpr::optional(substitute(inner, binding)?),
        TypeExpr::Apply { generic, arguments } => TypeExpr::Apply {
            generic: generic.clone(),
            arguments: arguments
                .iter()
                .map(|arg| substitute(arg, binding))
                .collect::<Result<_>>()?,
        },
        TypeExpr::Union { name, members } => TypeExpr::Union {
            name: name.clone(),
            members: members
                .iter()
                .map(|member| substitute(member, binding))
                .collect::<Result<_>>()?,
        },
    })
}

/// Resolves type expressions into concrete types, instantiating generics in a [`TypeRegistry`].
#[derive(Clone, Copy, Debug)]
pub struct Resolver<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    /// Resolve `ty` in the context of `binding`.
    ///
    /// The result contains no placeholders and no references to generic types:
    /// * scalars and references to non-generic types are returned unchanged,
    /// * placeholders are replaced by the types they are bound to (which are expected to be
    ///   resolved already),
    /// * lists and optionals are resolved recursively,
    /// * instantiations of generic types have their arguments resolved and are then replaced by a
    ///   reference to the corresponding concrete type, and
    /// * unions have each member resolved independently and are given a name.
    ///
    /// Every object, union and interface type reached is recorded in the registry.
    pub fn resolve(&self, ty: &TypeExpr, binding: &Binding) -> Result<TypeExpr> {
        match ty {
            TypeExpr::Scalar(_) => Ok(ty.clone()),
            TypeExpr::Param(param) => Ok(binding.lookup(param)?.clone()),
            TypeExpr::List(inner) => Ok(TypeExpr::list(self.resolve(inner, binding)?)),
            TypeExpr::Optional(inner) => Ok(TypeExpr::optional(self.resolve(inner, binding)?)),
            TypeExpr::Object(name) => self.resolve_named(name),
            TypeExpr::Apply { generic, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|arg| self.resolve(arg, binding))
                    .collect::<Result<Vec<_>>>()?;
                let name = self.registry.instantiate(generic, arguments)?;
                Ok(TypeExpr::Object(name))
            }
            TypeExpr::Union { name, members } => {
                self.resolve_union(name.as_deref(), members, binding)
            }
        }
    }

    fn resolve_named(&self, name: &str) -> Result<TypeExpr> {
        // A name which was not declared may still refer to a concrete type synthesized earlier, as
        // when an already resolved type is passed back in as a type argument.
        if !self.registry.catalog().contains(name) && self.registry.is_concrete(name) {
            return Ok(TypeExpr::object(name));
        }

        let desc = self.registry.catalog().get(name)?;
        match desc.kind() {
            TypeKind::Interface => self.registry.interface(name)?,
            TypeKind::Object if desc.is_generic() => {
                return MissingTypeArgumentsSnafu { name }.fail();
            }
            TypeKind::Object => {
                self.registry.instantiate(name, vec![])?;
            }
        }
        Ok(TypeExpr::object(name))
    }

    fn resolve_union(
        &self,
        name: Option<&str>,
        members: &[TypeExpr],
        binding: &Binding,
    ) -> Result<TypeExpr> {
        let mut resolved: Vec<TypeExpr> = vec![];
        for member in members {
            // Unions of unions are flattened.
            let flattened = match self.resolve(member, binding)? {
                TypeExpr::Union { members, .. } => members,
                ty => vec![ty],
            };

            for ty in flattened {
                match &ty {
                    TypeExpr::Object(object) if !self.registry.is_interface(object) => {}
                    _ => return InvalidUnionMemberSnafu { member: member.clone() }.fail(),
                }
                if resolved.contains(&ty) {
                    return AmbiguousUnionMemberSnafu {
                        union: match name {
                            Some(name) => name.to_string(),
                            None => TypeExpr::union(members.iter().cloned()).to_string(),
                        },
                        name: ty.to_string(),
                        members: members.to_vec(),
                    }
                    .fail();
                }
                resolved.push(ty);
            }
        }

        let name = match name {
            Some(name) => name.to_string(),
            None => names::union_name(&resolved, self.registry.naming())?,
        };
        self.registry.register_union(&name, &resolved)?;
        Ok(TypeExpr::Union {
            name: Some(name),
            members: resolved,
        })
    }
}
