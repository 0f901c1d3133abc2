//! Type system for a generic GraphQL API.
//!
//! GraphQL itself is monomorphic: every object type in a schema has a single, fixed set of fields
//! with fixed types. Applications, however, often want to write a type once and use it many times
//! with different contents, like a Relay `Edge` wrapping nodes of any type. This module defines
//! the declarations from which such schemas are built.
//!
//! At a high-level the type system consists of the following notions:
//! * Every declared type is described by a [`TypeDescriptor`], which has a name, an ordered list
//!   of [`FieldDescriptor`]s and, if it is generic, an ordered list of type parameters
//!   ([`Placeholder`]s).
//! * The type of every field is a [`TypeExpr`], a recursive structure built from [`Scalar`]s,
//!   references to other declared types, placeholders, lists, optionals and unions.
//! * Declarations are collected in a [`Catalog`], which validates them and answers questions about
//!   them, like which fields a type has once inheritance is taken into account.
//!
//! A generic descriptor is only a template. It never appears in a schema directly; instead the
//! [registry](super::registry) synthesizes a concrete object type for each distinct list of type
//! arguments it is used with.

use crate::error::{
    DuplicateDeclarationSnafu, DuplicateFieldSnafu, DuplicateTypeParameterSnafu,
    GenericInterfaceSnafu, InvalidBaseSnafu, Result, UnboundTypeParameterSnafu,
    UnknownTypeSnafu, UnusedTypeParameterSnafu,
};
use super::resolver::{substitute, Binding};
use derive_more::{Display, From};
use itertools::Itertools;
use snafu::{ensure, OptionExt};
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// A built-in GraphQL scalar.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scalar {
    #[display(fmt = "Int")]
    Int,
    #[display(fmt = "Float")]
    Float,
    #[display(fmt = "String")]
    String,
    #[display(fmt = "Boolean")]
    Boolean,
    #[display(fmt = "ID")]
    Id,
}

impl Scalar {
    /// Whether a value of scalar type `actual` can be served as a value of this type.
    ///
    /// Besides exact matches, an `Int` is accepted as a `Float`, and a `String` or `Int` as an
    /// `ID`.
    pub fn accepts(self, actual: Scalar) -> bool {
        matches!(
            (self, actual),
            (Self::Float, Self::Int) | (Self::Id, Self::String) | (Self::Id, Self::Int)
        ) || self == actual
    }
}

/// A type parameter of a generic declaration.
///
/// Placeholders are identified by their symbolic name, which must be unique within a single
/// declaration. Two declarations may use the same name for unrelated parameters.
#[derive(Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, From)]
#[display(fmt = "{}", _0)]
pub struct Placeholder(String);

impl Placeholder {
    /// A placeholder with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name of this placeholder.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Placeholder {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The declared type of a field, or a type argument.
///
/// Types are non-null unless wrapped in [`Optional`](Self::Optional).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeExpr {
    /// A built-in scalar.
    Scalar(Scalar),
    /// A list of values of the inner type.
    List(Box<TypeExpr>),
    /// A nullable value of the inner type.
    Optional(Box<TypeExpr>),
    /// A reference to a non-generic object or interface type, by name.
    ///
    /// After resolution, references to instantiations of generic types also take this form,
    /// naming the synthesized concrete type.
    Object(String),
    /// A reference to a type parameter of the enclosing declaration.
    Param(Placeholder),
    /// A reference to a generic type, instantiated with the given arguments.
    Apply {
        generic: String,
        arguments: Vec<TypeExpr>,
    },
    /// A union of object types.
    ///
    /// If no name is given, one is derived from the names of the members.
    Union {
        name: Option<String>,
        members: Vec<TypeExpr>,
    },
}

impl TypeExpr {
    pub const INT: Self = Self::Scalar(Scalar::Int);
    pub const FLOAT: Self = Self::Scalar(Scalar::Float);
    pub const STRING: Self = Self::Scalar(Scalar::String);
    pub const BOOLEAN: Self = Self::Scalar(Scalar::Boolean);
    pub const ID: Self = Self::Scalar(Scalar::Id);

    /// A reference to a named, non-generic type.
    pub fn object(name: impl Into<String>) -> Self {
        Self::Object(name.into())
    }

    /// A reference to a type parameter.
    pub fn param(name: impl Into<Placeholder>) -> Self {
        Self::Param(name.into())
    }

    /// An instantiation of the generic type `generic` with `arguments`.
    pub fn apply(generic: impl Into<String>, arguments: impl IntoIterator<Item = TypeExpr>) -> Self {
        Self::Apply {
            generic: generic.into(),
            arguments: arguments.into_iter().collect(),
        }
    }

    /// A list of `inner`.
    pub fn list(inner: TypeExpr) -> Self {
        Self::List(Box::new(inner))
    }

    /// A nullable `inner`.
    pub fn optional(inner: TypeExpr) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// An anonymous union, named after its members.
    pub fn union(members: impl IntoIterator<Item = TypeExpr>) -> Self {
        Self::Union {
            name: None,
            members: members.into_iter().collect(),
        }
    }

    /// A union with an explicit name.
    pub fn named_union(
        name: impl Into<String>,
        members: impl IntoIterator<Item = TypeExpr>,
    ) -> Self {
        Self::Union {
            name: Some(name.into()),
            members: members.into_iter().collect(),
        }
    }

    /// Collect the placeholders mentioned anywhere in this expression.
    pub fn placeholders(&self) -> HashSet<&Placeholder> {
        let mut params = HashSet::new();
        self.visit_placeholders(&mut |param| {
            params.insert(param);
        });
        params
    }

    fn visit_placeholders<'a>(&'a self, f: &mut impl FnMut(&'a Placeholder)) {
        match self {
            Self::Scalar(_) | Self::Object(_) => {}
            Self::Param(param) => f(param),
            Self::List(inner) | Self::Optional(inner) => inner.visit_placeholders(f),
            Self::Apply { arguments, .. } => {
                for arg in arguments {
                    arg.visit_placeholders(f);
                }
            }
            Self::Union { members, .. } => {
                for member in members {
                    member.visit_placeholders(f);
                }
            }
        }
    }
}

impl Display for TypeExpr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{scalar}"),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::Optional(inner) => write!(f, "Optional[{inner}]"),
            Self::Object(name) => write!(f, "{name}"),
            Self::Param(param) => write!(f, "{param}"),
            Self::Apply { generic, arguments } => {
                write!(f, "{generic}[{}]", arguments.iter().format(", "))
            }
            Self::Union {
                name: Some(name), ..
            } => write!(f, "{name}"),
            Self::Union {
                name: None,
                members,
            } => write!(f, "Union[{}]", members.iter().format(", ")),
        }
    }
}

impl From<Scalar> for TypeExpr {
    fn from(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }
}

/// The kind of a declared type.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum TypeKind {
    #[display(fmt = "object")]
    Object,
    #[display(fmt = "interface")]
    Interface,
}

/// A field of a declared type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    declared_type: TypeExpr,
    description: Option<String>,
}

impl FieldDescriptor {
    /// A field called `name` of type `declared_type`.
    pub fn new(name: impl Into<String>, declared_type: TypeExpr) -> Self {
        Self {
            name: name.into(),
            declared_type,
            description: None,
        }
    }

    /// Attach documentation to this field, which will appear in the exported schema.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> &TypeExpr {
        &self.declared_type
    }

    pub fn doc(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The same field with a different type.
    pub(crate) fn with_type(&self, declared_type: TypeExpr) -> Self {
        Self {
            name: self.name.clone(),
            declared_type,
            description: self.description.clone(),
        }
    }
}

/// The declaration of an object or interface type.
///
/// Descriptors are built with a builder-style API and then registered in a [`Catalog`]:
///
/// ```
/// # use generic_graphql::graphql::type_system::{Catalog, TypeDescriptor, TypeExpr};
/// let mut catalog = Catalog::default();
/// catalog
///     .declare(
///         TypeDescriptor::object("Edge")
///             .param("T")
///             .field("cursor", TypeExpr::ID)
///             .field("node", TypeExpr::param("T")),
///     )
///     .unwrap();
/// assert!(catalog.get("Edge").unwrap().is_generic());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    description: Option<String>,
    fields: Vec<FieldDescriptor>,
    type_parameters: Vec<Placeholder>,
    extends: Option<TypeExpr>,
    implements: Vec<String>,
}

impl TypeDescriptor {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            fields: vec![],
            type_parameters: vec![],
            extends: None,
            implements: vec![],
        }
    }

    /// Start declaring an object type.
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Object)
    }

    /// Start declaring an interface type.
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Add a type parameter.
    pub fn param(mut self, param: impl Into<Placeholder>) -> Self {
        self.type_parameters.push(param.into());
        self
    }

    /// Add a field.
    pub fn field(self, name: impl Into<String>, declared_type: TypeExpr) -> Self {
        self.field_descriptor(FieldDescriptor::new(name, declared_type))
    }

    /// Add a field with additional metadata.
    pub fn field_descriptor(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Attach documentation to this type, which will appear in the exported schema.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Inherit the fields of another object type.
    ///
    /// `base` is either a plain reference to an object type or an instantiation of a generic
    /// object type, whose arguments may refer to this type's own parameters.
    pub fn extends(mut self, base: TypeExpr) -> Self {
        self.extends = Some(base);
        self
    }

    /// Declare that this object type implements `interface`.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn doc(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The fields declared directly on this type, excluding inherited fields.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn type_parameters(&self) -> &[Placeholder] {
        &self.type_parameters
    }

    pub fn base(&self) -> Option<&TypeExpr> {
        self.extends.as_ref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.implements
    }

    pub fn is_generic(&self) -> bool {
        !self.type_parameters.is_empty()
    }

    /// Bind each of this type's parameters to the corresponding argument.
    ///
    /// The caller is responsible for checking that the number of arguments is correct.
    pub(crate) fn bind(&self, arguments: &[TypeExpr]) -> Binding {
        self.type_parameters
            .iter()
            .cloned()
            .zip(arguments.iter().cloned())
            .collect()
    }
}

/// All of the types declared for a schema.
///
/// Generic declarations live in the catalog for the lifetime of the process (or for as long as the
/// catalog is kept around). Concrete instantiations are not stored here; they are created lazily
/// by a [`TypeRegistry`](super::registry::TypeRegistry) while a schema is being built.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

impl Catalog {
    /// Add a declaration to the catalog.
    ///
    /// The declaration is stored unchanged, after checking that
    /// * no type with the same name has been declared,
    /// * its type parameters and fields have distinct names,
    /// * every placeholder mentioned by a field is one of its type parameters,
    /// * every type parameter is used by some field (or by the base type it extends),
    /// * interfaces are not generic, and
    /// * the base type, if any, is an object type which has already been declared.
    pub fn declare(&mut self, desc: TypeDescriptor) -> Result<Arc<TypeDescriptor>> {
        ensure!(
            !self.types.contains_key(&desc.name),
            DuplicateDeclarationSnafu { name: &desc.name }
        );
        ensure!(
            desc.kind == TypeKind::Object || !desc.is_generic(),
            GenericInterfaceSnafu { name: &desc.name }
        );

        let mut params = HashSet::new();
        for param in &desc.type_parameters {
            ensure!(
                params.insert(param),
                DuplicateTypeParameterSnafu {
                    ty: &desc.name,
                    param: param.clone(),
                }
            );
        }

        let mut fields = HashSet::new();
        for field in &desc.fields {
            ensure!(
                fields.insert(field.name()),
                DuplicateFieldSnafu {
                    ty: &desc.name,
                    field: field.name(),
                }
            );
        }

        // Every placeholder we mention must be declared, and every declared placeholder must be
        // mentioned somewhere.
        let mut used = HashSet::new();
        for ty in desc
            .fields
            .iter()
            .map(|field| field.declared_type())
            .chain(&desc.extends)
        {
            for param in ty.placeholders() {
                ensure!(
                    params.contains(param),
                    UnboundTypeParameterSnafu {
                        context: &desc.name,
                        param: param.clone(),
                    }
                );
                used.insert(param);
            }
        }
        if let Some(param) = desc
            .type_parameters
            .iter()
            .find(|param| !used.contains(param))
        {
            return UnusedTypeParameterSnafu {
                ty: &desc.name,
                param: param.clone(),
            }
            .fail();
        }

        if let Some(base) = &desc.extends {
            self.check_base(&desc, base)?;
        }

        tracing::debug!(
            "declared {} {}{}",
            desc.kind,
            desc.name,
            if desc.is_generic() {
                format!("[{}]", desc.type_parameters.iter().format(", "))
            } else {
                String::new()
            }
        );
        let desc = Arc::new(desc);
        self.types.insert(desc.name.clone(), desc.clone());
        Ok(desc)
    }

    /// Look up a declaration by name.
    pub fn get(&self, name: &str) -> Result<&Arc<TypeDescriptor>> {
        self.types.get(name).context(UnknownTypeSnafu { name })
    }

    /// Is a type called `name` declared?
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// All of the fields of `desc`, including those it inherits.
    ///
    /// Inherited fields come first, in the order of the base type, with the base type's
    /// placeholders replaced by the arguments given in [`extends`](TypeDescriptor::extends). A
    /// field declared directly on `desc` with the same name as an inherited field replaces the
    /// inherited field in place. The remaining fields of `desc` follow, in declaration order.
    pub fn effective_fields(&self, desc: &TypeDescriptor) -> Result<Vec<FieldDescriptor>> {
        let mut fields = match desc.base() {
            Some(base) => {
                let (base, arguments) = self.base_of(desc, base)?;
                let binding = base.bind(arguments);
                self.effective_fields(base)?
                    .into_iter()
                    .map(|field| Ok(field.with_type(substitute(field.declared_type(), &binding)?)))
                    .collect::<Result<Vec<_>>>()?
            }
            None => vec![],
        };

        for field in &desc.fields {
            match fields.iter_mut().find(|inherited| inherited.name == field.name) {
                Some(inherited) => *inherited = field.clone(),
                None => fields.push(field.clone()),
            }
        }
        Ok(fields)
    }

    /// All of the interfaces implemented by `desc`, including those implemented by its base types.
    pub fn effective_interfaces(&self, desc: &TypeDescriptor) -> Result<Vec<String>> {
        let mut interfaces = match desc.base() {
            Some(base) => {
                let (base, _) = self.base_of(desc, base)?;
                self.effective_interfaces(base)?
            }
            None => vec![],
        };
        for interface in &desc.implements {
            if !interfaces.contains(interface) {
                interfaces.push(interface.clone());
            }
        }
        Ok(interfaces)
    }

    fn base_of<'a>(
        &'a self,
        desc: &TypeDescriptor,
        base: &'a TypeExpr,
    ) -> Result<(&'a TypeDescriptor, &'a [TypeExpr])> {
        let (name, arguments) = match base {
            TypeExpr::Object(name) => (name, &[][..]),
            TypeExpr::Apply { generic, arguments } => (generic, arguments.as_slice()),
            _ => {
                return InvalidBaseSnafu {
                    ty: &desc.name,
                    base: base.to_string(),
                    reason: "only object types can be extended",
                }
                .fail()
            }
        };
        let base_desc = self.types.get(name).context(InvalidBaseSnafu {
            ty: &desc.name,
            base: base.to_string(),
            reason: "the base type must be declared first",
        })?;
        Ok((base_desc.as_ref(), arguments))
    }

    fn check_base(&self, desc: &TypeDescriptor, base: &TypeExpr) -> Result<()> {
        let (base_desc, arguments) = self.base_of(desc, base)?;
        ensure!(
            base_desc.kind == TypeKind::Object,
            InvalidBaseSnafu {
                ty: &desc.name,
                base: base.to_string(),
                reason: "interfaces cannot be extended",
            }
        );
        ensure!(
            base_desc.type_parameters.len() == arguments.len(),
            InvalidBaseSnafu {
                ty: &desc.name,
                base: base.to_string(),
                reason: format!(
                    "expected {} type arguments, found {}",
                    base_desc.type_parameters.len(),
                    arguments.len()
                ),
            }
        );
        Ok(())
    }
}
