//! Memoized instantiation of generic types.
//!
//! The [`TypeRegistry`] is the single place where concrete object types are created while a schema
//! is being built. Every instantiation is keyed structurally by the generic type and its resolved
//! arguments ([`InstanceKey`]), so using `Edge[int]` in ten places yields one `IntEdge` type, and
//! every caller observes the very same [`ConcreteType`] instance.
//!
//! Instantiation is lazy: a concrete type is created the first time the
//! [resolver](super::resolver) encounters it. Creating it means synthesizing its name, checking the
//! name against every other type in the schema, and then resolving each of the generic type's
//! fields with the type parameters bound to the instantiation's arguments. Resolving those fields
//! can in turn instantiate more types, including the type being created (as in
//! `Node[T] { next: Optional[Node[T]] }`). To make this terminate, the name is reserved before the
//! fields are resolved.
//!
//! Once the schema is complete the registry is frozen into a [`SchemaDefinition`], a flat, read-only
//! description of all the object, union and interface types in the schema, which is what the
//! [schema](super::schema) adapter hands to the execution engine and what the
//! [classifier](super::classify) consults at query time.

use super::{
    names::{self, NameStyle},
    resolver::{Binding, Resolver},
    type_system::{Catalog, FieldDescriptor, TypeDescriptor, TypeExpr, TypeKind},
};
use crate::error::{
    ArityMismatchSnafu, MissingTypeArgumentsSnafu, NameCollisionSnafu, NotAnInterfaceSnafu,
    NotAnObjectSnafu, NotGenericSnafu, RecursiveInstantiationSnafu, Result,
    TooManyInstantiationsSnafu,
};
use derivative::Derivative;
use itertools::Itertools;
use parking_lot::ReentrantMutex;
use snafu::{ensure, OptionExt};
use std::cell::RefCell;
use std::collections::hash_map::{Entry, HashMap};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// The default limit on the number of concrete types a single registry will create.
///
/// Generic types which refer to themselves with ever larger arguments (like
/// `Nested[T] { inner: Nested[List[T]] }`) would otherwise instantiate forever.
pub const DEFAULT_MAX_INSTANTIATIONS: usize = 4096;

/// Identifies an instantiation of a generic type.
///
/// Keys compare structurally, so two keys with equal arguments are the same key no matter where
/// they were written. The arguments are always fully resolved (they contain no placeholders and no
/// references to generic types), so equal keys really do denote the same concrete type.
///
/// Non-generic object types are keyed by their name and an empty argument list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub generic: String,
    pub arguments: Vec<TypeExpr>,
}

impl InstanceKey {
    pub fn new(generic: impl Into<String>, arguments: impl IntoIterator<Item = TypeExpr>) -> Self {
        Self {
            generic: generic.into(),
            arguments: arguments.into_iter().collect(),
        }
    }
}

impl Display for InstanceKey {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.arguments.is_empty() {
            write!(f, "{}", self.generic)
        } else {
            write!(f, "{}[{}]", self.generic, self.arguments.iter().format(", "))
        }
    }
}

/// A concrete GraphQL object type, possibly synthesized from a generic declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConcreteType {
    name: String,
    description: Option<String>,
    fields: Vec<FieldDescriptor>,
    implements: Vec<String>,
    origin: Option<InstanceKey>,
}

impl ConcreteType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The fields of this type, with fully resolved types.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// The interfaces this type implements.
    pub fn interfaces(&self) -> &[String] {
        &self.implements
    }

    /// The generic type and arguments this type was synthesized from.
    ///
    /// This is [`None`] for types which were declared directly.
    pub fn origin(&self) -> Option<&InstanceKey> {
        self.origin.as_ref()
    }
}

/// A union of concrete object types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnionType {
    name: String,
    members: Vec<String>,
}

impl UnionType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The names of the possible types of this union, in declaration order.
    pub fn members(&self) -> &[String] {
        &self.members
    }
}

/// A (non-generic) interface type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceType {
    name: String,
    description: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl InterfaceType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// The thing which claimed a type name.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Owner {
    Instance(InstanceKey),
    Union(Vec<String>),
    Interface(String),
}

impl Display for Owner {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Instance(key) => write!(f, "{key}"),
            Self::Union(members) => write!(f, "Union[{}]", members.iter().format(", ")),
            Self::Interface(name) => write!(f, "interface {name}"),
        }
    }
}

#[derive(Debug)]
struct Slot {
    name: String,
    // `None` while the type is being constructed.
    ty: Option<Arc<ConcreteType>>,
}

#[derive(Debug, Default)]
struct State {
    instances: HashMap<InstanceKey, Slot>,
    // Instances in the order they were completed.
    order: Vec<InstanceKey>,
    names: HashMap<String, Owner>,
    unions: Vec<UnionType>,
    interfaces: HashMap<String, Option<Arc<InterfaceType>>>,
    interface_order: Vec<String>,
}

impl State {
    /// Reserve `name` for `owner`.
    ///
    /// Claiming a name twice for the same owner is a no-op.
    fn claim(&mut self, name: &str, owner: Owner) -> Result<()> {
        match self.names.entry(name.to_string()) {
            Entry::Occupied(e) => {
                ensure!(
                    *e.get() == owner,
                    NameCollisionSnafu {
                        name,
                        existing: e.get().to_string(),
                        conflicting: owner.to_string(),
                    }
                );
            }
            Entry::Vacant(e) => {
                e.insert(owner);
            }
        }
        Ok(())
    }
}

/// Creates and caches the concrete types of a schema.
///
/// A registry is meant to be scoped to the construction of a single schema: it is created when the
/// build starts and consumed by [`finish`](Self::finish) when it ends. It is nevertheless safe to
/// share between threads. All synthesis happens under a single re-entrant lock, so recursive
/// resolution on one thread proceeds normally while concurrent requests for the same key wait and
/// then receive the instance created by whichever thread got there first.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TypeRegistry {
    #[derivative(Debug = "ignore")]
    catalog: Arc<Catalog>,
    naming: NameStyle,
    max_instantiations: usize,
    state: ReentrantMutex<RefCell<State>>,
}

impl TypeRegistry {
    /// An empty registry for types declared in `catalog`.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            naming: NameStyle::default(),
            max_instantiations: DEFAULT_MAX_INSTANTIATIONS,
            state: Default::default(),
        }
    }

    /// Use `naming` to render scalar type arguments in synthesized names.
    pub fn with_naming(mut self, naming: NameStyle) -> Self {
        self.naming = naming;
        self
    }

    /// Fail if more than `limit` concrete types are created.
    pub fn with_max_instantiations(mut self, limit: usize) -> Self {
        self.max_instantiations = limit;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn naming(&self) -> NameStyle {
        self.naming
    }

    /// Get the concrete type for `generic` instantiated with `arguments`, creating it if necessary.
    ///
    /// The arguments are resolved first, so they may themselves be instantiations of generic types,
    /// but they may not mention placeholders. `generic` may also name a non-generic object type, in
    /// which case `arguments` must be empty.
    ///
    /// Calling this function repeatedly with structurally equal arguments returns the same instance
    /// each time.
    pub fn get_or_create(&self, generic: &str, arguments: &[TypeExpr]) -> Result<Arc<ConcreteType>> {
        let guard = self.state.lock();
        let resolver = Resolver::new(self);
        let arguments = arguments
            .iter()
            .map(|arg| resolver.resolve(arg, &Binding::default()))
            .collect::<Result<Vec<_>>>()?;
        let key = InstanceKey::new(generic, arguments);
        let name = self.instantiate(generic, key.arguments.clone())?;

        let state = guard.borrow();
        state
            .instances
            .get(&key)
            .and_then(|slot| slot.ty.clone())
            .context(RecursiveInstantiationSnafu { name })
    }

    /// Look up a concrete type by name.
    pub fn concrete(&self, name: &str) -> Option<Arc<ConcreteType>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state
            .instances
            .values()
            .find(|slot| slot.name == name)
            .and_then(|slot| slot.ty.clone())
    }

    /// Has an object type called `name` been created (or started)?
    pub fn is_concrete(&self, name: &str) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        matches!(state.names.get(name), Some(Owner::Instance(_)))
    }

    /// Has an interface called `name` been registered?
    pub fn is_interface(&self, name: &str) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.interfaces.contains_key(name)
    }

    /// Instantiate `generic` with resolved `arguments`, returning the name of the concrete type.
    ///
    /// If the instantiation is already complete or in progress, this just returns its name.
    pub(crate) fn instantiate(&self, generic: &str, arguments: Vec<TypeExpr>) -> Result<String> {
        let guard = self.state.lock();
        let key = InstanceKey::new(generic, arguments);
        if let Some(slot) = guard.borrow().instances.get(&key) {
            return Ok(slot.name.clone());
        }

        let desc = self.catalog.get(generic)?.clone();
        self.check_arity(&desc, &key)?;
        let name = if desc.is_generic() {
            names::synthesize(
                desc.name(),
                key.arguments
                    .iter()
                    .map(|arg| names::display_name(arg, self.naming))
                    .collect::<Result<Vec<_>>>()?,
            )
        } else {
            desc.name().to_string()
        };

        {
            let mut state = guard.borrow_mut();
            ensure!(
                state.instances.len() < self.max_instantiations,
                TooManyInstantiationsSnafu {
                    limit: self.max_instantiations,
                    key: key.to_string(),
                }
            );
            state.claim(&name, Owner::Instance(key.clone()))?;
            // Reserve the slot before resolving any fields, so that if this type refers to itself
            // we don't try to instantiate it again.
            state.instances.insert(
                key.clone(),
                Slot {
                    name: name.clone(),
                    ty: None,
                },
            );
        }

        tracing::debug!("instantiating {key} as {name}");
        let res = self.build(&desc, &key, &name);

        let mut state = guard.borrow_mut();
        match res {
            Ok(ty) => {
                if let Some(slot) = state.instances.get_mut(&key) {
                    slot.ty = Some(Arc::new(ty));
                }
                state.order.push(key);
                Ok(name)
            }
            Err(err) => {
                state.instances.remove(&key);
                state.names.remove(&name);
                Err(err)
            }
        }
    }

    fn check_arity(&self, desc: &TypeDescriptor, key: &InstanceKey) -> Result<()> {
        let expected = desc.type_parameters().len();
        let found = key.arguments.len();
        ensure!(
            desc.kind() == TypeKind::Object,
            NotAnObjectSnafu { name: desc.name() }
        );
        ensure!(
            expected > 0 || found == 0,
            NotGenericSnafu { name: desc.name() }
        );
        ensure!(
            found > 0 || expected == 0,
            MissingTypeArgumentsSnafu { name: desc.name() }
        );
        ensure!(
            expected == found,
            ArityMismatchSnafu {
                generic: desc.name(),
                expected,
                found,
            }
        );
        Ok(())
    }

    fn build(&self, desc: &TypeDescriptor, key: &InstanceKey, name: &str) -> Result<ConcreteType> {
        let binding = desc.bind(&key.arguments);
        let resolver = Resolver::new(self);
        let fields = self
            .catalog
            .effective_fields(desc)?
            .into_iter()
            .map(|field| {
                let ty = resolver.resolve(field.declared_type(), &binding)?;
                Ok(field.with_type(ty))
            })
            .collect::<Result<Vec<_>>>()?;

        let implements = self.catalog.effective_interfaces(desc)?;
        for interface in &implements {
            self.interface(interface)?;
        }

        Ok(ConcreteType {
            name: name.to_string(),
            description: desc.doc().map(String::from),
            fields,
            implements,
            origin: desc.is_generic().then(|| key.clone()),
        })
    }

    /// Register the interface called `name`, resolving its fields.
    pub(crate) fn interface(&self, name: &str) -> Result<()> {
        let guard = self.state.lock();
        if guard.borrow().interfaces.contains_key(name) {
            return Ok(());
        }

        let desc = self.catalog.get(name)?.clone();
        ensure!(
            desc.kind() == TypeKind::Interface,
            NotAnInterfaceSnafu { name }
        );
        {
            let mut state = guard.borrow_mut();
            state.claim(name, Owner::Interface(name.to_string()))?;
            state.interfaces.insert(name.to_string(), None);
        }

        tracing::debug!("registering interface {name}");
        let resolver = Resolver::new(self);
        let fields = desc
            .fields()
            .iter()
            .map(|field| Ok(field.with_type(resolver.resolve(field.declared_type(), &Binding::default())?)))
            .collect::<Result<Vec<_>>>()?;

        let mut state = guard.borrow_mut();
        state.interfaces.insert(
            name.to_string(),
            Some(Arc::new(InterfaceType {
                name: name.to_string(),
                description: desc.doc().map(String::from),
                fields,
            })),
        );
        state.interface_order.push(name.to_string());
        Ok(())
    }

    /// Register a union of the (already resolved) object types `members`.
    pub(crate) fn register_union(&self, name: &str, members: &[TypeExpr]) -> Result<()> {
        let members = members.iter().map(|member| member.to_string()).collect::<Vec<_>>();
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.names.contains_key(name) {
            return state.claim(name, Owner::Union(members));
        }

        tracing::debug!("registering union {name} of {}", members.iter().join(", "));
        state.claim(name, Owner::Union(members.clone()))?;
        state.unions.push(UnionType {
            name: name.to_string(),
            members,
        });
        Ok(())
    }

    /// Freeze the registry into a complete schema definition with the given query root.
    pub fn finish(self, query: &str) -> Result<SchemaDefinition> {
        let query = self.get_or_create(query, &[])?.name().to_string();
        let state = self.state.into_inner().into_inner();

        let mut objects = Vec::with_capacity(state.order.len());
        let mut by_name = HashMap::new();
        let mut instances = HashMap::new();
        let mut slots = state.instances;
        for key in state.order {
            // Every completed instance has a filled slot.
            if let Some(Slot { name, ty: Some(ty) }) = slots.remove(&key) {
                by_name.insert(name.clone(), objects.len());
                instances.insert(key, name);
                objects.push(ty);
            }
        }

        let mut interfaces = state.interfaces;
        let interfaces = state
            .interface_order
            .into_iter()
            .filter_map(|name| interfaces.remove(&name).flatten())
            .collect();

        tracing::info!(
            "schema definition complete: {} objects, {} unions",
            objects.len(),
            state.unions.len()
        );
        Ok(SchemaDefinition {
            catalog: self.catalog,
            naming: self.naming,
            query,
            objects,
            by_name,
            instances,
            unions: state.unions,
            interfaces,
        })
    }
}

/// A complete, frozen description of the types in a schema.
///
/// All type names are globally unique. Objects, unions and interfaces are listed in the order in
/// which they were first encountered during resolution.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SchemaDefinition {
    #[derivative(Debug = "ignore")]
    catalog: Arc<Catalog>,
    naming: NameStyle,
    query: String,
    objects: Vec<Arc<ConcreteType>>,
    by_name: HashMap<String, usize>,
    instances: HashMap<InstanceKey, String>,
    unions: Vec<UnionType>,
    interfaces: Vec<Arc<InterfaceType>>,
}

impl SchemaDefinition {
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn naming(&self) -> NameStyle {
        self.naming
    }

    /// The name of the query root type.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn objects(&self) -> &[Arc<ConcreteType>] {
        &self.objects
    }

    pub fn object(&self, name: &str) -> Option<&Arc<ConcreteType>> {
        self.by_name.get(name).map(|&i| &self.objects[i])
    }

    pub fn unions(&self) -> &[UnionType] {
        &self.unions
    }

    pub fn union(&self, name: &str) -> Option<&UnionType> {
        self.unions.iter().find(|union| union.name == name)
    }

    pub fn interfaces(&self) -> &[Arc<InterfaceType>] {
        &self.interfaces
    }

    pub fn interface(&self, name: &str) -> Option<&Arc<InterfaceType>> {
        self.interfaces.iter().find(|interface| interface.name == name)
    }

    /// The names of the object types implementing `interface`.
    pub fn implementors(&self, interface: &str) -> Vec<String> {
        self.objects
            .iter()
            .filter(|object| object.implements.iter().any(|i| i == interface))
            .map(|object| object.name.clone())
            .collect()
    }

    /// The name of the concrete type instantiated for `key`, if there is one.
    pub fn instance(&self, key: &InstanceKey) -> Option<&str> {
        self.instances.get(key).map(String::as_str)
    }

    /// Bring a type expression into the canonical form used in [`InstanceKey`]s, without creating
    /// any new types.
    ///
    /// Instantiations of generic types are replaced by the concrete types they resolved to while
    /// the schema was being built. If some instantiation was never created, or if `ty` mentions a
    /// placeholder, there is no canonical form and this returns [`None`].
    pub fn canonicalize(&self, ty: &TypeExpr) -> Option<TypeExpr> {
        Some(match ty {
            TypeExpr::Scalar(_) | TypeExpr::Object(_) => ty.clone(),
            TypeExpr::Param(_) => return None,
            TypeExpr::List(inner) => TypeExpr::list(self.canonicalize(inner)?),
            TypeExpr::Optional(inner) => TypeExpr::optional(self.canonicalize(inner)?),
            TypeExpr::Apply { generic, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|arg| self.canonicalize(arg))
                    .collect::<Option<Vec<_>>>()?;
                TypeExpr::object(self.instance(&InstanceKey::new(generic.clone(), arguments))?)
            }
            TypeExpr::Union { name, members } => {
                let members = members
                    .iter()
                    .map(|member| self.canonicalize(member))
                    .collect::<Option<Vec<_>>>()?;
                let name = match name {
                    Some(name) => name.clone(),
                    None => names::union_name(&members, self.naming).ok()?,
                };
                TypeExpr::Union {
                    name: Some(name),
                    members,
                }
            }
        })
    }
}
