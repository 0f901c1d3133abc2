//! Runtime values served through a generic schema.
//!
//! Field resolvers do not run user code. Instead, each object is represented at runtime by an
//! [`Instance`]: the name of the type it was constructed as, plus the [`Data`] for each of its
//! fields. An instance of a generic type is normally constructed under the generic name
//! (`Instance::new("Edge")`), just as a value of a generic class is constructed without mentioning
//! its type arguments. When such a value needs to be resolved to a concrete type (because it is
//! returned from a field whose type is a union or an interface) the type arguments are either taken
//! from the instance itself, if they were given explicitly with [`Instance::of`], or inferred from
//! its field data by the [classifier](super::classify).

use super::type_system::TypeExpr;
use derive_more::From;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// The value of a single field.
#[derive(Clone, Debug, Default, PartialEq, From)]
pub enum Data {
    #[default]
    #[from(ignore)]
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    #[from(ignore)]
    Id(String),
    List(Vec<Data>),
    Object(Instance),
}

impl Data {
    /// An `ID` value.
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// A short description of the kind of value this is, for error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "null".into(),
            Self::Boolean(_) => "Boolean".into(),
            Self::Int(_) => "Int".into(),
            Self::Float(_) => "Float".into(),
            Self::String(_) => "String".into(),
            Self::Id(_) => "ID".into(),
            Self::List(items) => format!(
                "[{}]",
                items.iter().map(Data::describe).unique().join(", ")
            ),
            Self::Object(instance) => instance.to_string(),
        }
    }
}

impl From<i32> for Data {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl<T: Into<Data>> From<Option<T>> for Data {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or_default()
    }
}

impl<T: Into<Data>> FromIterator<T> for Data {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::List(iter.into_iter().map(Into::into).collect())
    }
}

/// An object value.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    type_name: String,
    arguments: Option<Vec<TypeExpr>>,
    fields: BTreeMap<String, Data>,
}

impl Instance {
    /// An instance of the type named `type_name`, with no fields set.
    ///
    /// `type_name` may be the name of a non-generic type, of a generic type, or of a concrete type
    /// synthesized from a generic one (like `IntEdge`).
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            arguments: None,
            fields: Default::default(),
        }
    }

    /// An instance of the generic type `generic` with explicit type arguments.
    pub fn of(generic: impl Into<String>, arguments: impl IntoIterator<Item = TypeExpr>) -> Self {
        Self {
            arguments: Some(arguments.into_iter().collect()),
            ..Self::new(generic)
        }
    }

    /// Set the value of `field`.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Data>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Data>) {
        self.fields.insert(field.into(), value.into());
    }

    /// The value of `field`.
    ///
    /// Fields which were never set are null.
    pub fn get(&self, field: &str) -> &Data {
        static NULL: Data = Data::Null;
        self.fields.get(field).unwrap_or(&NULL)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The explicit type arguments of this instance, if there are any.
    pub fn arguments(&self) -> Option<&[TypeExpr]> {
        self.arguments.as_deref()
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.arguments {
            Some(arguments) => write!(f, "{}[{}]", self.type_name, arguments.iter().format(", ")),
            None => write!(f, "{}", self.type_name),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_missing_field_is_null() {
        let edge = Instance::new("Edge").with("cursor", Data::id("1"));
        assert_eq!(edge.get("cursor"), &Data::Id("1".into()));
        assert!(edge.get("node").is_null());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Data::from(1), Data::Int(1));
        assert_eq!(Data::from("a"), Data::String("a".into()));
        assert_eq!(Data::from(None::<i64>), Data::Null);
        assert_eq!(Data::from(Some(true)), Data::Boolean(true));
        assert_eq!(
            [1, 2].into_iter().collect::<Data>(),
            Data::List(vec![Data::Int(1), Data::Int(2)])
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            Data::List(vec![1.into(), "a".into(), 2.into()]).describe(),
            "[Int, String]"
        );
        assert_eq!(
            Data::from(Instance::of("Edge", [TypeExpr::INT])).describe(),
            "Edge[Int]"
        );
    }
}
