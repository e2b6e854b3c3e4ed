//! Declared parameter schemas.
//!
//! Handlers describe their path parameters up front with a [`Signature`]:
//! an ordered list of [`ParamDecl`]s, each naming a union of
//! [`ParamType`]s. The router turns a signature into
//! [`Converter`](crate::Converter)s once, at registration time; nothing is
//! inspected while requests are served.
//!
//! # Example
//!
//! ```
//! use trellis_core::params::{EnumType, ParamDecl, ParamType, Signature};
//!
//! let color = EnumType::strings("Color", [("Red", "red"), ("Green", "green")]);
//! let signature = Signature::new()
//!     .param(ParamDecl::new("id", ParamType::Int))
//!     .param(ParamDecl::new("color", ParamType::Enum(color)).optional());
//!
//! assert_eq!(signature.len(), 2);
//! assert!(signature.params()[1].is_optional());
//! ```

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// The underlying primitive of an enum's member values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    /// Members carry integer values.
    Int,
    /// Members carry string values.
    Str,
}

/// A member value of a declared enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EnumValue {
    /// Integer-valued member.
    Int(i64),
    /// String-valued member.
    Str(String),
}

impl EnumValue {
    fn kind(&self) -> EnumKind {
        match self {
            Self::Int(_) => EnumKind::Int,
            Self::Str(_) => EnumKind::Str,
        }
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// A declared enumeration: named members with primitive values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    name: String,
    members: Vec<(String, EnumValue)>,
}

impl EnumType {
    /// Declare an enum from `(member name, value)` pairs.
    #[must_use]
    pub fn new<N, I>(name: impl Into<String>, members: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, EnumValue)>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }
    }

    /// Declare a string-valued enum.
    #[must_use]
    pub fn strings<'a>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self::new(
            name,
            members
                .into_iter()
                .map(|(n, v)| (n, EnumValue::Str(v.to_owned()))),
        )
    }

    /// Declare an integer-valued enum.
    #[must_use]
    pub fn ints<'a>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (&'a str, i64)>,
    ) -> Self {
        Self::new(
            name,
            members.into_iter().map(|(n, v)| (n, EnumValue::Int(v))),
        )
    }

    /// The enum's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared members in order.
    #[must_use]
    pub fn members(&self) -> &[(String, EnumValue)] {
        &self.members
    }

    /// The primitive every member shares.
    ///
    /// Returns `None` for an empty enum or one mixing ints and strings;
    /// such enums cannot be validated from a path segment.
    #[must_use]
    pub fn kind(&self) -> Option<EnumKind> {
        let first = self.members.first()?.1.kind();
        self.members
            .iter()
            .all(|(_, v)| v.kind() == first)
            .then_some(first)
    }

    /// Find the member carrying `value`.
    #[must_use]
    pub fn member_for(&self, value: &EnumValue) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| v == value)
            .map(|(n, _)| n.as_str())
    }
}

/// Base type of a constrained numeric parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericBase {
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
}

impl NumericBase {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
        }
    }
}

/// An annotated numeric type with bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericConstraints {
    /// Underlying numeric type.
    pub base: NumericBase,
    /// Inclusive lower bound.
    pub ge: Option<f64>,
    /// Exclusive lower bound.
    pub gt: Option<f64>,
    /// Inclusive upper bound.
    pub le: Option<f64>,
    /// Exclusive upper bound.
    pub lt: Option<f64>,
    /// Value must be a multiple of this.
    pub multiple_of: Option<f64>,
}

impl NumericConstraints {
    /// Unconstrained integer.
    #[must_use]
    pub fn int() -> Self {
        Self::unbounded(NumericBase::Int)
    }

    /// Unconstrained float.
    #[must_use]
    pub fn float() -> Self {
        Self::unbounded(NumericBase::Float)
    }

    fn unbounded(base: NumericBase) -> Self {
        Self {
            base,
            ge: None,
            gt: None,
            le: None,
            lt: None,
            multiple_of: None,
        }
    }

    /// Require `value >= bound`.
    #[must_use]
    pub fn ge(mut self, bound: f64) -> Self {
        self.ge = Some(bound);
        self
    }

    /// Require `value > bound`.
    #[must_use]
    pub fn gt(mut self, bound: f64) -> Self {
        self.gt = Some(bound);
        self
    }

    /// Require `value <= bound`.
    #[must_use]
    pub fn le(mut self, bound: f64) -> Self {
        self.le = Some(bound);
        self
    }

    /// Require `value < bound`.
    #[must_use]
    pub fn lt(mut self, bound: f64) -> Self {
        self.lt = Some(bound);
        self
    }

    /// Require the value to be a multiple of `factor`.
    #[must_use]
    pub fn multiple_of(mut self, factor: f64) -> Self {
        self.multiple_of = Some(factor);
        self
    }
}

/// A declared parameter type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    /// Signed integer.
    Int,
    /// Float.
    Float,
    /// Any string.
    Str,
    /// RFC 4122 UUID.
    Uuid,
    /// Member of a declared enum.
    Enum(EnumType),
    /// Integer or float with bounds.
    Constrained(NumericConstraints),
    /// The "no value" variant of an optional union.
    None,
}

impl ParamType {
    /// Short name used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Int => "int".to_owned(),
            Self::Float => "float".to_owned(),
            Self::Str => "str".to_owned(),
            Self::Uuid => "uuid".to_owned(),
            Self::Enum(e) => e.name().to_owned(),
            Self::Constrained(c) => format!("constrained {}", c.base.as_str()),
            Self::None => "none".to_owned(),
        }
    }
}

/// One declared handler parameter: a name and a union of types.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    name: String,
    types: Vec<ParamType>,
}

impl ParamDecl {
    /// Declare a parameter with a single type.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            types: vec![ty],
        }
    }

    /// Declare a parameter whose value may be any of `types`, tried in order.
    #[must_use]
    pub fn union(name: impl Into<String>, types: impl IntoIterator<Item = ParamType>) -> Self {
        Self {
            name: name.into(),
            types: types.into_iter().collect(),
        }
    }

    /// Add the "no value" variant to the union.
    #[must_use]
    pub fn optional(mut self) -> Self {
        if !self.is_optional() {
            self.types.push(ParamType::None);
        }
        self
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared union, in declaration order.
    #[must_use]
    pub fn types(&self) -> &[ParamType] {
        &self.types
    }

    /// Returns true if the union includes the "no value" variant.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.types.contains(&ParamType::None)
    }
}

/// The ordered parameter list a handler declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<ParamDecl>,
}

impl Signature {
    /// An empty signature.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    #[must_use]
    pub fn param(mut self, decl: ParamDecl) -> Self {
        self.params.push(decl);
        self
    }

    /// Declared parameters in order.
    #[must_use]
    pub fn params(&self) -> &[ParamDecl] {
        &self.params
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if the handler takes no path parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl FromIterator<ParamDecl> for Signature {
    fn from_iter<I: IntoIterator<Item = ParamDecl>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

/// Something that can be mounted on a router.
///
/// Invocation belongs to the dispatcher; the router only needs the
/// declared parameter signature.
pub trait Handler: Send + Sync {
    /// The parameters this handler expects from the path.
    fn signature(&self) -> Signature;
}

impl<H: Handler + ?Sized> Handler for std::sync::Arc<H> {
    fn signature(&self) -> Signature {
        (**self).signature()
    }
}

/// A handler value paired with an explicit signature.
///
/// Lets plain functions and closures be registered without a dedicated
/// `Handler` impl.
#[derive(Clone)]
pub struct Declared<F> {
    func: F,
    signature: Signature,
}

impl<F> Declared<F> {
    /// Pair `func` with `signature`.
    pub fn new(func: F, signature: Signature) -> Self {
        Self { func, signature }
    }

    /// The wrapped handler.
    pub fn func(&self) -> &F {
        &self.func
    }
}

impl<F> fmt::Debug for Declared<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declared")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl<F: Send + Sync> Handler for Declared<F> {
    fn signature(&self) -> Signature {
        self.signature.clone()
    }
}

/// A converted, typed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Absent optional value.
    Null,
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    Str(String),
    /// UUID.
    Uuid(Uuid),
    /// Enum member.
    Enum {
        /// Member name.
        member: String,
        /// Member value.
        value: EnumValue,
    },
}

impl ParamValue {
    /// Returns true for an absent optional value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The integer value, if this is an int.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The float value, accepting ints as well.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The string value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The UUID, if this is a UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// The enum member name, if this is an enum value.
    #[must_use]
    pub fn as_enum_member(&self) -> Option<&str> {
        match self {
            Self::Enum { member, .. } => Some(member),
            _ => None,
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Uuid(u) => u.serialize(serializer),
            Self::Enum { value, .. } => value.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_is_idempotent() {
        let decl = ParamDecl::new("id", ParamType::Int).optional().optional();
        assert_eq!(decl.types(), &[ParamType::Int, ParamType::None]);
        assert!(decl.is_optional());
    }

    #[test]
    fn enum_kind_requires_uniform_members() {
        let uniform = EnumType::ints("Level", [("Low", 1), ("High", 2)]);
        assert_eq!(uniform.kind(), Some(EnumKind::Int));

        let mixed = EnumType::new(
            "Mixed",
            [
                ("A", EnumValue::Int(1)),
                ("B", EnumValue::Str("b".to_owned())),
            ],
        );
        assert_eq!(mixed.kind(), None);

        let empty = EnumType::new("Empty", Vec::<(String, EnumValue)>::new());
        assert_eq!(empty.kind(), None);
    }

    #[test]
    fn declared_reports_its_signature() {
        let handler = Declared::new(
            || "ok",
            Signature::new().param(ParamDecl::new("slug", ParamType::Str)),
        );
        assert_eq!(handler.signature().params()[0].name(), "slug");
        assert_eq!((handler.func())(), "ok");
    }

    #[test]
    fn param_value_serializes_untagged() {
        let value = ParamValue::Enum {
            member: "Red".to_owned(),
            value: EnumValue::Str("red".to_owned()),
        };
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"red\"");
        assert_eq!(serde_json::to_string(&ParamValue::Null).unwrap(), "null");
    }
}
