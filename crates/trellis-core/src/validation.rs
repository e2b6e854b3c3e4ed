//! Path value validators.
//!
//! A [`Validator`] coerces one raw path segment into one declared type.
//! Plain `int`/`float`/`str` use dedicated parsers. UUIDs, enums and
//! constrained numerics are validated by encoding the raw string as a JSON
//! scalar literal and decoding it through a schema-aware
//! [`DeserializeSeed`], so bounds and membership are enforced by the same
//! decoder that produces the typed value.

use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, Visitor};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{error_types, Error, Result};
use crate::params::{EnumKind, EnumType, EnumValue, NumericBase, NumericConstraints, ParamType, ParamValue};

/// Why a single validator rejected a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorError {
    /// Error type identifier.
    pub error_type: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl ValidatorError {
    fn new(error_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidatorError {}

/// Coerces a raw string into one declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    /// Signed integer.
    Int,
    /// Float.
    Float,
    /// Identity.
    Str,
    /// Schema-aware scalar decode.
    Schema(ScalarSchema),
}

impl Validator {
    /// Build the validator for a declared type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoute` for the "no value" type and for enums that
    /// do not have a single primitive member type.
    pub fn new(ty: &ParamType) -> Result<Self> {
        Ok(match ty {
            ParamType::Int => Self::Int,
            ParamType::Float => Self::Float,
            ParamType::Str => Self::Str,
            ParamType::Uuid => Self::Schema(ScalarSchema::Uuid),
            ParamType::Constrained(c) => Self::Schema(ScalarSchema::Numeric(*c)),
            ParamType::Enum(e) => {
                let kind = e.kind().ok_or_else(|| {
                    Error::invalid_route(format!(
                        "enum `{}` must have members of a single primitive type",
                        e.name()
                    ))
                })?;
                Self::Schema(ScalarSchema::Enum {
                    ty: e.clone(),
                    kind,
                })
            }
            ParamType::None => {
                return Err(Error::invalid_route(
                    "the \"no value\" type has no validator",
                ))
            }
        })
    }

    /// Validate one raw value.
    ///
    /// # Errors
    ///
    /// Returns the validator's diagnostic when `raw` is not acceptable.
    pub fn validate(&self, raw: &str) -> std::result::Result<ParamValue, ValidatorError> {
        match self {
            Self::Int => parse_int(raw).map(ParamValue::Int),
            Self::Float => parse_float(raw).map(ParamValue::Float),
            Self::Str => Ok(ParamValue::Str(raw.to_owned())),
            Self::Schema(schema) => schema.decode(raw),
        }
    }
}

fn parse_int(raw: &str) -> std::result::Result<i64, ValidatorError> {
    raw.parse::<i64>()
        .map_err(|_| ValidatorError::new(error_types::INT_PARSING, "A valid integer is required."))
}

fn parse_float(raw: &str) -> std::result::Result<f64, ValidatorError> {
    raw.parse::<f64>()
        .map_err(|_| ValidatorError::new(error_types::FLOAT_PARSING, "A valid number is required."))
}

/// A scalar schema decoded from a JSON literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarSchema {
    /// RFC 4122 UUID string.
    Uuid,
    /// Enum member, with its member primitive resolved.
    Enum {
        /// The enum declaration.
        ty: EnumType,
        /// Primitive every member shares.
        kind: EnumKind,
    },
    /// Bounded number.
    Numeric(NumericConstraints),
}

impl ScalarSchema {
    fn requires_quotes(&self) -> bool {
        match self {
            Self::Uuid => true,
            Self::Enum { kind, .. } => *kind == EnumKind::Str,
            Self::Numeric(_) => false,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Self::Uuid => error_types::UUID_PARSING,
            Self::Enum { .. } => error_types::ENUM,
            Self::Numeric(_) => error_types::CONSTRAINT,
        }
    }

    fn expected(&self) -> &str {
        match self {
            Self::Uuid => "uuid",
            Self::Enum { ty, .. } => ty.name(),
            Self::Numeric(c) => c.base.as_str(),
        }
    }

    /// Encode `raw` as a literal and decode it against this schema.
    fn decode(&self, raw: &str) -> std::result::Result<ParamValue, ValidatorError> {
        let literal = match self {
            // Enum values are coerced through their member primitive first.
            Self::Enum {
                kind: EnumKind::Int,
                ..
            } => parse_int(raw)?.to_string(),
            _ if self.requires_quotes() => serde_json::Value::from(raw).to_string(),
            _ => raw.to_owned(),
        };

        let mut deserializer = serde_json::Deserializer::from_str(&literal);
        let decoded = self
            .deserialize(&mut deserializer)
            .and_then(|value| deserializer.end().map(|()| value));

        decoded.map_err(|e| {
            let message = if e.is_syntax() || e.is_eof() {
                format!("Expected `{}`, got `{raw}`", self.expected())
            } else {
                strip_position(&e.to_string()).to_owned()
            };
            ValidatorError::new(self.error_type(), message)
        })
    }
}

/// serde_json appends " at line L column C" to data errors.
fn strip_position(message: &str) -> &str {
    message
        .rsplit_once(" at line ")
        .map_or(message, |(head, _)| head)
}

impl<'de> DeserializeSeed<'de> for &ScalarSchema {
    type Value = ParamValue;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<ParamValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        match self {
            ScalarSchema::Uuid => Uuid::deserialize(deserializer)
                .map(ParamValue::Uuid)
                .map_err(|_| de::Error::custom("Invalid UUID")),
            ScalarSchema::Enum { ty, .. } => deserializer.deserialize_any(EnumVisitor(ty)),
            ScalarSchema::Numeric(c) => deserializer.deserialize_any(NumericVisitor(c)),
        }
    }
}

struct EnumVisitor<'a>(&'a EnumType);

impl EnumVisitor<'_> {
    fn lookup<E: de::Error>(&self, value: EnumValue) -> std::result::Result<ParamValue, E> {
        match self.0.member_for(&value) {
            Some(member) => Ok(ParamValue::Enum {
                member: member.to_owned(),
                value,
            }),
            None => Err(E::custom(match &value {
                EnumValue::Str(s) => format!("Invalid enum value '{s}'"),
                EnumValue::Int(i) => format!("Invalid enum value {i}"),
            })),
        }
    }
}

impl<'de> Visitor<'de> for EnumVisitor<'_> {
    type Value = ParamValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a member of `{}`", self.0.name())
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<ParamValue, E> {
        self.lookup(EnumValue::Str(v.to_owned()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<ParamValue, E> {
        self.lookup(EnumValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<ParamValue, E> {
        let v = i64::try_from(v).map_err(|_| E::custom("Integer value out of range"))?;
        self.lookup(EnumValue::Int(v))
    }
}

struct NumericVisitor<'a>(&'a NumericConstraints);

impl NumericVisitor<'_> {
    fn check<E: de::Error>(&self, v: f64) -> std::result::Result<(), E> {
        let c = self.0;
        let t = c.base.as_str();
        if let Some(b) = c.ge.filter(|b| v < *b) {
            return Err(E::custom(format!("Expected `{t}` >= {}", fmt_bound(b))));
        }
        if let Some(b) = c.gt.filter(|b| v <= *b) {
            return Err(E::custom(format!("Expected `{t}` > {}", fmt_bound(b))));
        }
        if let Some(b) = c.le.filter(|b| v > *b) {
            return Err(E::custom(format!("Expected `{t}` <= {}", fmt_bound(b))));
        }
        if let Some(b) = c.lt.filter(|b| v >= *b) {
            return Err(E::custom(format!("Expected `{t}` < {}", fmt_bound(b))));
        }
        if let Some(m) = c.multiple_of.filter(|m| *m != 0.0 && (v / *m).fract() != 0.0) {
            return Err(E::custom(format!(
                "Expected `{t}` that's a multiple of {}",
                fmt_bound(m)
            )));
        }
        Ok(())
    }
}

fn fmt_bound(b: f64) -> String {
    if b.fract() == 0.0 && b.abs() < 1e15 {
        format!("{}", b as i64)
    } else {
        b.to_string()
    }
}

impl<'de> Visitor<'de> for NumericVisitor<'_> {
    type Value = ParamValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.0.base.as_str())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<ParamValue, E> {
        self.check(v as f64)?;
        Ok(match self.0.base {
            NumericBase::Int => ParamValue::Int(v),
            NumericBase::Float => ParamValue::Float(v as f64),
        })
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<ParamValue, E> {
        match i64::try_from(v) {
            Ok(v) => self.visit_i64(v),
            Err(_) if self.0.base == NumericBase::Float => self.visit_f64(v as f64),
            Err(_) => Err(E::custom("Integer value out of range")),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<ParamValue, E> {
        if self.0.base == NumericBase::Int {
            return Err(E::custom("Expected `int`, got `float`"));
        }
        self.check(v)?;
        Ok(ParamValue::Float(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(ty: ParamType) -> Validator {
        Validator::new(&ty).unwrap()
    }

    #[test]
    fn int_validator() {
        let v = validator(ParamType::Int);
        assert_eq!(v.validate("42"), Ok(ParamValue::Int(42)));
        assert_eq!(v.validate("-7"), Ok(ParamValue::Int(-7)));
        let err = v.validate("x").unwrap_err();
        assert_eq!(err.message, "A valid integer is required.");
        assert_eq!(err.error_type, error_types::INT_PARSING);
    }

    #[test]
    fn float_validator() {
        let v = validator(ParamType::Float);
        assert_eq!(v.validate("2.5"), Ok(ParamValue::Float(2.5)));
        assert_eq!(
            v.validate("nope").unwrap_err().message,
            "A valid number is required."
        );
    }

    #[test]
    fn str_validator_accepts_anything() {
        let v = validator(ParamType::Str);
        assert_eq!(v.validate("hello"), Ok(ParamValue::Str("hello".to_owned())));
    }

    #[test]
    fn uuid_validator() {
        let v = validator(ParamType::Uuid);
        let id = "550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(
            v.validate(id),
            Ok(ParamValue::Uuid(Uuid::parse_str(id).unwrap()))
        );
        let err = v.validate("not-a-uuid").unwrap_err();
        assert_eq!(err.error_type, error_types::UUID_PARSING);
        assert_eq!(err.message, "Invalid UUID");
    }

    #[test]
    fn uuid_literal_is_escaped() {
        let v = validator(ParamType::Uuid);
        assert!(v.validate("\"}").is_err());
    }

    #[test]
    fn string_enum_membership() {
        let colors = EnumType::strings("Color", [("Red", "red"), ("Green", "green")]);
        let v = validator(ParamType::Enum(colors));

        let ok = v.validate("green").unwrap();
        assert_eq!(ok.as_enum_member(), Some("Green"));

        let err = v.validate("blue").unwrap_err();
        assert_eq!(err.error_type, error_types::ENUM);
        assert_eq!(err.message, "Invalid enum value 'blue'");
    }

    #[test]
    fn int_enum_coerces_through_int() {
        let levels = EnumType::ints("Level", [("Low", 1), ("High", 10)]);
        let v = validator(ParamType::Enum(levels));

        assert_eq!(v.validate("10").unwrap().as_enum_member(), Some("High"));
        assert_eq!(
            v.validate("high").unwrap_err().message,
            "A valid integer is required."
        );
        assert_eq!(v.validate("3").unwrap_err().message, "Invalid enum value 3");
    }

    #[test]
    fn mixed_enum_is_rejected_at_build_time() {
        let mixed = EnumType::new(
            "Mixed",
            [
                ("A", EnumValue::Int(1)),
                ("B", EnumValue::Str("b".to_owned())),
            ],
        );
        let err = Validator::new(&ParamType::Enum(mixed)).unwrap_err();
        assert!(err.is_registration_error());
    }

    #[test]
    fn constrained_int_bounds() {
        let v = validator(ParamType::Constrained(
            NumericConstraints::int().ge(1.0).le(100.0),
        ));
        assert_eq!(v.validate("50"), Ok(ParamValue::Int(50)));
        assert_eq!(v.validate("0").unwrap_err().message, "Expected `int` >= 1");
        assert_eq!(
            v.validate("101").unwrap_err().message,
            "Expected `int` <= 100"
        );
        assert_eq!(
            v.validate("1.5").unwrap_err().message,
            "Expected `int`, got `float`"
        );
        assert_eq!(
            v.validate("abc").unwrap_err().message,
            "Expected `int`, got `abc`"
        );
    }

    #[test]
    fn constrained_float_exclusive_bounds_and_multiple() {
        let v = validator(ParamType::Constrained(
            NumericConstraints::float().gt(0.0).lt(1.0),
        ));
        assert_eq!(v.validate("0.5"), Ok(ParamValue::Float(0.5)));
        assert_eq!(v.validate("0").unwrap_err().message, "Expected `float` > 0");
        assert_eq!(v.validate("1").unwrap_err().message, "Expected `float` < 1");

        let even = validator(ParamType::Constrained(NumericConstraints::int().multiple_of(2.0)));
        assert!(even.validate("4").is_ok());
        assert_eq!(
            even.validate("5").unwrap_err().message,
            "Expected `int` that's a multiple of 2"
        );
    }

    #[test]
    fn none_type_has_no_validator() {
        assert!(Validator::new(&ParamType::None).is_err());
    }
}
