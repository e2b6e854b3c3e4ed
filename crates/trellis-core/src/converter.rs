//! Path parameter conversion.
//!
//! A [`Converter`] is built once per declared parameter when an endpoint is
//! registered. At request time it turns the raw captured segment (or its
//! absence) into a typed [`ParamValue`].

use serde::Serialize;

use crate::error::{loc, Error, Result, ValidationError};
use crate::params::{ParamDecl, ParamType, ParamValue, Signature};
use crate::validation::{Validator, ValidatorError};

/// Converts one raw path value into a typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Converter {
    name: String,
    optional: bool,
    types: Vec<ParamType>,
    validators: Vec<Validator>,
}

impl Converter {
    /// Build a converter from a parameter declaration.
    ///
    /// `None` in the union marks the parameter optional; every other type
    /// becomes one validator, tried in declaration order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoute` when the declaration has no concrete type or
    /// names an enum that cannot be validated.
    pub fn from_decl(decl: &ParamDecl) -> Result<Self> {
        let types: Vec<ParamType> = decl
            .types()
            .iter()
            .filter(|t| **t != ParamType::None)
            .cloned()
            .collect();

        if types.is_empty() {
            return Err(Error::invalid_route(format!(
                "parameter '{}' declares no concrete type",
                decl.name()
            )));
        }

        let validators = types.iter().map(Validator::new).collect::<Result<_>>()?;

        Ok(Self {
            name: decl.name().to_owned(),
            optional: decl.is_optional(),
            types,
            validators,
        })
    }

    /// Build one converter per parameter in `signature`.
    ///
    /// # Errors
    ///
    /// Fails on the first declaration [`Converter::from_decl`] rejects.
    pub fn from_signature(signature: &Signature) -> Result<Vec<Self>> {
        signature.params().iter().map(Self::from_decl).collect()
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether an absent value is acceptable.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// The candidate types, without the "no value" variant.
    #[must_use]
    pub fn types(&self) -> &[ParamType] {
        &self.types
    }

    /// Convert a raw value.
    ///
    /// # Errors
    ///
    /// * `NotFound` if a required value is absent.
    /// * `Validation` if every validator rejects the value; the error
    ///   carries the last validator's message.
    pub fn apply(&self, raw: Option<&str>) -> Result<ParamValue> {
        let Some(raw) = raw else {
            if self.optional {
                return Ok(ParamValue::Null);
            }
            return Err(Error::not_found(format!(
                "missing path parameter '{}'",
                self.name
            )));
        };

        let mut last: Option<ValidatorError> = None;
        for validator in &self.validators {
            match validator.validate(raw) {
                Ok(value) => return Ok(value),
                Err(e) => last = Some(e),
            }
        }

        // from_decl guarantees at least one validator ran.
        let last = last.unwrap_or_else(|| ValidatorError {
            error_type: crate::error::error_types::VALUE_ERROR,
            message: "no validator accepted the value".to_owned(),
        });
        tracing::trace!(param = %self.name, raw, reason = %last, "path parameter rejected");
        Err(ValidationError::new(last.error_type, loc::path(&self.name), last.message)
            .with_input(raw)
            .into())
    }
}

/// Typed path parameters, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathParams {
    values: Vec<(String, ParamValue)>,
}

impl Serialize for PathParams {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.values.iter().map(|(k, v)| (k, v)))
    }
}

impl PathParams {
    /// Empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a converted value.
    pub fn push(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.push((name.into(), value));
    }

    /// Look up a value by parameter name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterate `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Run every converter against its raw value.
///
/// `lookup` returns the raw captured value for a parameter name, or `None`
/// when the path did not supply one.
///
/// # Errors
///
/// Returns the first converter failure.
pub fn convert_all<'a, F>(converters: &[Converter], mut lookup: F) -> Result<PathParams>
where
    F: FnMut(&str) -> Option<&'a str>,
{
    let mut params = PathParams::new();
    for converter in converters {
        let value = converter.apply(lookup(converter.name()))?;
        params.push(converter.name(), value);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{EnumType, NumericConstraints};

    fn converter(decl: ParamDecl) -> Converter {
        Converter::from_decl(&decl).unwrap()
    }

    #[test]
    fn int_converts_digits() {
        let c = converter(ParamDecl::new("id", ParamType::Int));
        assert_eq!(c.apply(Some("42")).unwrap(), ParamValue::Int(42));
    }

    #[test]
    fn int_rejection_names_the_field() {
        let c = converter(ParamDecl::new("id", ParamType::Int));
        match c.apply(Some("x")).unwrap_err() {
            Error::Validation(e) => {
                assert_eq!(e.field(), Some("id"));
                assert_eq!(e.msg, "A valid integer is required.");
                assert_eq!(e.input, Some(serde_json::json!("x")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn optional_absent_is_null() {
        let c = converter(ParamDecl::new("page", ParamType::Int).optional());
        assert!(c.is_optional());
        assert_eq!(c.apply(None).unwrap(), ParamValue::Null);
    }

    #[test]
    fn required_absent_is_not_found() {
        let c = converter(ParamDecl::new("id", ParamType::Int));
        let err = c.apply(None).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn enum_rejects_non_member() {
        let colors = EnumType::strings("Color", [("Red", "red"), ("Green", "green")]);
        let c = converter(ParamDecl::new("color", ParamType::Enum(colors)));
        let err = c.apply(Some("blue")).unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert_eq!(
            err.to_string(),
            "validation error for 'color': Invalid enum value 'blue'"
        );
    }

    #[test]
    fn union_first_success_wins() {
        let c = converter(ParamDecl::union("key", [ParamType::Int, ParamType::Str]));
        assert_eq!(c.apply(Some("7")).unwrap(), ParamValue::Int(7));
        assert_eq!(
            c.apply(Some("seven")).unwrap(),
            ParamValue::Str("seven".to_owned())
        );
    }

    #[test]
    fn union_reports_last_validator_message() {
        let c = converter(ParamDecl::union(
            "n",
            [
                ParamType::Constrained(NumericConstraints::int().ge(10.0)),
                ParamType::Float,
            ],
        ));
        match c.apply(Some("abc")).unwrap_err() {
            Error::Validation(e) => assert_eq!(e.msg, "A valid number is required."),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn bare_none_is_rejected() {
        let err = Converter::from_decl(&ParamDecl::new("x", ParamType::None)).unwrap_err();
        assert!(err.is_registration_error());
    }

    #[test]
    fn convert_all_preserves_declaration_order() {
        let converters = Converter::from_signature(
            &Signature::new()
                .param(ParamDecl::new("a", ParamType::Int))
                .param(ParamDecl::new("b", ParamType::Str).optional()),
        )
        .unwrap();

        let params = convert_all(&converters, |name| (name == "a").then_some("1")).unwrap();
        let names: Vec<_> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(params.get("b"), Some(&ParamValue::Null));
        assert_eq!(
            serde_json::to_string(&params).unwrap(),
            r#"{"a":1,"b":null}"#
        );
    }
}
