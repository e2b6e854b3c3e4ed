//! Core types for trellis.
//!
//! This crate provides:
//!
//! - The error taxonomy ([`Error`], [`ValidationError`])
//! - Declared parameter schemas ([`params`])
//! - Path value validators and converters
//! - Logging setup

#![forbid(unsafe_code)]

pub mod converter;
pub mod error;
pub mod logging;
pub mod params;
pub mod validation;

pub use converter::{convert_all, Converter, PathParams};
pub use error::{loc, Error, LocItem, Result, ValidationError};
pub use logging::{LogConfig, LogLevel};
pub use params::{
    Declared, EnumKind, EnumType, EnumValue, Handler, NumericBase, NumericConstraints, ParamDecl,
    ParamType, ParamValue, Signature,
};
pub use trellis_types::Method;
pub use validation::{ScalarSchema, Validator, ValidatorError};
