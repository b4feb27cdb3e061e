//! Placeholder types of route patterns and the values they convert to.
//!
//! | type              | matches                                  | weight |
//! |-------------------|------------------------------------------|--------|
//! | `int`, `integer`  | `[+-]?[1-9][0-9]*`                       | 8      |
//! | `decimal`         | decimal or `e` notation, `.1` allowed    | 9      |
//! | `float`           | same as `decimal`                        | 10     |
//! | `uuid`            | hyphenated hex UUID                      | 7      |
//! | `str`, `string`   | anything, lazily                         | 7      |
//! | anything else     | the text itself, as a regex              | 20     |
//! | no type           | anything, lazily                         | 1      |

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::RouteError;

const INT_PATTERN: &str = r"[+-]?[1-9][0-9]*";
const NUMBER_PATTERN: &str = r"[+-]?(?:0\.\d|\.\d|[1-9])\d*(?:e\d+)?";
const UUID_PATTERN: &str = r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-8][0-9a-fA-F]{3}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";
const ANY_PATTERN: &str = r".*?";

static BUILTIN_TYPES: Lazy<HashMap<&'static str, ParamType>> = Lazy::new(|| {
    HashMap::from([
        ("int", ParamType::Int),
        ("integer", ParamType::Int),
        ("float", ParamType::Float),
        ("decimal", ParamType::Decimal),
        ("uuid", ParamType::Uuid),
        ("str", ParamType::Str),
        ("string", ParamType::Str),
    ])
});

/// The kind of a route placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Int,
    Float,
    Decimal,
    Uuid,
    Str,
    /// A user supplied regex fragment, the captured text is kept as a string
    Custom(String),
    /// `{name}` without a type
    Untyped,
}

impl ParamType {
    /// Resolves the type written after `:` in a placeholder.
    ///
    /// `None` is the untyped catch-all, an unknown name is a custom regex.
    pub fn parse(type_name: Option<&str>) -> Self {
        match type_name {
            None => ParamType::Untyped,
            Some(name) => BUILTIN_TYPES.get(name).cloned().unwrap_or_else(|| ParamType::Custom(name.to_string())),
        }
    }

    /// The regex fragment a value must fully match
    pub fn fragment(&self) -> &str {
        match self {
            ParamType::Int => INT_PATTERN,
            ParamType::Float | ParamType::Decimal => NUMBER_PATTERN,
            ParamType::Uuid => UUID_PATTERN,
            ParamType::Str | ParamType::Untyped => ANY_PATTERN,
            ParamType::Custom(pattern) => pattern,
        }
    }

    /// The weight this placeholder adds to its route's specificity score
    pub fn weight(&self) -> u32 {
        match self {
            ParamType::Int => 8,
            ParamType::Decimal => 9,
            ParamType::Float => 10,
            ParamType::Uuid | ParamType::Str => 7,
            ParamType::Custom(_) => 20,
            ParamType::Untyped => 1,
        }
    }

    /// Converts a value the fragment already matched.
    pub fn convert(&self, name: &str, value: &str) -> Result<ParamValue, RouteError> {
        let conversion_error = |reason: String| RouteError::param_conversion(name, value, reason);

        match self {
            ParamType::Int => value.parse::<i64>().map(ParamValue::Int).map_err(|e| conversion_error(e.to_string())),
            ParamType::Float => value.parse::<f64>().map(ParamValue::Float).map_err(|e| conversion_error(e.to_string())),
            ParamType::Decimal => parse_decimal(value).map(ParamValue::Decimal).map_err(|e| conversion_error(e.to_string())),
            ParamType::Uuid => Uuid::parse_str(value).map(ParamValue::Uuid).map_err(|e| conversion_error(e.to_string())),
            ParamType::Str | ParamType::Custom(_) | ParamType::Untyped => Ok(ParamValue::Str(value.to_string())),
        }
    }
}

fn parse_decimal(value: &str) -> Result<Decimal, rust_decimal::Error> {
    if value.contains(['e', 'E']) {
        return Decimal::from_scientific(&with_leading_zero(value));
    }
    Decimal::from_str(&with_leading_zero(value))
}

/// `.5` -> `0.5`, `-.5` -> `-0.5`
fn with_leading_zero(value: &str) -> String {
    let (sign, digits) = match value.strip_prefix(['+', '-']) {
        Some(digits) => (&value[..1], digits),
        None => ("", value),
    };

    if digits.starts_with('.') { format!("{sign}0{digits}") } else { value.to_string() }
}

/// A converted path parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Uuid(Uuid),
    Str(String),
}

impl ParamValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(value) => Some(*value),
            ParamValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            ParamValue::Decimal(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            ParamValue::Uuid(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(value) => fmt::Display::fmt(value, f),
            ParamValue::Float(value) => fmt::Display::fmt(value, f),
            ParamValue::Decimal(value) => fmt::Display::fmt(value, f),
            ParamValue::Uuid(value) => fmt::Display::fmt(value, f),
            ParamValue::Str(value) => fmt::Display::fmt(value, f),
        }
    }
}
