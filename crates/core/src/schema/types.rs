//! The PropType grammar.
//!
//! A PropType is a scalar type name with at most one modifier:
//!
//! - `T` a single value
//! - `T?` an optional single value
//! - `T[]` an ordered sequence of `T`
//! - `T<>` a set of unique `T`
//!
//! Arrays and sets cannot be optional, so `int[]?` is rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OdmError;

/// Scalar alphabet of the PropType grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// `true` or `false`.
    Bool,
    /// Stored as an integer, anything after the decimal point is truncated.
    Int,
    /// Stored as a 64 bit float, which may lose precision.
    Double,
    /// Stored as exact decimal text, no loss of precision.
    Decimal,
    String,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int => "int",
            ScalarType::Double => "double",
            ScalarType::Decimal => "decimal",
            ScalarType::String => "string",
        }
    }

    /// Whether values of this type travel as numbers on the wire.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Double)
    }
}

impl FromStr for ScalarType {
    type Err = OdmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(ScalarType::Bool),
            "int" => Ok(ScalarType::Int),
            "double" => Ok(ScalarType::Double),
            "decimal" => Ok(ScalarType::Decimal),
            "string" => Ok(ScalarType::String),
            other => Err(OdmError::InvalidSchema(format!(
                "Unknown type `{}`",
                other
            ))),
        }
    }
}

/// Cardinality modifier of a PropType.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Single,
    Optional,
    Array,
    Set,
}

impl Modifier {
    fn suffix(&self) -> &'static str {
        match self {
            Modifier::Single => "",
            Modifier::Optional => "?",
            Modifier::Array => "[]",
            Modifier::Set => "<>",
        }
    }
}

/// A parsed type tag such as `int?` or `string<>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropType {
    pub scalar: ScalarType,
    pub modifier: Modifier,
}

impl PropType {
    pub const fn new(scalar: ScalarType, modifier: Modifier) -> Self {
        Self { scalar, modifier }
    }

    pub const fn single(scalar: ScalarType) -> Self {
        Self::new(scalar, Modifier::Single)
    }

    pub const fn optional(scalar: ScalarType) -> Self {
        Self::new(scalar, Modifier::Optional)
    }

    pub const fn array(scalar: ScalarType) -> Self {
        Self::new(scalar, Modifier::Array)
    }

    pub const fn set(scalar: ScalarType) -> Self {
        Self::new(scalar, Modifier::Set)
    }

    /// The type with optionality stripped. Optionality only affects presence.
    pub fn required(&self) -> Self {
        match self.modifier {
            Modifier::Optional => Self::single(self.scalar),
            _ => *self,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.modifier == Modifier::Optional
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.modifier, Modifier::Array | Modifier::Set)
    }
}

impl fmt::Display for PropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.scalar.as_str(), self.modifier.suffix())
    }
}

impl FromStr for PropType {
    type Err = OdmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase();

        let (body, optional) = match tag.strip_suffix('?') {
            Some(body) => (body, true),
            None => (tag.as_str(), false),
        };

        let (scalar, modifier) = if let Some(scalar) = body.strip_suffix("[]") {
            (scalar, Modifier::Array)
        } else if let Some(scalar) = body.strip_suffix("<>") {
            (scalar, Modifier::Set)
        } else if optional {
            (body, Modifier::Optional)
        } else {
            (body, Modifier::Single)
        };

        if optional && modifier != Modifier::Optional {
            return Err(OdmError::InvalidSchema(format!(
                "Type `{}` is invalid, arrays and sets cannot be optional",
                s
            )));
        }

        let scalar = scalar.parse::<ScalarType>().map_err(|_| {
            OdmError::InvalidSchema(format!("Unknown type `{}`", s))
        })?;

        Ok(Self { scalar, modifier })
    }
}

impl TryFrom<String> for PropType {
    type Error = OdmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PropType> for String {
    fn from(value: PropType) -> Self {
        value.to_string()
    }
}
