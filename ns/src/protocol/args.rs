//! Runtime-typed callback arguments

use serde::{Deserialize, Serialize};

/// A value passed to or returned from a callback; the variant is its runtime type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ArgValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(String),
}

impl ArgValue {
    /// Runtime kind, or None for `Null`
    pub fn kind(&self) -> Option<ArgKind> {
        match self {
            ArgValue::Null => None,
            ArgValue::Bool(_) => Some(ArgKind::Bool),
            ArgValue::Int(_) => Some(ArgKind::Int),
            ArgValue::Long(_) => Some(ArgKind::Long),
            ArgValue::Double(_) => Some(ArgKind::Double),
            ArgValue::Str(_) => Some(ArgKind::Str),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().map_or("null", ArgKind::name)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            ArgValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgValue::Null => write!(f, "null"),
            ArgValue::Bool(v) => write!(f, "{v}"),
            ArgValue::Int(v) => write!(f, "{v}"),
            ArgValue::Long(v) => write!(f, "{v}L"),
            ArgValue::Double(v) => write!(f, "{v}"),
            ArgValue::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        ArgValue::Int(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Long(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Double(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Str(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Str(value)
    }
}

/// Declared parameter kind of a callback overload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgKind {
    Bool,
    Int,
    Long,
    Double,
    Str,
    /// Accepts every value, including `Null`
    Any,
}

impl ArgKind {
    /// Whether an argument of this runtime value can bind to a parameter of this kind
    pub fn accepts(self, value: &ArgValue) -> bool {
        self == ArgKind::Any || value.kind() == Some(self)
    }

    pub fn name(self) -> &'static str {
        match self {
            ArgKind::Bool => "bool",
            ArgKind::Int => "int",
            ArgKind::Long => "long",
            ArgKind::Double => "double",
            ArgKind::Str => "string",
            ArgKind::Any => "any",
        }
    }
}

/// Comma-separated runtime types, for resolution errors
pub fn signature(args: &[ArgValue]) -> String {
    args.iter().map(ArgValue::type_name).collect::<Vec<_>>().join(", ")
}
