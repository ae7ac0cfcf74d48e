//! Primitive identifiers
//!
//! An identifier is an opaque, caller-chosen key. Each primitive kind keeps its
//! own namespace, so the same identifier can name a counter and a join at once.

use serde::{Deserialize, Serialize};

/// Identifier wrapper for type-safe primitive lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimitiveId(String);

impl PrimitiveId {
    /// Create from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PrimitiveId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PrimitiveId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&PrimitiveId> for PrimitiveId {
    fn from(id: &PrimitiveId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for PrimitiveId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
