use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ProbeError;

fn validate_segment(kind: &str, value: &str) -> Result<(), ProbeError> {
    if value.is_empty() {
        return Err(ProbeError::configuration(format!("{} cannot be empty", kind)));
    }
    if value.contains('/') {
        return Err(ProbeError::configuration(format!(
            "{} '{}' must be a single path segment",
            kind, value
        )));
    }
    if value == "." || value == ".." {
        return Err(ProbeError::configuration(format!("{} '{}' is reserved", kind, value)));
    }
    Ok(())
}

/// Name of a top-level collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(name: impl Into<String>) -> Result<Self, ProbeError> {
        let name = name.into();
        validate_segment("Collection name", &name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Server-assigned document identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Result<Self, ProbeError> {
        let id = id.into();
        validate_segment("Document ID", &id)?;
        Ok(Self(id))
    }

    /// Extracts the id from a full resource name such as
    /// `projects/p/databases/(default)/documents/col/abc123`.
    pub fn from_resource_name(name: &str) -> Result<Self, ProbeError> {
        let last = name.rsplit('/').next().unwrap_or_default();
        Self::new(last).map_err(|_| {
            ProbeError::invalid_response(format!("document name '{}' has no id segment", name))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_segment_traits {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $ty {
            type Err = ProbeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ProbeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }
    };
}

impl_segment_traits!(CollectionName);
impl_segment_traits!(DocumentId);
