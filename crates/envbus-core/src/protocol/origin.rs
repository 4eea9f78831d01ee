//! Target origin (`"*"` or an exact origin string).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Where a message may be delivered / which sender origin is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetOrigin {
    /// Wildcard; used when the remote origin cannot be known in advance.
    #[default]
    Any,
    Exact(String),
}

impl TargetOrigin {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "*" => TargetOrigin::Any,
            other => TargetOrigin::Exact(other.trim_end_matches('/').to_string()),
        }
    }

    /// Whether an event coming from `origin` passes this filter.
    pub fn accepts(&self, origin: &str) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::Exact(expected) => expected == origin.trim_end_matches('/'),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, TargetOrigin::Any)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TargetOrigin::Any => "*",
            TargetOrigin::Exact(s) => s,
        }
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TargetOrigin {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TargetOrigin {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(TargetOrigin::parse(&s))
    }
}
