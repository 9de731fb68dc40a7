//! Domain primitives shared by the services and the HTTP layer.
//!
//! Identifiers are newtypes so a widget id can never be passed where a user
//! id is expected and vice versa.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a widget row.
///
/// # Examples
///
/// ```rust
/// use promptboard::domain::WidgetId;
///
/// let id = WidgetId::new(42);
/// assert_eq!(id.value(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WidgetId(i32);

impl WidgetId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for WidgetId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl From<WidgetId> for i32 {
    fn from(id: WidgetId) -> Self {
        id.0
    }
}

impl Serialize for WidgetId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(self.0)
    }
}

impl<'de> Deserialize<'de> for WidgetId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        i32::deserialize(deserializer).map(Self)
    }
}

/// Identifier of the caller, supplied by the upstream identity layer.
///
/// Every widget read and write is scoped by this value. It is only ever
/// built from a non-blank string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Returns `None` when the raw value is blank.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a generated SQL statement is allowed to do.
///
/// Selects the system prompt, the forbidden-term dictionary and the
/// keyword list applied to the model's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Read-only reporting queries.
    Read,
    /// Inserts and updates on existing tables.
    Update,
}

impl Intent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_rejects_blank() {
        assert!(UserId::parse("").is_none());
        assert!(UserId::parse("   ").is_none());
        assert_eq!(UserId::parse(" user-1 ").unwrap().as_str(), "user-1");
    }

    #[test]
    fn test_widget_id_serde() {
        let id: WidgetId = serde_json::from_str("7").unwrap();
        assert_eq!(id, WidgetId::new(7));
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }
}
