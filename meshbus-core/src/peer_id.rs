//! Peer identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque peer identifier, textually represented as dot-separated tokens
/// (e.g. `Org.Service.0`).
///
/// Equality and hashing are case-sensitive on the normalized string; no
/// case-folding or token-level comparison is performed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a string as a `PeerId` without validation.
    ///
    /// Prefer [`PeerId::parse`] at trust boundaries (wire reads, config).
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a peer id, rejecting the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::InvalidPeerId`] if `id` is empty.
    pub fn parse(id: impl Into<String>) -> crate::error::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::error::CoreError::invalid_peer_id("peer id must not be empty"));
        }
        Ok(Self(id))
    }

    /// The underlying normalized string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrips_the_string() {
        let id = PeerId::new("Abc.Service.0");
        assert_eq!(id.to_string(), "Abc.Service.0");
        assert_eq!(id.as_str(), "Abc.Service.0");
    }

    #[test]
    fn equality_is_case_sensitive() {
        assert_ne!(PeerId::new("Abc.Service.0"), PeerId::new("abc.service.0"));
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(PeerId::parse("").is_err());
        assert!(PeerId::parse("Abc.Service.0").is_ok());
    }
}
