//! Routing content: the ordered routing-member values extracted from a message.

use crate::message_type::RoutableMessage;

/// A single extracted routing-member value.
pub type BindingKeyPart = String;

/// The ordered sequence of routing-member values extracted from a concrete message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutingContent {
    parts: Vec<BindingKeyPart>,
}

impl RoutingContent {
    /// The empty routing content (a message type with no declared routing members).
    #[must_use]
    pub fn empty() -> Self {
        Self { parts: Vec::new() }
    }

    /// Build routing content directly from already-extracted parts.
    #[must_use]
    pub fn new(parts: Vec<BindingKeyPart>) -> Self {
        Self { parts }
    }

    /// Extract routing content from a message via its [`RoutableMessage`] impl.
    #[must_use]
    pub fn from_message<M: RoutableMessage>(msg: &M) -> Self {
        Self { parts: msg.routing_values() }
    }

    /// Number of extracted parts.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// The part at position `i`, if any.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&str> {
        self.parts.get(i).map(String::as_str)
    }

    /// The full part sequence.
    #[must_use]
    pub fn parts(&self) -> &[BindingKeyPart] {
        &self.parts
    }
}

impl std::ops::Index<usize> for RoutingContent {
    type Output = str;

    fn index(&self, index: usize) -> &Self::Output {
        &self.parts[index]
    }
}
