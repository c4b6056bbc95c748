//! Message type identity and the process-wide descriptor registry.
//!
//! The source interns `MessageTypeId -> descriptor` behind a process-wide
//! cache populated by runtime type scanning. This crate has no runtime type
//! scanning (see SPEC_FULL.md §9, "Global mutable state"): message types
//! register their descriptor once, at process start, via
//! [`register_message_type`], and the registry is consulted only for
//! diagnostics — matching and routing never need to resolve a type id back
//! to a Rust type.

use std::fmt;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// The fully-qualified type name of a message, with no assembly/version qualifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageTypeId(String);

impl MessageTypeId {
    /// Wrap a string as a `MessageTypeId`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The underlying fully-qualified name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageTypeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Declares how a message type's routing members are named, in declaration order.
///
/// This is the systems-language replacement for the source's runtime
/// expression-tree introspection: implementors name their routing members
/// explicitly instead of the bus discovering them reflectively.
pub trait RoutableMessage {
    /// The fully-qualified type name used on the wire and in subscriptions.
    const MESSAGE_TYPE: &'static str;

    /// Declared routing member names, in declaration order. Used only for
    /// descriptor registration/diagnostics, not for extraction itself.
    const ROUTING_MEMBER_NAMES: &'static [&'static str] = &[];

    /// Extract routing member values, in declaration order.
    ///
    /// Enum members are converted by variant name; booleans by the
    /// canonical `"True"`/`"False"` strings (not Rust's lowercase `Display`),
    /// to match the wire's textual routing content. A missing/unset member
    /// yields the empty string rather than erroring.
    fn routing_values(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Canonical boolean-to-token conversion used by routing member extraction.
#[must_use]
pub fn canonical_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Metadata describing a registered message type.
#[derive(Debug, Clone)]
pub struct MessageTypeDescriptor {
    /// The type this descriptor describes.
    pub type_id: MessageTypeId,
    /// Declared routing member names, in declaration order.
    pub routing_member_names: Vec<String>,
}

static REGISTRY: Lazy<DashMap<MessageTypeId, MessageTypeDescriptor>> = Lazy::new(DashMap::new);

/// Register (or re-register) a message type's descriptor in the process-wide registry.
pub fn register_message_type<M: RoutableMessage>() {
    let type_id = MessageTypeId::new(M::MESSAGE_TYPE);
    let descriptor = MessageTypeDescriptor {
        type_id: type_id.clone(),
        routing_member_names: M::ROUTING_MEMBER_NAMES.iter().map(|s| (*s).to_string()).collect(),
    };
    REGISTRY.insert(type_id, descriptor);
}

/// Look up a previously-registered descriptor.
#[must_use]
pub fn descriptor_for(type_id: &MessageTypeId) -> Option<MessageTypeDescriptor> {
    REGISTRY.get(type_id).map(|entry| entry.value().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRoutableCommand {
        id: i32,
        name: String,
    }

    impl RoutableMessage for FakeRoutableCommand {
        const MESSAGE_TYPE: &'static str = "Tests.FakeRoutableCommand";
        const ROUTING_MEMBER_NAMES: &'static [&'static str] = &["Id", "Name"];

        fn routing_values(&self) -> Vec<String> {
            vec![self.id.to_string(), self.name.clone()]
        }
    }

    #[test]
    fn register_and_lookup_descriptor() {
        register_message_type::<FakeRoutableCommand>();
        let descriptor = descriptor_for(&MessageTypeId::new("Tests.FakeRoutableCommand")).unwrap();
        assert_eq!(descriptor.routing_member_names, vec!["Id", "Name"]);
    }

    #[test]
    fn canonical_bool_matches_wire_tokens() {
        assert_eq!(canonical_bool(true), "True");
        assert_eq!(canonical_bool(false), "False");
    }
}
