//! `Subscription` and `SubscriptionsForType`: declarations of interest in a
//! message type's traffic, matched against extracted [`RoutingContent`].

use serde::{Deserialize, Serialize};

use crate::binding_key::{BindingKey, BindingToken};
use crate::message_type::MessageTypeId;
use crate::routing::RoutingContent;

/// A declared interest in a subset of a message type's traffic.
///
/// Equality is structural (`type_id` and `binding_key` both match); hash is
/// derived from the same fields, so a `Subscription` can be used directly as
/// a de-duplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    /// The message type this subscription applies to.
    pub type_id: MessageTypeId,
    /// The binding key pattern.
    pub binding_key: BindingKey,
}

impl Subscription {
    /// Construct a subscription.
    #[must_use]
    pub fn new(type_id: MessageTypeId, binding_key: BindingKey) -> Self {
        Self { type_id, binding_key }
    }

    /// A subscription to every message of `type_id` (empty binding key).
    #[must_use]
    pub fn any(type_id: MessageTypeId) -> Self {
        Self { type_id, binding_key: BindingKey::empty() }
    }

    /// Whether this subscription matches an inbound `(type_id, routing_content)`.
    #[must_use]
    pub fn matches(&self, type_id: &MessageTypeId, routing_content: &RoutingContent) -> bool {
        if &self.type_id != type_id {
            return false;
        }
        if self.binding_key.is_empty() {
            return true;
        }

        for i in 0..routing_content.part_count() {
            let Some(token) = self.binding_key.get_part_token(i) else {
                return false;
            };
            match token {
                BindingToken::Hash => return true,
                BindingToken::Star => continue,
                BindingToken::Literal(lit) => {
                    if routing_content.get(i) != Some(lit.as_str()) {
                        return false;
                    }
                }
            }
        }

        routing_content.part_count() == self.binding_key.part_count()
    }
}

/// A batch of dynamic subscriptions for one message type, as carried by
/// `UpdateSubscriptions` and `PeerSubscriptionsForTypesUpdated`.
///
/// An empty `bindings` vector is a removal signal for `type_id` (see
/// [`crate::repository`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionsForType {
    /// The message type these bindings apply to.
    pub type_id: MessageTypeId,
    /// The binding keys to subscribe to; empty means "remove this type".
    pub bindings: Vec<BindingKey>,
}

impl SubscriptionsForType {
    /// Construct a non-removal entry.
    #[must_use]
    pub fn new(type_id: MessageTypeId, bindings: Vec<BindingKey>) -> Self {
        Self { type_id, bindings }
    }

    /// Construct a removal entry (empty bindings) for `type_id`.
    #[must_use]
    pub fn removal(type_id: MessageTypeId) -> Self {
        Self { type_id, bindings: Vec::new() }
    }

    /// Whether this entry is a removal signal.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bk(parts: &[&str]) -> BindingKey {
        BindingKey::new(parts.iter().copied()).unwrap()
    }

    #[test]
    fn hash_suffix_matches_scenario() {
        let type_id = MessageTypeId::new("Tests.FakeRoutableCommand");
        let rc = RoutingContent::new(vec!["10".into(), "u.name".into()]);

        let sub_10 = Subscription::new(type_id.clone(), bk(&["10", "#"]));
        assert!(sub_10.matches(&type_id, &rc));

        let sub_12 = Subscription::new(type_id.clone(), bk(&["12", "#"]));
        assert!(!sub_12.matches(&type_id, &rc));
    }

    #[test]
    fn empty_binding_key_matches_everything() {
        let type_id = MessageTypeId::new("Tests.Any");
        let sub = Subscription::any(type_id.clone());
        assert!(sub.matches(&type_id, &RoutingContent::empty()));
        assert!(sub.matches(&type_id, &RoutingContent::new(vec!["x".into()])));
    }

    #[test]
    fn star_requires_a_token_to_exist() {
        let type_id = MessageTypeId::new("Tests.T");
        let sub = Subscription::new(type_id.clone(), bk(&["*"]));
        assert!(sub.matches(&type_id, &RoutingContent::new(vec!["anything".into()])));
        assert!(!sub.matches(&type_id, &RoutingContent::empty()));
    }

    #[test]
    fn part_count_mismatch_without_hash_fails() {
        let type_id = MessageTypeId::new("Tests.T");
        let sub = Subscription::new(type_id.clone(), bk(&["a", "b"]));
        assert!(!sub.matches(&type_id, &RoutingContent::new(vec!["a".into()])));
        assert!(!sub.matches(&type_id, &RoutingContent::new(vec!["a".into(), "b".into(), "c".into()])));
    }

    #[test]
    fn different_type_never_matches() {
        let a = MessageTypeId::new("Tests.A");
        let b = MessageTypeId::new("Tests.B");
        let sub = Subscription::any(a);
        assert!(!sub.matches(&b, &RoutingContent::empty()));
    }

    #[test]
    fn empty_bindings_is_a_removal_signal() {
        let entry = SubscriptionsForType::removal(MessageTypeId::new("Tests.T"));
        assert!(entry.is_removal());
        let entry = SubscriptionsForType::new(MessageTypeId::new("Tests.T"), vec![BindingKey::empty()]);
        assert!(!entry.is_removal());
    }
}
