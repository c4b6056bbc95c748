//! `PeerDescriptor`: a peer's full directory-visible state.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message_type::MessageTypeId;
use crate::peer::Peer;
use crate::binding_key::BindingKey;
use crate::subscription::Subscription;

/// The full directory-visible state of a peer.
///
/// The effective subscription set is the deduplicated union of
/// `static_subscriptions` and the flattened `dynamic_subscriptions_by_type`
/// map; see [`PeerDescriptor::effective_subscriptions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDescriptor {
    /// Identity, endpoint, and liveness flags.
    pub peer: Peer,
    /// Whether the peer is persistent (offline messages are queued for it).
    pub is_persistent: bool,
    /// Last time this descriptor was updated, rounded to millisecond UTC.
    pub timestamp_utc: Option<DateTime<Utc>>,
    /// Subscriptions declared statically at registration time.
    pub static_subscriptions: Vec<Subscription>,
    /// Subscriptions added/removed at runtime, keyed by message type.
    pub dynamic_subscriptions_by_type: HashMap<MessageTypeId, HashSet<BindingKey>>,
    /// Whether a debugger is attached to the peer process (diagnostic flag only).
    pub has_debugger_attached: bool,
}

impl PeerDescriptor {
    /// Construct a descriptor for a freshly registered peer with no dynamic subscriptions.
    #[must_use]
    pub fn new(peer: Peer, is_persistent: bool, static_subscriptions: Vec<Subscription>) -> Self {
        Self {
            peer,
            is_persistent,
            timestamp_utc: None,
            static_subscriptions,
            dynamic_subscriptions_by_type: HashMap::new(),
            has_debugger_attached: false,
        }
    }

    /// The deduplicated union of static and dynamic subscriptions.
    #[must_use]
    pub fn effective_subscriptions(&self) -> Vec<Subscription> {
        let mut seen: HashSet<Subscription> = HashSet::new();
        let mut out = Vec::new();

        for sub in &self.static_subscriptions {
            if seen.insert(sub.clone()) {
                out.push(sub.clone());
            }
        }
        for (type_id, bindings) in &self.dynamic_subscriptions_by_type {
            for binding_key in bindings {
                let sub = Subscription::new(type_id.clone(), binding_key.clone());
                if seen.insert(sub.clone()) {
                    out.push(sub);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer_id::PeerId;

    #[test]
    fn effective_subscriptions_union_static_and_dynamic() {
        let peer = Peer::new(PeerId::new("Abc.Service.0"), "tcp://abc:42");
        let fake_command = MessageTypeId::new("Tests.FakeCommand");
        let int_type = MessageTypeId::new("Tests.Int");

        let mut desc = PeerDescriptor::new(
            peer,
            false,
            vec![Subscription::any(fake_command.clone())],
        );
        desc.dynamic_subscriptions_by_type
            .insert(int_type.clone(), HashSet::from([BindingKey::empty()]));

        let effective = desc.effective_subscriptions();
        assert_eq!(effective.len(), 2);
        assert!(effective.contains(&Subscription::any(fake_command)));
        assert!(effective.contains(&Subscription::any(int_type)));
    }

    #[test]
    fn dynamic_empty_binding_coexists_with_static() {
        let peer = Peer::new(PeerId::new("Abc.Service.0"), "tcp://abc:42");
        let t = MessageTypeId::new("Tests.T");
        let mut desc = PeerDescriptor::new(peer, false, vec![Subscription::any(t.clone())]);
        desc.dynamic_subscriptions_by_type.insert(t.clone(), HashSet::from([BindingKey::empty()]));

        // Union dedupes the identical (type, empty-binding-key) subscription.
        assert_eq!(desc.effective_subscriptions(), vec![Subscription::any(t)]);
    }
}
