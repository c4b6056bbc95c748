//! The Peer Directory server: registration, subscription updates, liveness
//! tracking, and handler-resolution queries over a [`PeerRepository`].

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use meshbus_core::descriptor::PeerDescriptor;
use meshbus_core::message_type::MessageTypeId;
use meshbus_core::peer::Peer;
use meshbus_core::peer_id::PeerId;
use meshbus_core::repository::PeerRepository;
use meshbus_core::routing::RoutingContent;
use meshbus_core::subscription::{Subscription, SubscriptionsForType};
use parking_lot::RwLock;

use crate::events::{
    PeerAction, PeerDecommissioned, PeerNotResponding, PeerResponding, PeerStarted, PeerStopped,
    PeerSubscriptionsForTypesUpdated, PeerSubscriptionsUpdated, PeerUpdated,
};

/// A callback invoked with every [`PeerUpdated`] raised by the directory.
pub type PeerUpdatedHandler = Arc<dyn Fn(&PeerUpdated) + Send + Sync>;

struct LivenessState {
    last_ping: Option<DateTime<Utc>>,
}

/// The registration, subscription, and liveness service. One instance per
/// local peer; in a real deployment each peer runs its own directory server
/// and replicates state via the published events.
pub struct PeerDirectory {
    local_peer_id: PeerId,
    repository: PeerRepository,
    liveness: RwLock<std::collections::HashMap<PeerId, LivenessState>>,
    on_peer_updated: RwLock<Vec<PeerUpdatedHandler>>,
    disable_dynamic_subscriptions_for_outgoing: bool,
}

impl PeerDirectory {
    /// Build a directory for `local_peer_id`. When
    /// `disable_dynamic_subscriptions_for_outgoing` is set,
    /// [`Self::get_peers_handling_message`] consults only static
    /// subscriptions.
    #[must_use]
    pub fn new(local_peer_id: PeerId, disable_dynamic_subscriptions_for_outgoing: bool) -> Self {
        Self {
            local_peer_id,
            repository: PeerRepository::new(),
            liveness: RwLock::new(std::collections::HashMap::new()),
            on_peer_updated: RwLock::new(Vec::new()),
            disable_dynamic_subscriptions_for_outgoing,
        }
    }

    /// Subscribe to [`PeerUpdated`] notifications.
    pub fn on_peer_updated(&self, handler: PeerUpdatedHandler) {
        self.on_peer_updated.write().push(handler);
    }

    fn raise_peer_updated(&self, peer_id: PeerId, action: PeerAction) {
        let event = PeerUpdated { peer_id, action };
        for handler in self.on_peer_updated.read().iter() {
            handler(&event);
        }
    }

    /// Persist `descriptor`, publish [`PeerStarted`], and reset the peer's
    /// last-ping clock to now.
    pub fn register(&self, descriptor: PeerDescriptor) -> PeerStarted {
        let peer_id = descriptor.peer.id.clone();
        tracing::debug!(%peer_id, "registering peer");
        self.repository.add_or_update_peer(descriptor.clone());
        self.liveness.write().insert(peer_id.clone(), LivenessState { last_ping: Some(Utc::now()) });
        self.raise_peer_updated(peer_id, PeerAction::Started);
        PeerStarted(descriptor)
    }

    /// Mark `peer_id` as down and publish [`PeerStopped`]; resets the
    /// last-ping clock to "never", making [`Self::time_since_last_ping`]
    /// return infinity again.
    pub fn unregister(&self, peer_id: &PeerId) -> Option<PeerStopped> {
        tracing::debug!(%peer_id, "unregistering peer");
        let descriptor = self.repository.get(peer_id)?;
        let mut peer = descriptor.peer.clone();
        peer.is_up = false;
        let mut updated = descriptor;
        updated.peer = peer.clone();
        self.repository.add_or_update_peer(updated);
        self.liveness.write().insert(peer_id.clone(), LivenessState { last_ping: None });
        self.raise_peer_updated(peer_id.clone(), PeerAction::Stopped);
        Some(PeerStopped(peer))
    }

    /// Partition `entries` into adds (non-empty bindings) and removes (empty
    /// bindings), apply both against the repository with a single `now_utc`,
    /// and return the event to publish — carrying the original, unpartitioned
    /// list so other replicas apply the same partition.
    pub fn update_subscriptions(
        &self,
        peer_id: &PeerId,
        entries: Vec<SubscriptionsForType>,
    ) -> PeerSubscriptionsForTypesUpdated {
        let now_utc = Utc::now().trunc_subsecs(3);

        let adds: Vec<SubscriptionsForType> = entries.iter().filter(|e| !e.is_removal()).cloned().collect();
        let removes: Vec<MessageTypeId> =
            entries.iter().filter(|e| e.is_removal()).map(|e| e.type_id.clone()).collect();

        if !adds.is_empty() {
            self.repository.add_dynamic_subscriptions_for_types(peer_id, now_utc, &adds);
        }
        if !removes.is_empty() {
            self.repository.remove_dynamic_subscriptions_for_types(peer_id, now_utc, &removes);
        }

        self.raise_peer_updated(peer_id.clone(), PeerAction::Updated);
        PeerSubscriptionsForTypesUpdated { peer_id: peer_id.clone(), timestamp_utc: now_utc, entries }
    }

    /// Consult the repository and matcher-equivalent [`Subscription::matches`]
    /// evaluation for every known peer, returning the unique peers whose
    /// effective subscriptions match `(type_id, routing_content)`.
    #[must_use]
    pub fn get_peers_handling_message(&self, type_id: &MessageTypeId, routing_content: &RoutingContent) -> Vec<Peer> {
        let load_dynamic = !self.disable_dynamic_subscriptions_for_outgoing;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for descriptor in self.repository.get_peers(load_dynamic) {
            let matches = descriptor
                .effective_subscriptions()
                .iter()
                .any(|sub: &Subscription| sub.matches(type_id, routing_content));
            if matches && seen.insert(descriptor.peer.id.clone()) {
                out.push(descriptor.peer);
            }
        }
        out
    }

    /// Apply a [`PeerDecommissioned`] event: remove the descriptor and all
    /// its dynamic subscriptions.
    pub fn handle_peer_decommissioned(&self, event: &PeerDecommissioned) {
        let peer_id = &event.0;
        tracing::debug!(%peer_id, "decommissioning peer");
        self.repository.remove_all_dynamic_subscriptions_for_peer(peer_id, Utc::now());
        self.repository.remove_peer(peer_id);
        self.liveness.write().remove(peer_id);
        self.raise_peer_updated(peer_id.clone(), PeerAction::Decommissioned);
    }

    /// Apply a [`PeerSubscriptionsUpdated`] event (full descriptor replace,
    /// e.g. a replica's static subscriptions changed).
    pub fn handle_peer_subscriptions_updated(&self, event: &PeerSubscriptionsUpdated) {
        let peer_id = event.0.peer.id.clone();
        self.repository.add_or_update_peer(event.0.clone());
        self.raise_peer_updated(peer_id, PeerAction::Updated);
    }

    /// Apply a [`PeerResponding`] event.
    pub fn handle_peer_responding(&self, event: &PeerResponding) {
        self.set_responding(&event.0, true);
        self.raise_peer_updated(event.0.clone(), PeerAction::Updated);
    }

    /// Apply a [`PeerNotResponding`] event.
    pub fn handle_peer_not_responding(&self, event: &PeerNotResponding) {
        tracing::warn!(peer_id = %event.0, "peer not responding");
        self.set_responding(&event.0, false);
        self.raise_peer_updated(event.0.clone(), PeerAction::Updated);
    }

    fn set_responding(&self, peer_id: &PeerId, is_responding: bool) {
        if let Some(mut descriptor) = self.repository.get(peer_id) {
            descriptor.peer.is_responding = is_responding;
            self.repository.add_or_update_peer(descriptor);
        }
    }

    /// Reset `peer_id`'s last-ping instant to now.
    pub fn handle_ping_peer_command(&self, peer_id: &PeerId) {
        self.liveness.write().entry(peer_id.clone()).or_insert(LivenessState { last_ping: None }).last_ping =
            Some(Utc::now());
    }

    /// Time elapsed since the last recorded ping for `peer_id`; `infinity`
    /// before registration and after unregistration.
    #[must_use]
    pub fn time_since_last_ping(&self, peer_id: &PeerId) -> chrono::Duration {
        match self.liveness.read().get(peer_id).and_then(|s| s.last_ping) {
            Some(last_ping) => Utc::now() - last_ping,
            None => chrono::Duration::max_value(),
        }
    }

    /// This directory's own peer id.
    #[must_use]
    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }

    /// Look up a registered peer's full descriptor.
    #[must_use]
    pub fn get(&self, peer_id: &PeerId) -> Option<PeerDescriptor> {
        self.repository.get(peer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshbus_core::binding_key::BindingKey;

    fn descriptor(id: &str, subs: Vec<Subscription>) -> PeerDescriptor {
        PeerDescriptor::new(Peer::new(PeerId::new(id), "tcp://abc:42"), false, subs)
    }

    #[test]
    fn register_then_get_peers_handling_message_after_dynamic_update() {
        let directory = PeerDirectory::new(PeerId::new("Local.0"), false);
        let peer_id = PeerId::new("Abc.Service.0");
        let fake_command = MessageTypeId::new("Tests.FakeCommand");
        let int_type = MessageTypeId::new("Tests.Int");

        directory.register(descriptor("Abc.Service.0", vec![Subscription::any(fake_command.clone())]));
        directory.update_subscriptions(
            &peer_id,
            vec![SubscriptionsForType::new(int_type.clone(), vec![BindingKey::empty()])],
        );

        let desc = directory.get(&peer_id).unwrap();
        let effective: std::collections::HashSet<_> = desc.effective_subscriptions().into_iter().collect();
        assert_eq!(
            effective,
            std::collections::HashSet::from([Subscription::any(fake_command.clone()), Subscription::any(int_type.clone())])
        );

        let handling = directory.get_peers_handling_message(&int_type, &RoutingContent::empty());
        assert_eq!(handling.len(), 1);
        assert_eq!(handling[0].id, peer_id);
    }

    #[test]
    fn update_subscriptions_partitions_adds_and_removes_with_one_timestamp() {
        let directory = PeerDirectory::new(PeerId::new("Local.0"), false);
        let peer_id = PeerId::new("Abc.Service.0");
        directory.register(descriptor("Abc.Service.0", vec![]));

        let int_type = MessageTypeId::new("Tests.Int");
        let double_type = MessageTypeId::new("Tests.Double");
        directory.repository.add_dynamic_subscriptions_for_types(
            &peer_id,
            Utc::now() - chrono::Duration::minutes(1),
            &[SubscriptionsForType::new(int_type.clone(), vec![BindingKey::empty()])],
        );

        let event = directory.update_subscriptions(
            &peer_id,
            vec![
                SubscriptionsForType::removal(int_type.clone()),
                SubscriptionsForType::new(double_type.clone(), vec![BindingKey::empty()]),
            ],
        );

        assert_eq!(event.entries.len(), 2);
        let desc = directory.get(&peer_id).unwrap();
        assert!(!desc.dynamic_subscriptions_by_type.contains_key(&int_type));
        assert!(desc.dynamic_subscriptions_by_type.contains_key(&double_type));
    }

    #[test]
    fn time_since_last_ping_tracks_register_ping_unregister() {
        let directory = PeerDirectory::new(PeerId::new("Local.0"), false);
        let peer_id = PeerId::new("Abc.Service.0");

        assert_eq!(directory.time_since_last_ping(&peer_id), chrono::Duration::max_value());

        directory.register(descriptor("Abc.Service.0", vec![]));
        let after_register = directory.time_since_last_ping(&peer_id);
        assert!(after_register < chrono::Duration::max_value());

        std::thread::sleep(std::time::Duration::from_millis(5));
        let before_ping = directory.time_since_last_ping(&peer_id);
        directory.handle_ping_peer_command(&peer_id);
        let after_ping = directory.time_since_last_ping(&peer_id);
        assert!(after_ping < before_ping);

        directory.unregister(&peer_id);
        assert_eq!(directory.time_since_last_ping(&peer_id), chrono::Duration::max_value());
    }

    #[test]
    fn decommission_removes_peer_and_dynamic_subscriptions() {
        let directory = PeerDirectory::new(PeerId::new("Local.0"), false);
        let peer_id = PeerId::new("Abc.Service.0");
        directory.register(descriptor("Abc.Service.0", vec![]));
        directory.update_subscriptions(
            &peer_id,
            vec![SubscriptionsForType::new(MessageTypeId::new("Tests.Int"), vec![BindingKey::empty()])],
        );

        directory.handle_peer_decommissioned(&PeerDecommissioned(peer_id.clone()));
        assert!(directory.get(&peer_id).is_none());
    }

    #[test]
    fn monotonic_older_add_after_newer_add_is_a_no_op_through_the_directory() {
        let directory = PeerDirectory::new(PeerId::new("Local.0"), false);
        let peer_id = PeerId::new("Abc.Service.0");
        directory.register(descriptor("Abc.Service.0", vec![]));

        let int_type = MessageTypeId::new("Tests.Int");
        let t0 = Utc::now();
        directory.repository.add_dynamic_subscriptions_for_types(
            &peer_id,
            t0,
            &[SubscriptionsForType::new(int_type.clone(), vec![BindingKey::new(["a"]).unwrap()])],
        );
        directory.repository.add_dynamic_subscriptions_for_types(
            &peer_id,
            t0 - chrono::Duration::minutes(1),
            &[SubscriptionsForType::new(int_type.clone(), vec![BindingKey::new(["b"]).unwrap()])],
        );

        let desc = directory.get(&peer_id).unwrap();
        let set = desc.dynamic_subscriptions_by_type.get(&int_type).unwrap();
        assert_eq!(set, &std::collections::HashSet::from([BindingKey::new(["a"]).unwrap()]));
    }
}
