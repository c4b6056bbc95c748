//! `PeerRepository`: the persistent mapping from `PeerId` to `PeerDescriptor`,
//! with timestamp-monotonic dynamic-subscription updates.

use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::binding_key::BindingKey;
use crate::descriptor::PeerDescriptor;
use crate::message_type::MessageTypeId;
use crate::peer_id::PeerId;
use crate::subscription::SubscriptionsForType;

fn round_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

#[derive(Debug, Default)]
struct PeerEntry {
    descriptor: PeerDescriptor,
    last_add_ts: HashMap<MessageTypeId, DateTime<Utc>>,
    last_remove_ts: HashMap<MessageTypeId, DateTime<Utc>>,
}

/// Persistent mapping from `PeerId` to `PeerDescriptor`.
///
/// A `PeerId` maps to at most one entry at any time. Writers are serialized
/// per peer (one `RwLock` per `DashMap` entry); readers of unrelated peers
/// never contend.
#[derive(Debug, Default)]
pub struct PeerRepository {
    peers: DashMap<PeerId, RwLock<PeerEntry>>,
}

impl PeerRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a peer descriptor. Never clears previously recorded dynamic
    /// subscriptions for an existing peer, even though `desc` itself may
    /// carry none (registration payloads only declare static subscriptions).
    pub fn add_or_update_peer(&self, desc: PeerDescriptor) {
        let id = desc.peer.id.clone();
        self.peers
            .entry(id)
            .and_modify(|entry| {
                let mut entry = entry.write();
                let preserved_dynamic = std::mem::take(&mut entry.descriptor.dynamic_subscriptions_by_type);
                entry.descriptor = desc.clone();
                entry.descriptor.dynamic_subscriptions_by_type = preserved_dynamic;
            })
            .or_insert_with(|| RwLock::new(PeerEntry { descriptor: desc, ..Default::default() }));
    }

    /// Look up the merged (static+dynamic) descriptor for `peer_id`.
    #[must_use]
    pub fn get(&self, peer_id: &PeerId) -> Option<PeerDescriptor> {
        self.peers.get(peer_id).map(|entry| entry.read().descriptor.clone())
    }

    /// List all known peer descriptors.
    ///
    /// When `load_dynamic` is `false`, the returned descriptors have their
    /// dynamic-subscription map stripped (a cheap "static only" view).
    #[must_use]
    pub fn get_peers(&self, load_dynamic: bool) -> Vec<PeerDescriptor> {
        self.peers
            .iter()
            .map(|entry| {
                let mut desc = entry.read().descriptor.clone();
                if !load_dynamic {
                    desc.dynamic_subscriptions_by_type.clear();
                }
                desc
            })
            .collect()
    }

    /// Remove a peer and all its dynamic subscriptions.
    pub fn remove_peer(&self, peer_id: &PeerId) {
        self.peers.remove(peer_id);
    }

    /// Apply dynamic-subscription additions, subject to the timestamp-monotonic rule.
    ///
    /// Per entry: if `bindings` is non-empty, replaces the dynamic set for
    /// that `type_id`, but only if `ts` is strictly greater than the last
    /// applied add-timestamp for `(peer_id, type_id)`. Entries with empty
    /// bindings are ignored here (see [`Self::remove_dynamic_subscriptions_for_types`]).
    pub fn add_dynamic_subscriptions_for_types(
        &self,
        peer_id: &PeerId,
        ts: DateTime<Utc>,
        entries: &[SubscriptionsForType],
    ) {
        let ts = round_millis(ts);
        let Some(entry) = self.peers.get(peer_id) else {
            tracing::warn!(%peer_id, "add_dynamic_subscriptions_for_types: unknown peer, discarding");
            return;
        };
        let mut entry = entry.write();
        for item in entries {
            if item.bindings.is_empty() {
                continue;
            }
            let outdated = entry
                .last_add_ts
                .get(&item.type_id)
                .is_some_and(|&last| ts <= last);
            if outdated {
                tracing::debug!(%peer_id, type_id = %item.type_id, "discarding outdated dynamic subscription add");
                continue;
            }
            let set: std::collections::HashSet<BindingKey> = item.bindings.iter().cloned().collect();
            entry.descriptor.dynamic_subscriptions_by_type.insert(item.type_id.clone(), set);
            entry.last_add_ts.insert(item.type_id.clone(), ts);
        }
    }

    /// Apply dynamic-subscription removals, subject to the timestamp-monotonic rule.
    pub fn remove_dynamic_subscriptions_for_types(
        &self,
        peer_id: &PeerId,
        ts: DateTime<Utc>,
        type_ids: &[MessageTypeId],
    ) {
        let ts = round_millis(ts);
        let Some(entry) = self.peers.get(peer_id) else {
            tracing::warn!(%peer_id, "remove_dynamic_subscriptions_for_types: unknown peer, discarding");
            return;
        };
        let mut entry = entry.write();
        for type_id in type_ids {
            let outdated = entry
                .last_remove_ts
                .get(type_id)
                .is_some_and(|&last| ts <= last);
            if outdated {
                tracing::debug!(%peer_id, %type_id, "discarding outdated dynamic subscription remove");
                continue;
            }
            entry.descriptor.dynamic_subscriptions_by_type.remove(type_id);
            entry.last_remove_ts.insert(type_id.clone(), ts);
        }
    }

    /// Remove every dynamic subscription currently recorded for `peer_id`,
    /// applying the same monotonic guard per type (used on `PeerDecommissioned`).
    pub fn remove_all_dynamic_subscriptions_for_peer(&self, peer_id: &PeerId, ts: DateTime<Utc>) {
        let Some(entry) = self.peers.get(peer_id) else { return };
        let type_ids: Vec<MessageTypeId> =
            entry.read().descriptor.dynamic_subscriptions_by_type.keys().cloned().collect();
        drop(entry);
        self.remove_dynamic_subscriptions_for_types(peer_id, ts, &type_ids);
    }
}
