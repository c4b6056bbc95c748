//! Subscription matcher: a two-level index from `(MessageTypeId, RoutingContent)`
//! to the set of peers whose subscriptions match.
//!
//! Mirrors the teacher's sorted/trie subscription indices
//! (`monocoque-core::pubsub::index::SubscriptionIndex`,
//! `monocoque-core::subscription::SubscriptionTrie`) but keyed on structured
//! binding-key tokens (literal / `*` / `#`) instead of byte-string prefixes,
//! and split into a static and a dynamic sub-tree per type so that
//! "static only" lookups never touch the dynamic tree.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::binding_key::{BindingKey, BindingToken};
use crate::message_type::MessageTypeId;
use crate::peer_id::PeerId;
use crate::routing::RoutingContent;
use crate::subscription::Subscription;

#[derive(Debug, Default)]
struct MatcherNode {
    literal_children: HashMap<String, MatcherNode>,
    wildcard_child: Option<Box<MatcherNode>>,
    /// Peers subscribed via a `#` token ending at this node: matches any remainder.
    hash_peers: HashSet<PeerId>,
    /// Peers whose binding key is fully consumed exactly at this depth.
    terminal_peers: HashSet<PeerId>,
}

impl MatcherNode {
    fn is_empty(&self) -> bool {
        self.literal_children.is_empty()
            && self.wildcard_child.is_none()
            && self.hash_peers.is_empty()
            && self.terminal_peers.is_empty()
    }

    fn insert(&mut self, tokens: &[BindingToken], peer_id: &PeerId) {
        match tokens.split_first() {
            None => {
                self.terminal_peers.insert(peer_id.clone());
            }
            Some((BindingToken::Hash, _rest)) => {
                // `#` is validated to always be last; nothing follows it.
                self.hash_peers.insert(peer_id.clone());
            }
            Some((BindingToken::Star, rest)) => {
                self.wildcard_child.get_or_insert_with(Box::default).insert(rest, peer_id);
            }
            Some((BindingToken::Literal(lit), rest)) => {
                self.literal_children.entry(lit.clone()).or_default().insert(rest, peer_id);
            }
        }
    }

    /// Removes `peer_id` along the path described by `tokens`. Returns `true`
    /// if this node became empty and can be pruned by the caller.
    fn remove(&mut self, tokens: &[BindingToken], peer_id: &PeerId) -> bool {
        match tokens.split_first() {
            None => {
                self.terminal_peers.remove(peer_id);
            }
            Some((BindingToken::Hash, _rest)) => {
                self.hash_peers.remove(peer_id);
            }
            Some((BindingToken::Star, rest)) => {
                let mut prune = false;
                if let Some(child) = self.wildcard_child.as_mut() {
                    if child.remove(rest, peer_id) {
                        prune = true;
                    }
                }
                if prune {
                    self.wildcard_child = None;
                }
            }
            Some((BindingToken::Literal(lit), rest)) => {
                let mut prune = false;
                if let Some(child) = self.literal_children.get_mut(lit) {
                    if child.remove(rest, peer_id) {
                        prune = true;
                    }
                }
                if prune {
                    self.literal_children.remove(lit);
                }
            }
        }
        self.is_empty()
    }

    fn collect(&self, content: &RoutingContent, depth: usize, out: &mut HashSet<PeerId>) {
        out.extend(self.hash_peers.iter().cloned());

        if depth == 0 {
            // A terminal at the root came from an empty binding key, which
            // matches any routing content regardless of length.
            out.extend(self.terminal_peers.iter().cloned());
        } else if depth == content.part_count() {
            out.extend(self.terminal_peers.iter().cloned());
        }

        if depth == content.part_count() {
            return;
        }

        if let Some(token) = content.get(depth) {
            if let Some(child) = self.literal_children.get(token) {
                child.collect(content, depth + 1, out);
            }
        }
        if let Some(child) = &self.wildcard_child {
            child.collect(content, depth + 1, out);
        }
    }
}

#[derive(Debug, Default)]
struct TypeTrees {
    static_tree: MatcherNode,
    dynamic_tree: MatcherNode,
}

/// Whether a subscription being added/removed is static (from a peer
/// descriptor) or dynamic (added/removed at runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Static,
    Dynamic,
}

/// Matches inbound `(MessageTypeId, RoutingContent)` pairs against the
/// subscriptions of registered peers.
///
/// Safe for concurrent use: each message type's trees are guarded
/// independently, so unrelated types never contend.
#[derive(Debug, Default)]
pub struct SubscriptionMatcher {
    by_type: DashMap<MessageTypeId, RwLock<TypeTrees>>,
}

impl SubscriptionMatcher {
    /// Create an empty matcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `peer_id`'s interest described by `subscription`.
    pub fn add(&self, peer_id: &PeerId, subscription: &Subscription, kind: SubscriptionKind) {
        let entry = self.by_type.entry(subscription.type_id.clone()).or_default();
        let mut trees = entry.write();
        let tree = match kind {
            SubscriptionKind::Static => &mut trees.static_tree,
            SubscriptionKind::Dynamic => &mut trees.dynamic_tree,
        };
        tree.insert(subscription.binding_key.parts(), peer_id);
    }

    /// Remove `peer_id`'s interest described by `subscription`.
    pub fn remove(&self, peer_id: &PeerId, subscription: &Subscription, kind: SubscriptionKind) {
        let Some(entry) = self.by_type.get(&subscription.type_id) else { return };
        let mut trees = entry.write();
        let tree = match kind {
            SubscriptionKind::Static => &mut trees.static_tree,
            SubscriptionKind::Dynamic => &mut trees.dynamic_tree,
        };
        tree.remove(subscription.binding_key.parts(), peer_id);
    }

    /// Returns the deduplicated set of peers whose subscriptions for
    /// `type_id` match `routing_content`.
    ///
    /// When `include_dynamic` is `false`, only static subscriptions are consulted.
    #[must_use]
    pub fn peers_handling(
        &self,
        type_id: &MessageTypeId,
        routing_content: &RoutingContent,
        include_dynamic: bool,
    ) -> HashSet<PeerId> {
        let mut out = HashSet::new();
        let Some(entry) = self.by_type.get(type_id) else { return out };
        let trees = entry.read();
        trees.static_tree.collect(routing_content, 0, &mut out);
        if include_dynamic {
            trees.dynamic_tree.collect(routing_content, 0, &mut out);
        }
        out
    }
}
