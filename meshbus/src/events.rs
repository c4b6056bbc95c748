//! Directory events published as peer state transitions are applied.
//!
//! Mirrors the teacher's event-enum-plus-handler-dispatch shape used for
//! socket/connection lifecycle notifications, but over peer lifecycle
//! instead of socket lifecycle.

use chrono::{DateTime, Utc};
use meshbus_core::descriptor::PeerDescriptor;
use meshbus_core::peer::Peer;
use meshbus_core::peer_id::PeerId;
use meshbus_core::subscription::SubscriptionsForType;

/// A peer was registered, carrying its full descriptor.
#[derive(Debug, Clone)]
pub struct PeerStarted(pub PeerDescriptor);

/// A peer was unregistered.
#[derive(Debug, Clone)]
pub struct PeerStopped(pub Peer);

/// A peer was permanently removed; its dynamic subscriptions are gone too.
#[derive(Debug, Clone)]
pub struct PeerDecommissioned(pub PeerId);

/// A peer's descriptor (static subscriptions, endpoint, ...) changed.
#[derive(Debug, Clone)]
pub struct PeerSubscriptionsUpdated(pub PeerDescriptor);

/// The partitioned add/remove list from one `update_subscriptions` call,
/// carried as-is so replicas apply the same partition the persister did.
#[derive(Debug, Clone)]
pub struct PeerSubscriptionsForTypesUpdated {
    /// The peer the update applies to.
    pub peer_id: PeerId,
    /// The single instant used for every repository call this update made.
    pub timestamp_utc: DateTime<Utc>,
    /// The original list, unpartitioned.
    pub entries: Vec<SubscriptionsForType>,
}

/// A peer answered a liveness ping.
#[derive(Debug, Clone)]
pub struct PeerResponding(pub PeerId);

/// A peer failed to answer a liveness ping within the configured window.
#[derive(Debug, Clone)]
pub struct PeerNotResponding(pub PeerId);

/// Resets a peer's last-ping clock to now.
#[derive(Debug, Clone)]
pub struct PingPeerCommand(pub PeerId);

/// Requests the directory's current view of all registered peers.
#[derive(Debug, Clone)]
pub struct RegisterPeerCommand;

/// Reply to [`RegisterPeerCommand`].
#[derive(Debug, Clone)]
pub struct RegisterPeerResponse(pub Vec<PeerDescriptor>);

/// What changed about a peer, as surfaced to local subscribers of
/// [`PeerUpdated`]. `Responding`/`NotResponding` both map to `Updated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerAction {
    /// The peer was just registered.
    Started,
    /// The peer was unregistered.
    Stopped,
    /// The peer was permanently removed.
    Decommissioned,
    /// Any other state change (subscriptions, liveness).
    Updated,
}

/// Raised by every directory event handler after it applies a state change.
#[derive(Debug, Clone)]
pub struct PeerUpdated {
    /// The peer that changed.
    pub peer_id: PeerId,
    /// What kind of change this was.
    pub action: PeerAction,
}
