//! The `Peer` value: identity, transport endpoint, and liveness flags.

use serde::{Deserialize, Serialize};

use crate::peer_id::PeerId;

/// A bus endpoint: identity plus the transport-layer address other peers use
/// to reach it, and the two liveness flags the directory tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Stable identity of this peer.
    pub id: PeerId,
    /// Transport-layer address (e.g. `tcp://host:port`).
    pub endpoint: String,
    /// Whether the peer is currently considered connected.
    pub is_up: bool,
    /// Whether the peer is currently answering liveness pings.
    pub is_responding: bool,
}

impl Peer {
    /// Construct a peer that is up and responding (the state right after registration).
    #[must_use]
    pub fn new(id: PeerId, endpoint: impl Into<String>) -> Self {
        Self {
            id,
            endpoint: endpoint.into(),
            is_up: true,
            is_responding: true,
        }
    }
}
