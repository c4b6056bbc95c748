//! Meshbus Core
//!
//! Runtime-agnostic data model and matching engine shared by the dispatch
//! and facade crates:
//! - Peer identity and directory-visible state (`peer_id`, `peer`, `descriptor`)
//! - Message type identity and routing-content extraction (`message_type`, `routing`)
//! - Binding keys and subscription matching (`binding_key`, `subscription`, `matcher`)
//! - The peer repository (`repository`)
//! - The wire codec (`transport_message`)
//! - Bus-wide configuration (`config`)
//! - Error types (`error`)

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod binding_key;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod matcher;
pub mod message_type;
pub mod peer;
pub mod peer_id;
pub mod repository;
pub mod routing;
pub mod subscription;
pub mod transport_message;

// A small prelude to make downstream crates ergonomic. Kept minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::binding_key::{BindingKey, BindingToken};
    pub use crate::config::BusConfiguration;
    pub use crate::descriptor::PeerDescriptor;
    pub use crate::error::{CoreError, Result};
    pub use crate::matcher::{SubscriptionKind, SubscriptionMatcher};
    pub use crate::message_type::{MessageTypeId, RoutableMessage};
    pub use crate::peer::Peer;
    pub use crate::peer_id::PeerId;
    pub use crate::repository::PeerRepository;
    pub use crate::routing::RoutingContent;
    pub use crate::subscription::{Subscription, SubscriptionsForType};
    pub use crate::transport_message::{Originator, TransportMessage};
}
