//! # Meshbus
//!
//! A peer-to-peer service bus: participants ("peers") exchange typed
//! messages over a pluggable transport, discover each other through a
//! replicated directory, and route messages by structured binding-key
//! subscriptions.
//!
//! ## Architecture
//!
//! - **`meshbus-core`**: data model, binding-key matcher, peer repository,
//!   wire codec, configuration.
//! - **`meshbus-dispatch`**: named dispatch queues, pipe invocation, the
//!   cooperative scheduler.
//! - **`meshbus`** (this crate): the Peer Directory, the transport contract,
//!   and the [`Bus`] facade tying them together.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meshbus::prelude::*;
//! use meshbus_core::peer_id::PeerId;
//!
//! let config = BusConfiguration::new(PeerId::new("Abc.Service.0"), "Test")
//!     .with_directory_endpoint("tcp://directory:4200");
//! let (transport, _peer) = ChannelTransport::pair();
//! let bus = Bus::new(config, Arc::new(transport), vec![]).expect("valid configuration");
//! bus.register(vec![]);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod bus;
pub mod dev_tracing;
pub mod directory;
pub mod error;
pub mod events;
pub mod transport;

pub mod prelude {
    //! The commonly-used types, re-exported for convenient `use meshbus::prelude::*;`.
    pub use crate::bus::Bus;
    pub use crate::directory::{PeerDirectory, PeerUpdatedHandler};
    pub use crate::error::{BusError, Result};
    pub use crate::events::{
        PeerAction, PeerDecommissioned, PeerNotResponding, PeerResponding, PeerStarted, PeerStopped,
        PeerSubscriptionsForTypesUpdated, PeerSubscriptionsUpdated, PeerUpdated, PingPeerCommand,
        RegisterPeerCommand, RegisterPeerResponse,
    };
    pub use crate::transport::{ChannelTransport, TransportEndpoint};
    pub use meshbus_core::config::BusConfiguration;
}
