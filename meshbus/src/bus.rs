//! `Bus`: wires the directory, matcher-backed dispatch, and transport
//! together per the data-flow described in SPEC_FULL.md §2.

use std::sync::Arc;

use bytes::Bytes;
use meshbus_core::config::BusConfiguration;
use meshbus_core::descriptor::PeerDescriptor;
use meshbus_core::matcher::{SubscriptionKind, SubscriptionMatcher};
use meshbus_core::message_type::MessageTypeId;
use meshbus_core::peer_id::PeerId;
use meshbus_core::routing::RoutingContent;
use meshbus_core::subscription::SubscriptionsForType;
use meshbus_core::transport_message::{Originator, TransportMessage};
use meshbus_dispatch::dispatcher::MessageDispatcher;
use meshbus_dispatch::invoker::{DispatchedMessage, HandlerInvoker};
use meshbus_dispatch::pipe::Pipe;

use crate::directory::PeerDirectory;
use crate::error::{BusError, Result};
use crate::transport::TransportEndpoint;

/// The bus facade: one per local peer. Owns the directory, the subscription
/// matcher, the dispatcher, and a handle to the transport it publishes
/// outbound frames through.
pub struct Bus {
    config: BusConfiguration,
    directory: PeerDirectory,
    matcher: SubscriptionMatcher,
    dispatcher: MessageDispatcher,
    transport: Arc<dyn TransportEndpoint>,
}

impl Bus {
    /// Build a bus for `config`, publishing outbound frames through
    /// `transport`. Validates `config` up front; startup errors never
    /// reach in-flight dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Configuration`] if `config` is invalid.
    pub fn new(config: BusConfiguration, transport: Arc<dyn TransportEndpoint>, pipes: Vec<Arc<dyn Pipe>>) -> Result<Self> {
        config.validate().map_err(|e| BusError::Configuration(e.to_string()))?;
        let directory = PeerDirectory::new(
            config.peer_id.clone(),
            config.disable_dynamic_subscriptions_for_directory_outgoing_messages,
        );
        let dispatcher = MessageDispatcher::new(config.default_batch_size, pipes);
        Ok(Self { config, directory, matcher: SubscriptionMatcher::new(), dispatcher, transport })
    }

    /// This bus's configuration.
    #[must_use]
    pub fn config(&self) -> &BusConfiguration {
        &self.config
    }

    /// The peer directory.
    #[must_use]
    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    /// The subscription matcher.
    #[must_use]
    pub fn matcher(&self) -> &SubscriptionMatcher {
        &self.matcher
    }

    /// The message dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &MessageDispatcher {
        &self.dispatcher
    }

    /// Register this bus's local peer with `static_subscriptions`, seeding
    /// both the directory and the matcher's static sub-trees.
    pub fn register(&self, static_subscriptions: Vec<meshbus_core::subscription::Subscription>) {
        let peer = meshbus_core::peer::Peer::new(self.config.peer_id.clone(), self.transport_endpoint());
        let descriptor = PeerDescriptor::new(peer, false, static_subscriptions.clone());
        self.directory.register(descriptor);
        for sub in &static_subscriptions {
            self.matcher.add(&self.config.peer_id, sub, SubscriptionKind::Static);
        }
    }

    /// Unregister the local peer.
    pub fn unregister(&self) {
        self.directory.unregister(&self.config.peer_id);
    }

    /// Add or remove dynamic subscriptions for the local peer, updating the
    /// directory and the matcher's dynamic sub-trees identically.
    pub fn update_subscriptions(&self, entries: Vec<SubscriptionsForType>) {
        for entry in &entries {
            if entry.is_removal() {
                if let Some(desc) = self.directory.get(&self.config.peer_id) {
                    if let Some(bindings) = desc.dynamic_subscriptions_by_type.get(&entry.type_id) {
                        for binding_key in bindings {
                            let sub = meshbus_core::subscription::Subscription::new(entry.type_id.clone(), binding_key.clone());
                            self.matcher.remove(&self.config.peer_id, &sub, SubscriptionKind::Dynamic);
                        }
                    }
                }
            } else {
                for binding_key in &entry.bindings {
                    let sub = meshbus_core::subscription::Subscription::new(entry.type_id.clone(), binding_key.clone());
                    self.matcher.add(&self.config.peer_id, &sub, SubscriptionKind::Dynamic);
                }
            }
        }
        self.directory.update_subscriptions(&self.config.peer_id, entries);
    }

    /// Resolve the peers whose subscriptions match `(type_id, routing_content)`
    /// via the matcher (the fast path the directory's own
    /// `get_peers_handling_message` is the replicated/slow-path equivalent of).
    #[must_use]
    pub fn peers_handling(&self, type_id: &MessageTypeId, routing_content: &RoutingContent) -> std::collections::HashSet<PeerId> {
        let include_dynamic = !self.config.disable_dynamic_subscriptions_for_directory_outgoing_messages;
        self.matcher.peers_handling(type_id, routing_content, include_dynamic)
    }

    /// Register a handler invoker for inbound messages of its declared type.
    pub fn register_handler(&self, queue_name: impl Into<String>, invoker: Arc<dyn HandlerInvoker>) {
        self.dispatcher.register(queue_name, invoker);
    }

    /// Deserialize an inbound wire frame and dispatch it to every registered,
    /// filter-permitted handler for its type.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] if the frame is malformed, or
    /// propagates a [`BusError::Dispatch`] from enqueueing.
    pub fn dispatch_frame(&self, frame: &[u8]) -> Result<usize> {
        let (message, ok) = meshbus_core::transport_message::read(frame);
        if !ok {
            return Err(BusError::Transport("malformed transport frame".into()));
        }
        let sender_id = PeerId::new(message.originator.sender_id.clone());
        let dispatched = DispatchedMessage { message_type_id: message.message_type_id, content: message.content };
        self.dispatcher.dispatch(sender_id, dispatched, message.environment).map_err(BusError::from)
    }

    /// Build and send a `TransportMessage` for `content` to every peer whose
    /// subscriptions match `(type_id, routing_content)`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] if the send fails.
    pub fn publish(&self, type_id: MessageTypeId, routing_content: &RoutingContent, content: Bytes) -> Result<usize> {
        let targets = self.peers_handling(&type_id, routing_content);
        let originator = Originator {
            sender_id: self.config.peer_id.to_string(),
            sender_endpoint: self.transport_endpoint(),
            sender_machine: String::new(),
            initiator_user: String::new(),
        };
        let message = TransportMessage::new(type_id, content, originator, self.config.environment.clone());
        let frame = meshbus_core::transport_message::write(&message);
        for _ in &targets {
            self.transport.send(frame.clone())?;
        }
        Ok(targets.len())
    }

    fn transport_endpoint(&self) -> String {
        self.config.directory_endpoints.first().cloned().unwrap_or_default()
    }
}
