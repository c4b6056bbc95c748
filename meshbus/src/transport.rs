//! `TransportEndpoint`: the frame-in/frame-out contract the bus dispatches
//! over, plus an in-process channel-backed implementation for tests and demos.
//!
//! A real PUSH/PULL-style socket library is a collaborator that implements
//! the same trait; this crate never talks to the network directly (see
//! SPEC_FULL.md §6, "Transport socket contract").

use std::time::Duration;

use bytes::Bytes;

use crate::error::{BusError, Result};

/// Bind/receive/unbind contract for a frame-oriented transport.
///
/// `receive` yields one frame per call or `None` on timeout; any other
/// failure propagates as [`BusError::Transport`].
pub trait TransportEndpoint: Send + Sync {
    /// Bind to `endpoint`, returning the resolved address peers should use
    /// to reach this endpoint (may differ from the request, e.g. ephemeral
    /// port resolution).
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] if the endpoint cannot be bound.
    fn bind(&self, endpoint: &str) -> Result<String>;

    /// Send one frame to the bound peer.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] if the frame cannot be delivered.
    fn send(&self, frame: Bytes) -> Result<()>;

    /// Receive one frame, waiting at most `timeout`. Returns `None` on
    /// timeout expiry, which is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] for any failure other than "no
    /// message available within `timeout`".
    fn receive(&self, timeout: Option<Duration>) -> Result<Option<Bytes>>;

    /// Non-blocking teardown; safe to call more than once.
    fn unbind(&self);
}

/// An in-process, `flume`-channel-backed [`TransportEndpoint`] for tests and
/// demos. Two instances sharing the same pair of channels form a loopback
/// pipe; `bind` is a no-op that echoes the requested endpoint back.
pub struct ChannelTransport {
    endpoint: parking_lot::Mutex<Option<String>>,
    outbound: flume::Sender<Bytes>,
    inbound: flume::Receiver<Bytes>,
}

impl ChannelTransport {
    /// Build a connected pair: frames sent on one side arrive on the other.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = flume::unbounded();
        let (tx_b, rx_b) = flume::unbounded();
        (
            Self { endpoint: parking_lot::Mutex::new(None), outbound: tx_a, inbound: rx_b },
            Self { endpoint: parking_lot::Mutex::new(None), outbound: tx_b, inbound: rx_a },
        )
    }
}

impl TransportEndpoint for ChannelTransport {
    fn bind(&self, endpoint: &str) -> Result<String> {
        *self.endpoint.lock() = Some(endpoint.to_string());
        Ok(endpoint.to_string())
    }

    fn send(&self, frame: Bytes) -> Result<()> {
        self.outbound.send(frame).map_err(|_| BusError::Transport("peer disconnected".into()))
    }

    fn receive(&self, timeout: Option<Duration>) -> Result<Option<Bytes>> {
        match timeout {
            Some(timeout) => match self.inbound.recv_timeout(timeout) {
                Ok(frame) => Ok(Some(frame)),
                Err(flume::RecvTimeoutError::Timeout | flume::RecvTimeoutError::Disconnected) => Ok(None),
            },
            None => match self.inbound.recv() {
                Ok(frame) => Ok(Some(frame)),
                Err(flume::RecvError::Disconnected) => Ok(None),
            },
        }
    }

    fn unbind(&self) {
        *self.endpoint.lock() = None;
    }
}
