//! Bus-wide configuration, as a builder-style struct mirroring the teacher's
//! `SocketOptions` (see `monocoque_core::options`).

use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::peer_id::PeerId;

/// Bus-wide configuration recognized by the core (directory, matcher, and
/// dispatch behavior).
///
/// The embedding process is responsible for logging, metrics, and the
/// persistence backend; this crate only reads the fields below.
#[derive(Debug, Clone)]
pub struct BusConfiguration {
    /// This process's peer identity.
    pub peer_id: PeerId,
    /// Deployment environment (`"Test"`, `"Staging"`, `"Production"`, ...).
    pub environment: String,
    /// Directory peer endpoints, tried in order.
    pub directory_endpoints: Vec<String>,
    /// Default batch size for newly created dispatch queues.
    pub default_batch_size: usize,
    /// Number of worker threads backing dispatch queues that don't request
    /// their own dedicated thread.
    pub worker_count: usize,
    /// Interval between directory liveness pings.
    pub ping_interval: Duration,
    /// When set, `get_peers_handling_message` consults only static
    /// subscriptions, ignoring the dynamic subtree entirely.
    pub disable_dynamic_subscriptions_for_directory_outgoing_messages: bool,
    /// Transport receive timeout; `None` blocks indefinitely.
    pub receive_timeout: Option<Duration>,
    /// Transport receive high water mark (queued-message cap).
    pub receive_high_water_mark: usize,
}

impl BusConfiguration {
    /// Start building a configuration for `peer_id` in `environment`.
    #[must_use]
    pub fn new(peer_id: PeerId, environment: impl Into<String>) -> Self {
        Self {
            peer_id,
            environment: environment.into(),
            directory_endpoints: Vec::new(),
            default_batch_size: 100,
            worker_count: num_cpus::get(),
            ping_interval: Duration::from_secs(5),
            disable_dynamic_subscriptions_for_directory_outgoing_messages: false,
            receive_timeout: None,
            receive_high_water_mark: 1000,
        }
    }

    /// Append a directory endpoint to try, in order.
    #[must_use]
    pub fn with_directory_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.directory_endpoints.push(endpoint.into());
        self
    }

    /// Replace the directory endpoint list wholesale.
    #[must_use]
    pub fn with_directory_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directory_endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Set the default dispatch-queue batch size.
    #[must_use]
    pub fn with_default_batch_size(mut self, batch_size: usize) -> Self {
        self.default_batch_size = batch_size;
        self
    }

    /// Set the worker thread pool size.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the directory liveness ping interval.
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Restrict outgoing routing decisions to static subscriptions only.
    #[must_use]
    pub fn with_dynamic_subscriptions_disabled_for_outgoing(mut self, disabled: bool) -> Self {
        self.disable_dynamic_subscriptions_for_directory_outgoing_messages = disabled;
        self
    }

    /// Set the transport receive timeout (`None` blocks indefinitely).
    #[must_use]
    pub fn with_receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Set the transport receive high water mark.
    #[must_use]
    pub fn with_receive_high_water_mark(mut self, hwm: usize) -> Self {
        self.receive_high_water_mark = hwm;
        self
    }

    /// Validate the configuration is usable at startup.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if no directory endpoint was
    /// configured or `default_batch_size` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.directory_endpoints.is_empty() {
            return Err(CoreError::Configuration("at least one directory endpoint is required".into()));
        }
        if self.default_batch_size == 0 {
            return Err(CoreError::Configuration("default_batch_size must be >= 1".into()));
        }
        Ok(())
    }
}
