//! Tunables for the broadcast sink and its websocket server.

use std::time::Duration;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_MISSED_PROBES: u32 = 2;
pub const DEFAULT_JOIN_NOTICE: &str = "Client connected";
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for [`BroadcastSink`](super::BroadcastSink) and
/// [`BroadcastServer`](super::BroadcastServer).
///
/// A subscriber is evicted at the start of a probe round once it has left
/// `max_missed_probes` consecutive probes unanswered, so with the default of
/// two a single lost probe never costs a healthy peer its connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastConfig {
    pub probe_interval: Duration,
    pub max_missed_probes: u32,
    pub join_notice: String,
    /// Per-connection queue of frames waiting for the socket.
    pub outbound_capacity: usize,
    /// How long a connection thread blocks in `read` before servicing its
    /// outbound queue.
    pub poll_interval: Duration,
    pub handshake_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            probe_interval: DEFAULT_PROBE_INTERVAL,
            max_missed_probes: DEFAULT_MAX_MISSED_PROBES,
            join_notice: DEFAULT_JOIN_NOTICE.to_owned(),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl BroadcastConfig {
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_max_missed_probes(mut self, misses: u32) -> Self {
        self.max_missed_probes = misses;
        self
    }

    pub fn with_join_notice(mut self, notice: impl Into<String>) -> Self {
        self.join_notice = notice.into();
        self
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.probe_interval.is_zero() {
            return Err("probe_interval must be greater than zero".into());
        }
        if self.max_missed_probes == 0 {
            return Err("max_missed_probes must be at least one".into());
        }
        if self.outbound_capacity == 0 {
            return Err("outbound_capacity must be greater than zero".into());
        }
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be greater than zero".into());
        }
        Ok(())
    }
}
