//! Live broadcast channel for log records.
//!
//! [`BroadcastSink`] keeps the set of live subscriber connections and fans
//! every rendered record out to them. Transport details live behind
//! [`SubscriberConnection`]; [`BroadcastServer`] provides the websocket
//! transport.

use std::fmt;

use thiserror::Error;

mod config;
mod hub;
mod server;

pub use config::{
    BroadcastConfig, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_JOIN_NOTICE, DEFAULT_MAX_MISSED_PROBES,
    DEFAULT_OUTBOUND_CAPACITY, DEFAULT_POLL_INTERVAL, DEFAULT_PROBE_INTERVAL,
    DEFAULT_WRITE_TIMEOUT,
};
pub use hub::{BroadcastSink, ProbeReport, SubscriberInfo};
pub use server::BroadcastServer;

/// The peer is gone. Subscribers that report this are evicted silently.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("subscriber connection lost")]
pub struct ConnectionLost;

/// Identifier assigned to a subscriber when it is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outbound half of a subscriber connection.
///
/// Implementations must not block: a connection that cannot take a frame
/// right away should report [`ConnectionLost`].
pub trait SubscriberConnection: Send {
    fn send_text(&mut self, text: &str) -> Result<(), ConnectionLost>;

    /// Send a liveness probe using a control frame distinct from text.
    fn send_probe(&mut self) -> Result<(), ConnectionLost>;

    fn close(&mut self);
}
