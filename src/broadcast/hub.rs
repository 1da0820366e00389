//! Subscriber set, fan-out and liveness probing.
//!
//! Every operation that touches the live set (accept, relay, broadcast,
//! probe rounds, disconnects and shutdown) runs under one mutex. Connections
//! that have to be closed are collected while the lock is held and closed
//! after it is released.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use log::{debug, warn};
use parking_lot::Mutex;

use super::{BroadcastConfig, SubscriberConnection, SubscriberId};
use crate::{
    formatter::Rendered,
    sink::{ScribeSink, SinkBuildError, SinkError, SinkHealth},
};

struct Subscriber {
    conn: Box<dyn SubscriberConnection>,
    is_alive: bool,
    missed_probes: u32,
    last_pong_at: Option<Instant>,
    connected_at: Instant,
}

type Evicted = Vec<(SubscriberId, Box<dyn SubscriberConnection>)>;

const BROADCAST_SINK_NAME: &str = "broadcast";

/// Outcome of one liveness round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Subscribers that were sent a probe.
    pub probed: usize,
    /// Subscribers removed, either unresponsive or unreachable.
    pub evicted: Vec<SubscriberId>,
}

/// Liveness details for one subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriberInfo {
    pub id: SubscriberId,
    pub is_alive: bool,
    pub missed_probes: u32,
    pub last_pong_at: Option<Instant>,
    pub connected_at: Instant,
}

struct Shared {
    subscribers: Mutex<BTreeMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    config: BroadcastConfig,
}

impl Shared {
    /// Send `text` to every live subscriber except `skip`, collecting the
    /// ones whose connection is gone.
    fn fan_out(
        subscribers: &mut BTreeMap<SubscriberId, Subscriber>,
        text: &str,
        skip: Option<SubscriberId>,
    ) -> (usize, Evicted) {
        let mut delivered = 0;
        let mut lost = Vec::new();
        for (id, sub) in subscribers.iter_mut() {
            if Some(*id) == skip {
                continue;
            }
            match sub.conn.send_text(text) {
                Ok(()) => delivered += 1,
                Err(_) => lost.push(*id),
            }
        }
        let evicted = lost
            .into_iter()
            .filter_map(|id| subscribers.remove(&id).map(|sub| (id, sub.conn)))
            .collect();
        (delivered, evicted)
    }

    fn probe_round(&self) -> ProbeReport {
        let max_missed = self.config.max_missed_probes;
        let (report, evicted) = {
            let mut subscribers = self.subscribers.lock();
            let mut unresponsive = Vec::new();
            for (id, sub) in subscribers.iter_mut() {
                if sub.is_alive {
                    sub.missed_probes = 0;
                } else {
                    sub.missed_probes += 1;
                }
                if sub.missed_probes >= max_missed {
                    unresponsive.push(*id);
                }
            }
            let mut evicted: Evicted = unresponsive
                .into_iter()
                .filter_map(|id| subscribers.remove(&id).map(|sub| (id, sub.conn)))
                .collect();

            let mut probed = 0;
            let mut lost = Vec::new();
            for (id, sub) in subscribers.iter_mut() {
                sub.is_alive = false;
                match sub.conn.send_probe() {
                    Ok(()) => probed += 1,
                    Err(_) => lost.push(*id),
                }
            }
            evicted.extend(
                lost.into_iter()
                    .filter_map(|id| subscribers.remove(&id).map(|sub| (id, sub.conn))),
            );
            let report = ProbeReport {
                probed,
                evicted: evicted.iter().map(|(id, _)| *id).collect(),
            };
            (report, evicted)
        };
        close_all(evicted);
        if !report.evicted.is_empty() {
            debug!("broadcast: evicted {} subscriber(s)", report.evicted.len());
        }
        report
    }
}

fn close_all(evicted: Evicted) {
    for (id, mut conn) in evicted {
        debug!("broadcast: closing subscriber {id}");
        conn.close();
    }
}

struct LivenessTimer {
    cancel_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl LivenessTimer {
    fn spawn(shared: Weak<Shared>, config: &BroadcastConfig) -> std::io::Result<Self> {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let interval = config.probe_interval;
        let handle = thread::Builder::new()
            .name("scribelog-liveness".into())
            .spawn(move || {
                loop {
                    match cancel_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let Some(shared) = shared.upgrade() else {
                                break;
                            };
                            shared.probe_round();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;
        Ok(Self { cancel_tx, handle })
    }

    fn cancel(self) {
        let _ = self.cancel_tx.try_send(());
        if self.handle.thread().id() == thread::current().id() {
            return;
        }
        if self.handle.join().is_err() {
            warn!("broadcast: liveness timer panicked");
        }
    }
}

/// Fans rendered records out to every live subscriber.
///
/// The sink owns a periodic liveness timer for its whole lifetime. An
/// explicit [`close`](ScribeSink::close) and the host's
/// [`host_closed`](Self::host_closed) notification share one shutdown path
/// that cancels the timer and closes every connection exactly once.
pub struct BroadcastSink {
    shared: Arc<Shared>,
    timer: Mutex<Option<LivenessTimer>>,
    timer_cancellations: AtomicU64,
    health: SinkHealth,
}

impl BroadcastSink {
    pub fn new(config: BroadcastConfig) -> Result<Self, SinkBuildError> {
        config.validate().map_err(SinkBuildError::InvalidConfig)?;
        let shared = Arc::new(Shared {
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            config,
        });
        let timer = LivenessTimer::spawn(Arc::downgrade(&shared), &shared.config)?;
        Ok(Self {
            shared,
            timer: Mutex::new(Some(timer)),
            timer_cancellations: AtomicU64::new(0),
            health: SinkHealth::new(BROADCAST_SINK_NAME),
        })
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.shared.config
    }

    /// Register a new subscriber and announce it to everyone else.
    ///
    /// Returns `None` (after closing the connection) once the sink has shut
    /// down.
    pub fn accept(&self, mut conn: Box<dyn SubscriberConnection>) -> Option<SubscriberId> {
        let mut subscribers = self.shared.subscribers.lock();
        if self.is_closed() {
            drop(subscribers);
            conn.close();
            return None;
        }
        let id = SubscriberId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (_, evicted) = Shared::fan_out(&mut subscribers, &self.shared.config.join_notice, None);
        subscribers.insert(
            id,
            Subscriber {
                conn,
                is_alive: true,
                missed_probes: 0,
                last_pong_at: None,
                connected_at: Instant::now(),
            },
        );
        drop(subscribers);
        debug!("broadcast: subscriber {id} connected");
        close_all(evicted);
        Some(id)
    }

    /// Relay inbound text from `from` to every other live subscriber.
    pub fn relay(&self, from: SubscriberId, text: &str) -> usize {
        let (delivered, evicted) = {
            let mut subscribers = self.shared.subscribers.lock();
            if !subscribers.contains_key(&from) {
                return 0;
            }
            Shared::fan_out(&mut subscribers, text, Some(from))
        };
        close_all(evicted);
        delivered
    }

    /// Send `text` to every live subscriber; returns how many accepted it.
    pub fn broadcast(&self, text: &str) -> usize {
        let (delivered, evicted) = {
            let mut subscribers = self.shared.subscribers.lock();
            Shared::fan_out(&mut subscribers, text, None)
        };
        close_all(evicted);
        delivered
    }

    /// Record a probe response.
    pub fn record_pong(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.shared.subscribers.lock();
        match subscribers.get_mut(&id) {
            Some(sub) => {
                sub.is_alive = true;
                sub.missed_probes = 0;
                sub.last_pong_at = Some(Instant::now());
                true
            }
            None => false,
        }
    }

    /// Remove a subscriber whose connection ended.
    pub fn disconnect(&self, id: SubscriberId) -> bool {
        let removed = self.shared.subscribers.lock().remove(&id);
        match removed {
            Some(sub) => {
                close_all(vec![(id, sub.conn)]);
                true
            }
            None => false,
        }
    }

    /// Run one liveness round immediately.
    pub fn probe_round(&self) -> ProbeReport {
        self.shared.probe_round()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }

    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        self.shared
            .subscribers
            .lock()
            .iter()
            .map(|(id, sub)| SubscriberInfo {
                id: *id,
                is_alive: sub.is_alive,
                missed_probes: sub.missed_probes,
                last_pong_at: sub.last_pong_at,
                connected_at: sub.connected_at,
            })
            .collect()
    }

    pub fn is_probing(&self) -> bool {
        self.timer.lock().is_some()
    }

    /// How many times the liveness timer has been cancelled (0 or 1).
    pub fn timer_cancellations(&self) -> u64 {
        self.timer_cancellations.load(Ordering::Acquire)
    }

    /// Notification that the hosting server is going away.
    pub fn host_closed(&self) -> bool {
        self.shutdown()
    }

    /// Cancel the timer and close every connection. Returns `false` when
    /// shutdown already ran.
    fn shutdown(&self) -> bool {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(timer) = self.timer.lock().take() {
            timer.cancel();
            self.timer_cancellations.fetch_add(1, Ordering::AcqRel);
        }
        let drained: Evicted = std::mem::take(&mut *self.shared.subscribers.lock())
            .into_iter()
            .map(|(id, sub)| (id, sub.conn))
            .collect();
        debug!("broadcast: shutting down, closing {} subscriber(s)", drained.len());
        close_all(drained);
        true
    }
}

impl ScribeSink for BroadcastSink {
    fn name(&self) -> &str {
        self.health.name()
    }

    fn write(&self, rendered: Rendered) -> Result<(), SinkError> {
        if self.is_closed() {
            let err = SinkError::Closed;
            self.health.report_dropped(&err);
            return Err(err);
        }
        self.broadcast(&rendered.to_text());
        Ok(())
    }

    fn close(&self) {
        self.shutdown();
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Drop for BroadcastSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}
