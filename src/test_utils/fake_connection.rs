//! In-memory subscriber connection that records what the sink sent it.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use crate::broadcast::{ConnectionLost, SubscriberConnection};

#[derive(Default)]
struct State {
    texts: Mutex<Vec<String>>,
    probes: AtomicUsize,
    closes: AtomicUsize,
    failing: AtomicBool,
}

/// Connection half handed to the sink.
pub struct FakeConnection {
    state: Arc<State>,
}

/// Test-side view of a [`FakeConnection`].
#[derive(Clone)]
pub struct FakeHandle {
    state: Arc<State>,
}

impl FakeConnection {
    pub fn new() -> (Self, FakeHandle) {
        let state = Arc::new(State::default());
        (
            Self {
                state: Arc::clone(&state),
            },
            FakeHandle { state },
        )
    }
}

impl SubscriberConnection for FakeConnection {
    fn send_text(&mut self, text: &str) -> Result<(), ConnectionLost> {
        if self.state.failing.load(Ordering::SeqCst) {
            return Err(ConnectionLost);
        }
        self.state.texts.lock().push(text.to_owned());
        Ok(())
    }

    fn send_probe(&mut self) -> Result<(), ConnectionLost> {
        if self.state.failing.load(Ordering::SeqCst) {
            return Err(ConnectionLost);
        }
        self.state.probes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl FakeHandle {
    pub fn texts(&self) -> Vec<String> {
        self.state.texts.lock().clone()
    }

    pub fn clear(&self) {
        self.state.texts.lock().clear();
    }

    pub fn probes(&self) -> usize {
        self.state.probes.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Make every later send report [`ConnectionLost`].
    pub fn fail_sends(&self) {
        self.state.failing.store(true, Ordering::SeqCst);
    }
}
