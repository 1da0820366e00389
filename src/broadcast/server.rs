//! Websocket transport for [`BroadcastSink`].
//!
//! One accept thread polls a non-blocking listener. Each accepted socket gets
//! its own I/O thread that alternates between draining the connection's
//! outbound queue and a short, timed-out `read`. Liveness probes travel as
//! websocket Ping frames and the peer's Pong marks it alive; application code
//! only ever sees text.

use std::{
    io,
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use log::{debug, warn};
use parking_lot::Mutex;
use tungstenite::{Message, WebSocket};

use super::{BroadcastConfig, BroadcastSink, ConnectionLost, SubscriberConnection, SubscriberId};

enum Outbound {
    Text(String),
    Probe,
    Close,
}

/// Queue-backed connection handle held by the sink.
struct WsConnection {
    tx: Sender<Outbound>,
}

impl SubscriberConnection for WsConnection {
    fn send_text(&mut self, text: &str) -> Result<(), ConnectionLost> {
        self.tx
            .try_send(Outbound::Text(text.to_owned()))
            .map_err(|_| ConnectionLost)
    }

    fn send_probe(&mut self) -> Result<(), ConnectionLost> {
        self.tx.try_send(Outbound::Probe).map_err(|_| ConnectionLost)
    }

    fn close(&mut self) {
        let _ = self.tx.try_send(Outbound::Close);
    }
}

/// Websocket listener feeding subscribers into a [`BroadcastSink`].
pub struct BroadcastServer {
    local_addr: SocketAddr,
    sink: Arc<BroadcastSink>,
    stopping: Arc<AtomicBool>,
    accept_handle: Mutex<Option<JoinHandle<()>>>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BroadcastServer {
    pub fn bind<A: ToSocketAddrs>(addr: A, sink: Arc<BroadcastSink>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let stopping = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(Mutex::new(Vec::new()));

        let accept_handle = {
            let sink = Arc::clone(&sink);
            let stopping = Arc::clone(&stopping);
            let connections = Arc::clone(&connections);
            thread::Builder::new()
                .name("scribelog-ws-accept".into())
                .spawn(move || accept_loop(listener, sink, stopping, connections))?
        };
        debug!("broadcast: listening on {local_addr}");
        Ok(Self {
            local_addr,
            sink,
            stopping,
            accept_handle: Mutex::new(Some(accept_handle)),
            connections,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn sink(&self) -> &Arc<BroadcastSink> {
        &self.sink
    }

    /// Stop accepting, notify the sink that the host is closing and wait for
    /// every connection thread. Idempotent.
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.accept_handle.lock().take()
            && handle.join().is_err()
        {
            warn!("broadcast: accept thread panicked");
        }
        self.sink.host_closed();
        let handles = std::mem::take(&mut *self.connections.lock());
        for handle in handles {
            if handle.join().is_err() {
                warn!("broadcast: connection thread panicked");
            }
        }
    }
}

impl Drop for BroadcastServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: TcpListener,
    sink: Arc<BroadcastSink>,
    stopping: Arc<AtomicBool>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
) {
    let poll = sink.config().poll_interval;
    while !stopping.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("broadcast: connection from {peer}");
                let sink = Arc::clone(&sink);
                let spawned = thread::Builder::new()
                    .name(format!("scribelog-ws-{peer}"))
                    .spawn(move || serve_connection(stream, &sink));
                match spawned {
                    Ok(handle) => {
                        let mut handles = connections.lock();
                        handles.retain(|h| !h.is_finished());
                        handles.push(handle);
                    }
                    Err(err) => warn!("broadcast: cannot spawn connection thread: {err}"),
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => thread::sleep(poll),
            Err(err) => {
                warn!("broadcast: accept failed: {err}");
                thread::sleep(poll);
            }
        }
    }
}

fn handshake(stream: TcpStream, config: &BroadcastConfig) -> io::Result<WebSocket<TcpStream>> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(config.handshake_timeout))?;
    stream.set_write_timeout(Some(config.write_timeout))?;
    let ws = tungstenite::accept(stream).map_err(|err| io::Error::other(err.to_string()))?;
    ws.get_ref().set_read_timeout(Some(config.poll_interval))?;
    Ok(ws)
}

fn serve_connection(stream: TcpStream, sink: &BroadcastSink) {
    let config = sink.config();
    let mut ws = match handshake(stream, config) {
        Ok(ws) => ws,
        Err(err) => {
            debug!("broadcast: handshake failed: {err}");
            return;
        }
    };
    let (tx, rx) = bounded(config.outbound_capacity);
    let Some(id) = sink.accept(Box::new(WsConnection { tx })) else {
        let _ = ws.close(None);
        let _ = ws.flush();
        return;
    };
    run_connection(&mut ws, id, &rx, sink);
}

enum Step {
    Continue,
    Closing,
    Done,
}

fn run_connection(
    ws: &mut WebSocket<TcpStream>,
    id: SubscriberId,
    rx: &Receiver<Outbound>,
    sink: &BroadcastSink,
) {
    let close_grace = sink.config().handshake_timeout;
    let mut closing: Option<Instant> = None;
    loop {
        match closing {
            None => match drain_outbound(ws, rx) {
                Step::Continue => {}
                Step::Closing => closing = Some(Instant::now()),
                Step::Done => break,
            },
            Some(since) if since.elapsed() > close_grace => break,
            Some(_) => {}
        }
        match ws.read() {
            Ok(Message::Text(text)) if closing.is_none() => {
                sink.relay(id, &text);
            }
            Ok(Message::Pong(_)) => {
                sink.record_pong(id);
            }
            Ok(Message::Close(_)) => {
                // tungstenite queues the close reply; flush it before leaving.
                let _ = ws.flush();
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                let _ = ws.flush();
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => break,
            Err(err) => {
                debug!("broadcast: subscriber {id} read failed: {err}");
                break;
            }
        }
    }
    sink.disconnect(id);
}

/// Write every queued frame. `Closing` means a close handshake was started.
fn drain_outbound(ws: &mut WebSocket<TcpStream>, rx: &Receiver<Outbound>) -> Step {
    loop {
        let frame = match rx.try_recv() {
            Ok(Outbound::Text(text)) => Message::Text(text),
            Ok(Outbound::Probe) => Message::Ping(Vec::new()),
            Ok(Outbound::Close) | Err(TryRecvError::Disconnected) => {
                return match ws.close(None) {
                    Ok(()) => Step::Closing,
                    Err(_) => Step::Done,
                };
            }
            Err(TryRecvError::Empty) => return Step::Continue,
        };
        if let Err(err) = ws.send(frame) {
            debug!("broadcast: write failed: {err}");
            return Step::Done;
        }
    }
}
