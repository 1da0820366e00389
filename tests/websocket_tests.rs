//! Real websocket clients against a `BroadcastServer` on localhost.

use std::{
    io::ErrorKind,
    net::{SocketAddr, TcpStream},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use rstest::rstest;
use scribelog::{
    BroadcastConfig, BroadcastServer, BroadcastSink, FormatPipeline, LevelWindowBuilder,
    ScribeSink, ServiceLogger, SharedLevelTable, SinkRoute,
};
use tungstenite::{Message, WebSocket};

type Client = WebSocket<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

fn config(probe_interval: Duration) -> BroadcastConfig {
    let mut config = BroadcastConfig::default()
        .with_probe_interval(probe_interval)
        .with_poll_interval(Duration::from_millis(10));
    config.handshake_timeout = Duration::from_millis(500);
    config
}

fn start(config: BroadcastConfig) -> BroadcastServer {
    let sink = Arc::new(BroadcastSink::new(config).expect("broadcast sink"));
    BroadcastServer::bind("127.0.0.1:0", sink).expect("bind localhost")
}

fn connect(addr: SocketAddr) -> Client {
    let stream = TcpStream::connect(addr).expect("tcp connect");
    let url = format!("ws://{addr}/");
    let (ws, _) = tungstenite::client(url.as_str(), stream).expect("ws handshake");
    ws.get_ref()
        .set_read_timeout(Some(Duration::from_millis(20)))
        .expect("read timeout");
    ws
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

/// Read until a text frame arrives. Pings are answered on the next read.
fn read_text(ws: &mut Client) -> Option<String> {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        match ws.read() {
            Ok(Message::Text(text)) => return Some(text),
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(_) => return None,
        }
    }
    None
}

/// Keep reading (and so answering pings) for `period`.
fn pump(ws: &mut Client, period: Duration) {
    let deadline = Instant::now() + period;
    while Instant::now() < deadline {
        let _ = ws.read();
    }
}

#[rstest]
fn relays_between_clients_and_delivers_log_records() {
    let server = start(config(Duration::from_secs(30)));
    let sink = Arc::clone(server.sink());

    let mut first = connect(server.local_addr());
    assert!(wait_until(|| sink.subscriber_count() == 1));
    let mut second = connect(server.local_addr());
    assert!(wait_until(|| sink.subscriber_count() == 2));

    assert_eq!(read_text(&mut first).as_deref(), Some("Client connected"));

    first
        .send(Message::Text("hello from first".into()))
        .expect("client send");
    assert_eq!(read_text(&mut second).as_deref(), Some("hello from first"));

    let window = LevelWindowBuilder::new()
        .with_min("error")
        .with_max("box")
        .build(&SharedLevelTable::default())
        .expect("valid window");
    let logger = ServiceLogger::new(
        "deploy",
        vec![SinkRoute::shared(
            FormatPipeline::broadcast(window),
            Arc::clone(&sink) as Arc<dyn ScribeSink>,
        )],
    );
    assert_eq!(logger.success("release 1.2 live", ()), 1);
    assert_eq!(read_text(&mut first).as_deref(), Some("release 1.2 live"));
    assert_eq!(read_text(&mut second).as_deref(), Some("release 1.2 live"));

    let stopper = thread::spawn(move || {
        server.stop();
        server
    });
    pump(&mut first, Duration::from_millis(200));
    pump(&mut second, Duration::from_millis(200));
    let server = stopper.join().expect("stop thread");

    assert!(sink.is_closed());
    assert_eq!(sink.subscriber_count(), 0);
    assert_eq!(sink.timer_cancellations(), 1);
    server.stop();
    assert_eq!(sink.timer_cancellations(), 1);
}

#[rstest]
fn responsive_client_survives_probing_and_silent_one_is_evicted() {
    let server = start(config(Duration::from_millis(100)));
    let sink = Arc::clone(server.sink());

    let _silent = connect(server.local_addr());
    assert!(wait_until(|| sink.subscriber_count() == 1));
    let mut live = connect(server.local_addr());
    assert!(wait_until(|| sink.subscriber_count() == 2));

    let deadline = Instant::now() + WAIT;
    while sink.subscriber_count() > 1 && Instant::now() < deadline {
        pump(&mut live, Duration::from_millis(50));
    }
    pump(&mut live, Duration::from_millis(300));

    let subscribers = sink.subscribers();
    assert_eq!(subscribers.len(), 1);
    assert!(subscribers[0].last_pong_at.is_some());

    let stopper = thread::spawn(move || server.stop());
    pump(&mut live, Duration::from_millis(200));
    stopper.join().expect("stop thread");
}
