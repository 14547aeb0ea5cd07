//! Live status feed client.
//!
//! Runs on its own thread: connect, send the subscribe message, forward every
//! parsed snapshot to the board queue, and on any disconnect wait out a capped
//! exponential backoff before reconnecting. Malformed messages are logged and
//! skipped; they never end the session. Errors that cannot clear up on their
//! own (bad URL, board queue gone) stop the client instead.

#![allow(missing_docs)]

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use tungstenite::client::IntoClientRequest;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{HandshakeError, Message, WebSocket};

use crate::core::config::FeedConfig;
use crate::core::errors::{Result, SfbError};
use crate::daemon::orchestrator::BoardCommand;
use crate::daemon::signals::SignalHandler;
use crate::feed::snapshot::StatusSnapshot;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// How often a blocked read wakes up to check for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Bound on the TCP connect and on the opening handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type FeedSocket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Doubling delay between reconnect attempts, capped, reset on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// Delay to wait now; the following call returns double, up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// Turn one frame into a snapshot. `None` for frames that carry no data
/// (ping, pong, close, raw frames).
pub fn decode_message(message: Message) -> Option<Result<StatusSnapshot>> {
    match message {
        Message::Text(text) => Some(StatusSnapshot::parse(&text)),
        Message::Binary(bytes) => Some(match std::str::from_utf8(&bytes) {
            Ok(text) => StatusSnapshot::parse(text),
            Err(err) => Err(SfbError::FeedParse {
                details: format!("binary frame is not UTF-8: {err}"),
            }),
        }),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}

/// Subscribe message sent once per connection.
#[must_use]
pub fn subscribe_message(event: &str) -> String {
    serde_json::json!({ "event": event }).to_string()
}

enum SessionEnd {
    Shutdown,
    Closed(String),
}

pub struct FeedClient {
    url: String,
    subscribe_event: String,
    backoff: Backoff,
    commands: Sender<BoardCommand>,
    signals: SignalHandler,
    logger: ActivityLoggerHandle,
}

impl FeedClient {
    #[must_use]
    pub fn new(
        cfg: &FeedConfig,
        commands: Sender<BoardCommand>,
        signals: SignalHandler,
        logger: ActivityLoggerHandle,
    ) -> Self {
        Self {
            url: cfg.url.clone(),
            subscribe_event: cfg.subscribe_event.clone(),
            backoff: Backoff::new(
                Duration::from_millis(cfg.reconnect_initial_ms),
                Duration::from_millis(cfg.reconnect_max_ms),
            ),
            commands,
            signals,
            logger,
        }
    }

    pub fn spawn(self) -> Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("sfb-feed".to_string())
            .spawn(move || self.run())
            .map_err(|err| SfbError::Runtime {
                details: format!("failed to spawn feed thread: {err}"),
            })
    }

    fn run(mut self) {
        while !self.signals.should_shutdown() {
            let reason = match self.session() {
                Ok(SessionEnd::Shutdown) => return,
                Ok(SessionEnd::Closed(reason)) => reason,
                Err(err) if !err.is_retryable() => {
                    if !self.signals.should_shutdown() {
                        eprintln!("[SFB-FEED] giving up: {err}");
                        self.logger.send(ActivityEvent::from_error(&err));
                    }
                    return;
                }
                Err(err) => err.to_string(),
            };
            let delay = self.backoff.next_delay();
            let retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            eprintln!("[SFB-FEED] disconnected ({reason}); reconnecting in {retry_in_ms}ms");
            self.logger.send(ActivityEvent::FeedDisconnected {
                reason,
                retry_in_ms,
            });
            if !self.signals.sleep_unless_shutdown(delay) {
                return;
            }
        }
    }

    fn session(&mut self) -> Result<SessionEnd> {
        let mut socket = connect(&self.url, CONNECT_TIMEOUT)?;
        set_read_timeout(&socket, POLL_INTERVAL)?;
        socket.send(Message::Text(subscribe_message(&self.subscribe_event)))?;
        self.backoff.reset();
        eprintln!("[SFB-FEED] connected to {}", self.url);
        self.logger.send(ActivityEvent::FeedConnected {
            url: self.url.clone(),
        });

        loop {
            if self.signals.should_shutdown() {
                let _ = socket.close(None);
                return Ok(SessionEnd::Shutdown);
            }
            let message = match socket.read() {
                Ok(message) => message,
                Err(tungstenite::Error::Io(err))
                    if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(SessionEnd::Closed("connection closed".to_string()));
                }
                Err(err) => return Err(err.into()),
            };
            if let Message::Close(frame) = &message {
                let reason = frame.as_ref().map_or_else(
                    || "closed by peer".to_string(),
                    |f| format!("closed by peer: {}", f.reason),
                );
                return Ok(SessionEnd::Closed(reason));
            }
            match decode_message(message) {
                None => {}
                Some(Ok(snapshot)) => {
                    if self.commands.send(BoardCommand::Snapshot(snapshot)).is_err() {
                        let _ = socket.close(None);
                        return Err(SfbError::ChannelClosed { component: "feed" });
                    }
                }
                Some(Err(err)) => {
                    eprintln!("[SFB-FEED] rejected message: {err}");
                    self.logger.send(ActivityEvent::FeedMessageRejected {
                        code: err.code().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}

/// Open the WebSocket with `timeout` bounding both the TCP connect and the
/// handshake, so an unreachable host cannot hold the thread past shutdown.
fn connect(url: &str, timeout: Duration) -> Result<FeedSocket> {
    let request = url.into_client_request()?;
    let uri = request.uri();
    let port = match uri.scheme_str() {
        Some("wss") => uri.port_u16().unwrap_or(443),
        Some("ws") => uri.port_u16().unwrap_or(80),
        _ => {
            return Err(SfbError::InvalidConfig {
                details: format!("feed.url {url:?} must use ws:// or wss://"),
            });
        }
    };
    let host = uri
        .host()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_string())
        .ok_or_else(|| SfbError::InvalidConfig {
            details: format!("feed.url {url:?} has no host"),
        })?;

    let stream = connect_stream(&host, port, timeout)?;
    let feed_err = |err: io::Error| SfbError::Feed {
        details: format!("failed to set socket timeouts: {err}"),
    };
    stream.set_read_timeout(Some(timeout)).map_err(feed_err)?;
    stream.set_write_timeout(Some(timeout)).map_err(feed_err)?;

    match tungstenite::client_tls(request, stream) {
        Ok((socket, _response)) => Ok(socket),
        Err(HandshakeError::Failure(err)) => Err(err.into()),
        Err(HandshakeError::Interrupted(_)) => Err(SfbError::Feed {
            details: format!("handshake with {host}:{port} timed out"),
        }),
    }
}

fn connect_stream(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|err| SfbError::Feed {
            details: format!("cannot resolve {host}:{port}: {err}"),
        })?;
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(SfbError::Feed {
        details: last_err.map_or_else(
            || format!("{host}:{port} resolved to no addresses"),
            |err| format!("connect to {host}:{port} failed: {err}"),
        ),
    })
}

fn set_read_timeout(socket: &FeedSocket, timeout: Duration) -> Result<()> {
    let stream = match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream,
        MaybeTlsStream::Rustls(tls) => tls.get_ref(),
        _ => return Ok(()),
    };
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|err| SfbError::Feed {
            details: format!("failed to set read timeout: {err}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    use crate::feed::snapshot::NodeStatus;

    const WAIT: Duration = Duration::from_secs(5);

    fn feed_config(url: String) -> FeedConfig {
        FeedConfig {
            url,
            subscribe_event: "status".to_string(),
            reconnect_initial_ms: 10,
            reconnect_max_ms: 20,
            ..FeedConfig::default()
        }
    }

    #[test]
    fn backoff_doubles_up_to_cap_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn backoff_cap_never_below_initial() {
        let mut backoff = Backoff::new(Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
    }

    #[test]
    fn subscribe_message_names_the_event() {
        let value: serde_json::Value =
            serde_json::from_str(&subscribe_message("status")).expect("valid json");
        assert_eq!(value, serde_json::json!({ "event": "status" }));
    }

    #[test]
    fn text_and_binary_frames_decode() {
        let body = r#"[{"statusCode":"RUNNING"}]"#;
        let from_text = decode_message(Message::Text(body.to_string()))
            .expect("data frame")
            .expect("valid snapshot");
        let from_binary = decode_message(Message::Binary(body.as_bytes().to_vec()))
            .expect("data frame")
            .expect("valid snapshot");
        assert_eq!(from_text, from_binary);
        assert_eq!(from_text.len(), 1);
    }

    #[test]
    fn malformed_frames_are_parse_errors() {
        let err = decode_message(Message::Text(r#"{"statusCode":"RUNNING"}"#.to_string()))
            .expect("data frame")
            .unwrap_err();
        assert_eq!(err.code(), "SFB-3004");

        let err = decode_message(Message::Binary(vec![0xff, 0xfe]))
            .expect("data frame")
            .unwrap_err();
        assert_eq!(err.code(), "SFB-3004");
    }

    #[test]
    fn control_frames_carry_no_snapshot() {
        assert!(decode_message(Message::Ping(Vec::new())).is_none());
        assert!(decode_message(Message::Pong(Vec::new())).is_none());
        assert!(decode_message(Message::Close(None)).is_none());
    }

    #[test]
    fn session_forwards_snapshots_skips_bad_frames_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (subscribed_tx, subscribed_rx) = crossbeam_channel::unbounded();
        let server = thread::spawn(move || {
            for round in 0..2 {
                let (stream, _) = listener.accept().expect("accept");
                let mut ws = tungstenite::accept(stream).expect("server handshake");
                let first = ws.read().expect("subscribe frame");
                subscribed_tx
                    .send(first.into_text().expect("text frame"))
                    .expect("test still listening");
                if round == 0 {
                    ws.send(Message::Text("not json".to_string())).expect("send");
                    ws.send(Message::Text(
                        r#"[{"statusCode":"RUNNING"},{"statusCode":"OFFLINE"}]"#.to_string(),
                    ))
                    .expect("send");
                    ws.close(None).expect("close");
                }
                // Runs until the client hangs up.
                while ws.read().is_ok() {}
            }
        });

        let (commands_tx, commands_rx) = crossbeam_channel::bounded(4);
        let (logger, events) = ActivityLoggerHandle::capture(64);
        let signals = SignalHandler::detached();
        let client = FeedClient::new(
            &feed_config(format!("ws://{addr}")),
            commands_tx,
            signals.clone(),
            logger,
        )
        .spawn()
        .expect("spawn feed thread");

        let subscribe = subscribe_message("status");
        assert_eq!(subscribed_rx.recv_timeout(WAIT).expect("first subscribe"), subscribe);
        match commands_rx.recv_timeout(WAIT).expect("snapshot") {
            BoardCommand::Snapshot(snapshot) => {
                assert_eq!(snapshot.nodes(), &[NodeStatus::Running, NodeStatus::Offline]);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(subscribed_rx.recv_timeout(WAIT).expect("second subscribe"), subscribe);

        signals.request_shutdown();
        client.join().expect("feed thread");
        server.join().expect("server thread");
        assert!(commands_rx.try_recv().is_err(), "bad frame must not reach the board");

        let events: Vec<ActivityEvent> = events.try_iter().collect();
        let count = |pred: fn(&ActivityEvent) -> bool| events.iter().filter(|e| pred(e)).count();
        assert_eq!(count(|e| matches!(e, ActivityEvent::FeedConnected { .. })), 2);
        assert_eq!(count(|e| matches!(e, ActivityEvent::FeedMessageRejected { .. })), 1);
        assert_eq!(count(|e| matches!(e, ActivityEvent::FeedDisconnected { .. })), 1);
    }

    #[test]
    fn silent_server_hits_the_handshake_timeout() {
        // Accepted by the kernel backlog, never answered.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let started = Instant::now();
        let err = connect(&format!("ws://{addr}"), Duration::from_millis(200))
            .err()
            .expect("no handshake reply");
        assert_eq!(err.code(), "SFB-3003");
        assert!(err.is_retryable());
        assert!(started.elapsed() < WAIT, "took {:?}", started.elapsed());
        drop(listener);
    }

    #[test]
    fn refused_connection_is_retryable() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let err = connect(&format!("ws://{addr}"), Duration::from_secs(1))
            .err()
            .expect("nothing listening");
        assert_eq!(err.code(), "SFB-3003");
        assert!(err.is_retryable());
    }

    #[test]
    fn unusable_url_stops_the_client() {
        let (commands_tx, _commands_rx) = crossbeam_channel::bounded(1);
        let (logger, events) = ActivityLoggerHandle::capture(8);
        let client = FeedClient::new(
            &feed_config("http://127.0.0.1:1/feed".to_string()),
            commands_tx,
            SignalHandler::detached(),
            logger,
        )
        .spawn()
        .expect("spawn feed thread");

        // Returns on its own; nobody requested shutdown.
        client.join().expect("feed thread");
        let events: Vec<ActivityEvent> = events.try_iter().collect();
        assert!(
            matches!(events.as_slice(), [ActivityEvent::Error { code, .. }] if code == "SFB-1001"),
            "unexpected events {events:?}"
        );
    }
}
