//! [`CockpitServer`] – WebSocket server for the UI host.
//!
//! Listens on `0.0.0.0:8080` (configurable via [`CockpitServer::with_port`]).
//!
//! * WebSocket upgrades → bidirectional bridge to the running console.
//! * Anything else → `426 Upgrade Required`.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use roverdeck_hal::SharedGamepad;
use roverdeck_runtime::ConsoleHandle;
use roverdeck_types::{DeckError, Event, EventPayload};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::protocol::{HostMessage, route};

/// Default TCP port for the cockpit WebSocket server.
pub const DEFAULT_PORT: u16 = 8080;

const SOURCE: &str = "roverdeck-cockpit::server";

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

/// Bridges a running console to every connected UI host.
#[derive(Clone)]
pub struct CockpitServer {
    console: ConsoleHandle,
    gamepad: SharedGamepad,
    port: u16,
}

impl CockpitServer {
    /// Serve `console` on the [`DEFAULT_PORT`].  Gamepad frames received
    /// from hosts are written into `gamepad`.
    pub fn new(console: ConsoleHandle, gamepad: SharedGamepad) -> Self {
        Self {
            console,
            gamepad,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind the configured port and serve until the console stops.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::Transport`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), DeckError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DeckError::Transport(format!("bind error on {addr}: {e}")))?;
        info!(port = self.port, "cockpit listening on ws://localhost:{}", self.port);
        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections from an already bound `listener`.  Returns once
    /// the console has shut down.
    pub async fn serve(self, listener: TcpListener) {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, peer).await {
                                warn!(%peer, error = %e, "cockpit client error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "cockpit accept error"),
                },
                _ = self.console.closed() => {
                    info!("console stopped, cockpit closing");
                    return;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Per-connection handling
    // -----------------------------------------------------------------------

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), DeckError> {
        // `peek` leaves the request in the socket for tungstenite's handshake.
        let mut buf = [0u8; 1024];
        let n = stream
            .peek(&mut buf)
            .await
            .map_err(|e| DeckError::Transport(format!("peek error from {peer}: {e}")))?;

        if is_websocket_upgrade(&buf[..n]) {
            self.handle_ws(stream, peer).await
        } else {
            reject_plain_http(stream).await
        }
    }

    async fn handle_ws(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), DeckError> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| DeckError::Transport(format!("WS handshake from {peer}: {e}")))?;
        info!(%peer, "cockpit host connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        // Subscribe before the snapshot so nothing published in between is lost.
        let mut bus_rx = self.console.bus().subscribe_all();

        let snapshot = [
            Event::new(SOURCE, EventPayload::ControlState(self.console.control_state())),
            Event::new(SOURCE, EventPayload::Telemetry(self.console.telemetry())),
        ];
        for event in &snapshot {
            let json = encode(event)?;
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                return Ok(());
            }
        }

        loop {
            tokio::select! {
                // ── Downstream: console → host ─────────────────────────────
                result = bus_rx.recv() => match result {
                    Ok(event) => match encode(&event) {
                        Ok(json) => {
                            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "dropping unencodable event"),
                    },
                    Err(RecvError::Lagged(n)) => warn!(%peer, skipped = n, "cockpit host lagged"),
                    Err(RecvError::Closed) => break,
                },
                // ── Upstream: host → console ───────────────────────────────
                msg = ws_rx.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if self.handle_upstream(text.as_str()).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                },
            }
        }

        info!(%peer, "cockpit host disconnected");
        Ok(())
    }

    /// Apply one upstream frame.  Malformed frames are logged and skipped;
    /// `Err` means the console is gone.
    async fn handle_upstream(&self, text: &str) -> Result<(), DeckError> {
        let msg = match HostMessage::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "ignoring malformed host message");
                return Ok(());
            }
        };
        match route(msg, &self.gamepad) {
            Some(input) => self.console.send(input).await,
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_websocket_upgrade(request: &[u8]) -> bool {
    String::from_utf8_lossy(request).lines().any(|line| {
        let line = line.to_lowercase();
        line.starts_with("upgrade:") && line.contains("websocket")
    })
}

fn encode(event: &Event) -> Result<String, DeckError> {
    serde_json::to_string(event).map_err(|e| DeckError::Serialization(e.to_string()))
}

async fn reject_plain_http(mut stream: TcpStream) -> Result<(), DeckError> {
    let body = "RoverDeck cockpit speaks WebSocket only.\n";
    let response = format!(
        "HTTP/1.1 426 Upgrade Required\r\n\
         Upgrade: websocket\r\n\
         Connection: close\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        body.len(),
        body
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| DeckError::Transport(format!("HTTP write error: {e}")))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use roverdeck_middleware::{EventBus, RecordingSink};
    use roverdeck_runtime::{Console, ConsoleConfig};
    use roverdeck_types::Key;
    use tokio::io::AsyncReadExt;
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;

    const WAIT: Duration = Duration::from_secs(5);

    async fn start() -> (SocketAddr, ConsoleHandle, RecordingSink, SharedGamepad) {
        let sink = RecordingSink::new();
        let gamepad = SharedGamepad::new();
        let console = Console::new(
            ConsoleConfig::default(),
            Arc::new(sink.clone()),
            Box::new(gamepad.clone()),
            EventBus::default(),
        );
        let (handle, _task) = console.spawn();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(CockpitServer::new(handle.clone(), gamepad.clone()).serve(listener));
        (addr, handle, sink, gamepad)
    }

    fn decode(msg: Message) -> Event {
        match msg {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[test]
    fn default_port_is_8080() {
        assert_eq!(DEFAULT_PORT, 8080);
    }

    #[test]
    fn upgrade_detection_is_case_insensitive() {
        assert!(is_websocket_upgrade(b"GET / HTTP/1.1\r\nUpgrade: WebSocket\r\n\r\n"));
        assert!(!is_websocket_upgrade(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n"));
    }

    #[tokio::test]
    async fn plain_http_gets_upgrade_required() {
        let (addr, _handle, _sink, _gamepad) = start().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        timeout(WAIT, stream.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();

        assert!(response.starts_with("HTTP/1.1 426"), "got: {response}");
    }

    #[tokio::test]
    async fn new_host_receives_snapshot_then_live_events() {
        let (addr, handle, sink, _gamepad) = start().await;
        let (mut ws, _) = connect_async(format!("ws://{addr}/")).await.unwrap();

        let first = decode(timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap());
        let second = decode(timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap());
        assert!(matches!(first.payload, EventPayload::ControlState(_)));
        assert!(matches!(second.payload, EventPayload::Telemetry(_)));
        assert_eq!(first.source, SOURCE);

        ws.send(Message::Text(r#"{"type":"key","key":"w","active":true}"#.into()))
            .await
            .unwrap();

        let pressed = timeout(WAIT, async {
            loop {
                let event = decode(ws.next().await.unwrap().unwrap());
                if let EventPayload::ControlState(state) = event.payload {
                    return state;
                }
            }
        })
        .await
        .unwrap();

        assert!(pressed.is_active(Key::Forward));
        assert!(handle.control_state().is_active(Key::Forward));
        assert_eq!(sink.kinds(), vec!["drive"]);
    }

    #[tokio::test]
    async fn malformed_frames_keep_the_session_open() {
        let (addr, handle, _sink, _gamepad) = start().await;
        let (mut ws, _) = connect_async(format!("ws://{addr}/")).await.unwrap();

        ws.send(Message::Text("{not json".into())).await.unwrap();
        ws.send(Message::Text(r#"{"type":"steering-mode","mode":"4WD"}"#.into()))
            .await
            .unwrap();

        let steered = timeout(WAIT, async {
            loop {
                let status = handle.status().await.unwrap();
                if status.control.steering_mode == roverdeck_types::SteeringMode::FourWd {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(steered.is_ok(), "valid frame after a malformed one was applied");
    }

    #[tokio::test]
    async fn gamepad_frames_reach_the_shared_device() {
        let (addr, _handle, _sink, gamepad) = start().await;
        let (mut ws, _) = connect_async(format!("ws://{addr}/")).await.unwrap();

        ws.send(Message::Text(
            r#"{"type":"gamepad-frame","frame":{"axes":[0.0,0.0,0.0,0.0],"buttons":[]}}"#.into(),
        ))
        .await
        .unwrap();

        let connected = timeout(WAIT, async {
            while !gamepad.is_connected() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(connected.is_ok());
    }

    #[tokio::test]
    async fn server_stops_with_the_console() {
        let sink = RecordingSink::new();
        let gamepad = SharedGamepad::new();
        let console = Console::new(
            ConsoleConfig::default(),
            Arc::new(sink),
            Box::new(gamepad.clone()),
            EventBus::default(),
        );
        let (handle, _task) = console.spawn();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let served = tokio::spawn(CockpitServer::new(handle.clone(), gamepad).serve(listener));

        handle.shutdown().await.unwrap();
        assert!(timeout(WAIT, served).await.is_ok());
    }
}
