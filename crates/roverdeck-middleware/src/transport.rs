//! Persistent control link to the remote actuator.
//!
//! [`TransportChannel`] owns one outbound WebSocket.  It connects lazily:
//! nothing happens until the first [`send`][TransportChannel::send] (or an
//! explicit [`ensure_connection`][TransportChannel::ensure_connection]), and
//! after a drop the next send starts a fresh attempt.  Sends never wait for
//! the network and never fail; while the link is not open, or the peer has
//! stopped reading and the short write queue is full, the command is logged
//! and discarded.
//!
//! ```text
//!            ensure_connection()            handshake ok
//!   Idle ──────────────────────────▶ Connecting ───────────▶ Open
//!    ▲                                   │                    │
//!    └───────── handshake failed ────────┘◀── close / error ──┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::{SinkExt, StreamExt};
use roverdeck_types::ControlCommand;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::sink::{CommandSink, SendOutcome};

/// Default control endpoint of the vehicle gateway.
pub const DEFAULT_CONTROL_URL: &str = "ws://localhost:4800/ws/control";

/// Frames accepted ahead of the socket writer before sends start dropping.
pub const WRITE_QUEUE_DEPTH: usize = 16;

/// Coarse link state reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Connecting,
    Open,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Idle => write!(f, "idle"),
            LinkStatus::Connecting => write!(f, "connecting"),
            LinkStatus::Open => write!(f, "open"),
        }
    }
}

/// Counters accumulated over the lifetime of a [`TransportChannel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub sent: u64,
    pub dropped: u64,
    pub connection_attempts: u64,
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    dropped: AtomicU64,
    connection_attempts: AtomicU64,
}

/// Each connection attempt gets its own generation so a stale link task can
/// never clobber the state of a newer attempt.
#[derive(Debug)]
enum LinkState {
    Idle,
    Connecting {
        generation: u64,
    },
    Open {
        generation: u64,
        frames: mpsc::Sender<String>,
    },
}

impl LinkState {
    fn generation(&self) -> Option<u64> {
        match self {
            LinkState::Idle => None,
            LinkState::Connecting { generation } | LinkState::Open { generation, .. } => {
                Some(*generation)
            }
        }
    }
}

/// Lazily-connected, best-effort WebSocket client.
#[derive(Debug)]
pub struct TransportChannel {
    url: String,
    link: Arc<Mutex<LinkState>>,
    counters: Counters,
    next_generation: AtomicU64,
}

impl TransportChannel {
    /// Create an idle channel targeting `url`.  No connection is attempted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            link: Arc::new(Mutex::new(LinkState::Idle)),
            counters: Counters::default(),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> LinkStatus {
        match *lock(&self.link) {
            LinkState::Idle => LinkStatus::Idle,
            LinkState::Connecting { .. } => LinkStatus::Connecting,
            LinkState::Open { .. } => LinkStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status() == LinkStatus::Open
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            sent: self.counters.sent.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            connection_attempts: self.counters.connection_attempts.load(Ordering::Relaxed),
        }
    }

    /// Start a connection attempt unless one is already open or in flight.
    ///
    /// The handshake runs on a spawned task; this call returns immediately.
    /// Outside a Tokio runtime there is nothing to run the link on, so the
    /// channel stays idle and every send is dropped.
    pub fn ensure_connection(&self) {
        let mut link = lock(&self.link);
        if !matches!(*link, LinkState::Idle) {
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            warn!(url = %self.url, "no async runtime available; control link stays idle");
            return;
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        *link = LinkState::Connecting { generation };
        self.counters.connection_attempts.fetch_add(1, Ordering::Relaxed);
        debug!(url = %self.url, generation, "opening control link");

        handle.spawn(run_link(
            self.url.clone(),
            generation,
            Arc::clone(&self.link),
        ));
    }

    /// Serialize `command` and hand it to the open link.
    ///
    /// Calls [`ensure_connection`][Self::ensure_connection] first, so a send
    /// while idle both drops this command and starts the reconnect that lets
    /// the next one through.
    pub fn send(&self, command: &ControlCommand) -> SendOutcome {
        self.ensure_connection();

        let frame = match command.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(kind = command.kind(), error = %e, "failed to encode command; dropping");
                return self.dropped();
            }
        };

        let link = lock(&self.link);
        let result = match &*link {
            LinkState::Open { frames, .. } => frames.try_send(frame),
            _ => {
                debug!(kind = command.kind(), "control link not open; dropping command");
                return self.dropped();
            }
        };

        match result {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Sent
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind = command.kind(), "control link write queue full; dropping command");
                self.dropped()
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(kind = command.kind(), "control link writer gone; dropping command");
                self.dropped()
            }
        }
    }

    fn dropped(&self) -> SendOutcome {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        SendOutcome::Dropped
    }

    /// Tear the link down.  The next send reconnects.
    pub fn close(&self) {
        let mut link = lock(&self.link);
        if link.generation().is_some() {
            info!(url = %self.url, "closing control link");
        }
        *link = LinkState::Idle;
    }
}

impl CommandSink for TransportChannel {
    fn send(&self, command: &ControlCommand) -> SendOutcome {
        TransportChannel::send(self, command)
    }
}

fn lock(link: &Mutex<LinkState>) -> MutexGuard<'_, LinkState> {
    link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reset to idle, but only if `generation` is still the current attempt.
fn release(link: &Mutex<LinkState>, generation: u64) {
    let mut state = lock(link);
    if state.generation() == Some(generation) {
        *state = LinkState::Idle;
    }
}

// -----------------------------------------------------------------------
// Link task
// -----------------------------------------------------------------------

async fn run_link(url: String, generation: u64, link: Arc<Mutex<LinkState>>) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            warn!(url = %url, error = %e, "control link connection failed");
            release(&link, generation);
            return;
        }
    };

    let (frames_tx, mut frames_rx) = mpsc::channel::<String>(WRITE_QUEUE_DEPTH);
    {
        let mut state = lock(&link);
        if state.generation() != Some(generation) {
            // Closed while the handshake was in flight.
            return;
        }
        *state = LinkState::Open {
            generation,
            frames: frames_tx,
        };
    }
    info!(url = %url, "control link open");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        tokio::select! {
            frame = frames_rx.recv() => {
                let Some(frame) = frame else {
                    // Sender dropped by close().
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                };
                if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                    warn!(url = %url, error = %e, "control link write failed");
                    break;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(url = %url, error = %e, "control link read failed");
                        break;
                    }
                    // No inbound protocol on the control link.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    release(&link, generation);
    info!(url = %url, "control link closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use roverdeck_types::{CommandPayload, CommandSource, DriveMode, Key, SteeringMode};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn drive_command(keys: Vec<Key>) -> ControlCommand {
        ControlCommand::new(
            CommandSource::Keyboard,
            CommandPayload::Drive {
                keys,
                drive_mode: DriveMode::Normal,
                steering_mode: SteeringMode::TwoWd,
            },
        )
    }

    async fn wait_for(channel: &TransportChannel, status: LinkStatus) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while channel.status() != status {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("link never reached {status}"));
    }

    #[test]
    fn send_without_runtime_is_dropped() {
        let channel = TransportChannel::new("ws://127.0.0.1:9");
        assert_eq!(channel.send(&drive_command(vec![Key::Forward])), SendOutcome::Dropped);
        assert_eq!(channel.status(), LinkStatus::Idle);
        let stats = channel.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.connection_attempts, 0);
    }

    #[tokio::test]
    async fn ensure_connection_is_idempotent_while_connecting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let channel = TransportChannel::new(url);

        channel.ensure_connection();
        channel.ensure_connection();
        channel.ensure_connection();

        assert_eq!(channel.stats().connection_attempts, 1);
        assert_ne!(channel.status(), LinkStatus::Idle);
    }

    #[tokio::test]
    async fn first_send_connects_and_later_sends_are_delivered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    return text.as_str().to_owned();
                }
            }
            String::new()
        });

        let channel = TransportChannel::new(url);
        // The link is not open yet: dropped, but the attempt has started.
        assert_eq!(channel.send(&drive_command(vec![Key::Forward])), SendOutcome::Dropped);
        assert_eq!(channel.stats().connection_attempts, 1);

        wait_for(&channel, LinkStatus::Open).await;
        assert_eq!(channel.send(&drive_command(vec![])), SendOutcome::Sent);

        let frame = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "drive");
        assert_eq!(json["keys"], serde_json::json!([]));

        let stats = channel.stats();
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.connection_attempts, 1);
    }

    #[tokio::test]
    async fn refused_connection_returns_to_idle_and_next_send_retries() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let channel = TransportChannel::new(format!("ws://{addr}"));

        channel.ensure_connection();
        wait_for(&channel, LinkStatus::Idle).await;
        assert_eq!(channel.stats().connection_attempts, 1);

        assert_eq!(channel.send(&drive_command(vec![])), SendOutcome::Dropped);
        assert_eq!(channel.stats().connection_attempts, 2);
    }

    #[tokio::test]
    async fn server_close_drops_link_until_next_send() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (hang_up_tx, hang_up_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _ = hang_up_rx.await;
            ws.close(None).await.unwrap();
            // Drain until the client acknowledges the close.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let channel = TransportChannel::new(url);
        channel.ensure_connection();
        wait_for(&channel, LinkStatus::Open).await;

        hang_up_tx.send(()).unwrap();
        wait_for(&channel, LinkStatus::Idle).await;

        channel.send(&drive_command(vec![Key::Backward]));
        assert_eq!(channel.stats().connection_attempts, 2);
    }

    #[test]
    fn stalled_writer_drops_frames_beyond_queue_depth() {
        let channel = TransportChannel::new("ws://127.0.0.1:9");
        let (frames_tx, mut frames_rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
        *lock(&channel.link) = LinkState::Open {
            generation: 1,
            frames: frames_tx,
        };

        for _ in 0..WRITE_QUEUE_DEPTH {
            assert_eq!(channel.send(&drive_command(vec![Key::Forward])), SendOutcome::Sent);
        }
        assert_eq!(channel.send(&drive_command(vec![])), SendOutcome::Dropped);
        assert_eq!(channel.send(&drive_command(vec![])), SendOutcome::Dropped);

        let stats = channel.stats();
        assert_eq!(stats.sent, WRITE_QUEUE_DEPTH as u64);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.connection_attempts, 0);

        // Once the writer catches up there is room again.
        frames_rx.try_recv().unwrap();
        assert_eq!(channel.send(&drive_command(vec![])), SendOutcome::Sent);
    }

    #[test]
    fn send_after_writer_exit_is_dropped() {
        let channel = TransportChannel::new("ws://127.0.0.1:9");
        let (frames_tx, frames_rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
        drop(frames_rx);
        *lock(&channel.link) = LinkState::Open {
            generation: 1,
            frames: frames_tx,
        };

        assert_eq!(channel.send(&drive_command(vec![])), SendOutcome::Dropped);
        assert_eq!(channel.stats().dropped, 1);
    }

    #[tokio::test]
    async fn close_resets_to_idle() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let channel = TransportChannel::new(url);

        channel.ensure_connection();
        channel.close();
        assert_eq!(channel.status(), LinkStatus::Idle);
        assert!(!channel.is_open());
    }
}
