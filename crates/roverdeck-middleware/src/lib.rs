//! `roverdeck-middleware` – plumbing between the console components.
//!
//! Routes data between the input side, the simulator and external clients
//! without caring about its meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, topic-based publish/subscribe event bus built on
//!   Tokio broadcast channels.
//! - [`slot`] – Observable latest-value slots for `ControlState` and
//!   `TelemetrySnapshot`.
//! - [`sink`] – The [`CommandSink`] seam the aggregator sends through.
//! - [`transport`] – Lazily-connected WebSocket control link to the vehicle.

pub mod bus;
pub mod sink;
pub mod slot;
pub mod transport;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use sink::{CommandSink, RecordingSink, SendOutcome};
pub use slot::StateSlot;
pub use transport::{DEFAULT_CONTROL_URL, LinkStatus, TransportChannel, TransportStats};
