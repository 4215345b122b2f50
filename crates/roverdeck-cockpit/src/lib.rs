//! `roverdeck-cockpit` – WebSocket bridge between the console and its UI host.
//!
//! Boots a small WebSocket server (default port `8080`) that:
//!
//! 1. **Streams** the console downstream: on connect the latest
//!    [`ControlState`] and [`TelemetrySnapshot`], then every event published
//!    on the console's event bus as one JSON text frame each.
//!
//! 2. **Accepts** upstream [`HostMessage`]s from the UI host (keyboard edges,
//!    mode selectors, camera and light actions, the manual yaw dial, and raw
//!    gamepad frames) and forwards them to the control task.
//!
//! Plain HTTP requests are answered with `426 Upgrade Required`; rendering
//! belongs to the host.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roverdeck_cockpit::CockpitServer;
//! use roverdeck_hal::SharedGamepad;
//! use roverdeck_middleware::{EventBus, TransportChannel};
//! use roverdeck_runtime::{Console, ConsoleConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let gamepad = SharedGamepad::new();
//!     let link = Arc::new(TransportChannel::new(roverdeck_middleware::DEFAULT_CONTROL_URL));
//!     let console = Console::new(
//!         ConsoleConfig::default(),
//!         link,
//!         Box::new(gamepad.clone()),
//!         EventBus::default(),
//!     );
//!     let (handle, _task) = console.spawn();
//!     CockpitServer::new(handle, gamepad)
//!         .run()
//!         .await
//!         .expect("cockpit server failed");
//! }
//! ```
//!
//! [`ControlState`]: roverdeck_types::ControlState
//! [`TelemetrySnapshot`]: roverdeck_types::TelemetrySnapshot

pub mod protocol;
pub mod server;

pub use protocol::{HostMessage, route};
pub use server::{CockpitServer, DEFAULT_PORT};
