//! `roverdeck-types` – shared vocabulary of the operator console core.
//!
//! - [`control`] – logical keys, input sources, drive/steering modes and the
//!   merged [`ControlState`].
//! - [`command`] – the outbound [`ControlCommand`] wire envelope.
//! - [`telemetry`] – [`TelemetrySnapshot`] and its [`SampleWindow`] series.
//!
//! Events routed over the in-process bus and the crate-wide [`DeckError`]
//! live at the crate root.

pub mod command;
pub mod control;
pub mod telemetry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use command::{CommandPayload, ControlCommand};
pub use control::{
    CommandSource, ControlState, DriveMode, GamepadButtonEdge, Key, KeyAxis, KeySource,
    LightTarget, PanDirection, SteeringMode,
};
pub use telemetry::{GeoPosition, Orientation, SampleWindow, TelemetrySnapshot, TemperatureReading};

/// Unified event wrapper for the in-process event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"roverdeck-control::aggregator"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    /// A new merged control state.
    ControlState(ControlState),
    /// A new telemetry frame (simulated or live).
    Telemetry(TelemetrySnapshot),
    /// A command handed to the transport.
    Command(ControlCommand),
    /// The first connected gamepad appeared or went away.
    GamepadConnection { connected: bool },
    /// A button press or release edge.
    GamepadButton(GamepadButtonEdge),
}

/// Error type shared by every RoverDeck crate.
///
/// None of these are fatal to the console: callers log and carry on.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeckError {
    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    #[error("Config Error: {0}")]
    Config(String),
}
