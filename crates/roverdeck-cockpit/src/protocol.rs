//! Upstream wire format: what the UI host may send over the cockpit socket.
//!
//! Every frame is a JSON object tagged by `"type"`:
//!
//! ```json
//! {"type":"key","key":"w","active":true}
//! {"type":"drive-mode","mode":"BOOST"}
//! {"type":"camera-select","cameraId":"rear"}
//! {"type":"gamepad-frame","frame":{"axes":[0,-1,0,0],"buttons":[]}}
//! ```

use roverdeck_hal::{GamepadFrame, SharedGamepad};
use roverdeck_runtime::ConsoleInput;
use roverdeck_types::{DriveMode, Key, KeySource, LightTarget, PanDirection, SteeringMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    /// Browser keyboard edge.
    Key { key: Key, active: bool },
    DriveMode { mode: DriveMode },
    CycleDriveMode,
    SteeringMode { mode: SteeringMode },
    CycleSteering,
    CameraSelect {
        #[serde(rename = "cameraId")]
        camera_id: String,
    },
    CameraPan { direction: PanDirection },
    CameraVector { x: f64, y: f64 },
    LedToggle { target: LightTarget },
    LaserToggle { target: LightTarget },
    LedIntensity { value: i32 },
    DisplayProfile,
    /// Absolute yaw from the heading dial, in degrees.
    Yaw { value: f64 },
    ClearYaw,
    Telemetry { connected: bool },
    /// Enable or disable gamepad polling.
    Gamepad { enabled: bool },
    /// Latest raw frame of the host's first gamepad; `null` once it is gone.
    GamepadFrame {
        #[serde(default)]
        frame: Option<GamepadFrame>,
    },
}

impl HostMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Translate `msg` into console input.
///
/// Gamepad frames do not go through the control task: they replace the
/// shared frame the sampler reads on its next poll, and `None` is returned.
pub fn route(msg: HostMessage, gamepad: &SharedGamepad) -> Option<ConsoleInput> {
    let input = match msg {
        HostMessage::Key { key, active } => ConsoleInput::Key {
            source: KeySource::Keyboard,
            key,
            active,
        },
        HostMessage::DriveMode { mode } => ConsoleInput::DriveMode(mode),
        HostMessage::CycleDriveMode => ConsoleInput::CycleDriveMode,
        HostMessage::SteeringMode { mode } => ConsoleInput::SteeringMode(mode),
        HostMessage::CycleSteering => ConsoleInput::CycleSteering,
        HostMessage::CameraSelect { camera_id } => ConsoleInput::SelectCamera(camera_id),
        HostMessage::CameraPan { direction } => ConsoleInput::PanCamera(direction),
        HostMessage::CameraVector { x, y } => ConsoleInput::CameraVector { x, y },
        HostMessage::LedToggle { target } => ConsoleInput::ToggleLed(target),
        HostMessage::LaserToggle { target } => ConsoleInput::ToggleLaser(target),
        HostMessage::LedIntensity { value } => ConsoleInput::LedIntensity(value),
        HostMessage::DisplayProfile => ConsoleInput::CycleDisplayProfile,
        HostMessage::Yaw { value } => ConsoleInput::ManualYaw(value),
        HostMessage::ClearYaw => ConsoleInput::ClearManualYaw,
        HostMessage::Telemetry { connected: true } => ConsoleInput::TelemetryConnect,
        HostMessage::Telemetry { connected: false } => ConsoleInput::TelemetryDisconnect,
        HostMessage::Gamepad { enabled: true } => ConsoleInput::GamepadStart,
        HostMessage::Gamepad { enabled: false } => ConsoleInput::GamepadStop,
        HostMessage::GamepadFrame { frame } => {
            gamepad.set_frame(frame);
            return None;
        }
    };
    Some(input)
}
