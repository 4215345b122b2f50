//! Outbound command envelope.
//!
//! Every message sent to the remote actuator is one flat JSON object whose
//! `type` field selects the payload shape:
//!
//! ```json
//! {"type":"drive","source":"keyboard","timestamp":1718000000000,
//!  "keys":["w"],"driveMode":"NORMAL","steeringMode":"2WD"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DeckError;
use crate::control::{CommandSource, DriveMode, Key, LightTarget, PanDirection, SteeringMode};

/// Type-specific fields of a [`ControlCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum CommandPayload {
    /// Aggregate drive-key membership changed.
    Drive {
        keys: Vec<Key>,
        drive_mode: DriveMode,
        steering_mode: SteeringMode,
    },
    /// Analog gamepad state changed. Values are normalized to `[0, 1]`
    /// (`steering` to `[-1, 1]`).
    Gamepad {
        throttle: f64,
        brake: f64,
        steering: f64,
    },
    Mode {
        mode: DriveMode,
    },
    Steering {
        mode: SteeringMode,
    },
    /// A camera-axis key was asserted (`active = true`) or fully released.
    CameraPan {
        direction: PanDirection,
        active: bool,
    },
    CameraSelect {
        camera_id: String,
    },
    CameraVector {
        x: f64,
        y: f64,
    },
    LedToggle {
        target: LightTarget,
    },
    LaserToggle {
        target: LightTarget,
    },
    LedIntensity {
        value: u8,
    },
    DisplayProfileCycle,
}

impl CommandPayload {
    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandPayload::Drive { .. } => "drive",
            CommandPayload::Gamepad { .. } => "gamepad",
            CommandPayload::Mode { .. } => "mode",
            CommandPayload::Steering { .. } => "steering",
            CommandPayload::CameraPan { .. } => "camera-pan",
            CommandPayload::CameraSelect { .. } => "camera-select",
            CommandPayload::CameraVector { .. } => "camera-vector",
            CommandPayload::LedToggle { .. } => "led-toggle",
            CommandPayload::LaserToggle { .. } => "laser-toggle",
            CommandPayload::LedIntensity { .. } => "led-intensity",
            CommandPayload::DisplayProfileCycle => "display-profile-cycle",
        }
    }
}

/// One outbound message.  Built fresh for every state change and discarded
/// once handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub source: CommandSource,
    /// Milliseconds since the Unix epoch on the wire.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: CommandPayload,
}

impl ControlCommand {
    /// Stamp `payload` with the current time.
    pub fn new(source: CommandSource, payload: CommandPayload) -> Self {
        Self {
            source,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    /// Serialize into the single-line JSON frame sent over the socket.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::Serialization`] if the encoder rejects the
    /// envelope.
    pub fn to_json(&self) -> Result<String, DeckError> {
        serde_json::to_string(self).map_err(|e| DeckError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn drive_envelope_is_flat_with_type_tag() {
        let cmd = ControlCommand::new(
            CommandSource::Keyboard,
            CommandPayload::Drive {
                keys: vec![Key::Forward],
                drive_mode: DriveMode::Normal,
                steering_mode: SteeringMode::TwoWd,
            },
        );
        let json: Value = serde_json::from_str(&cmd.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "drive");
        assert_eq!(json["source"], "keyboard");
        assert_eq!(json["keys"], serde_json::json!(["w"]));
        assert_eq!(json["driveMode"], "NORMAL");
        assert_eq!(json["steeringMode"], "2WD");
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn unit_payload_carries_only_envelope_fields() {
        let cmd = ControlCommand::new(CommandSource::Ui, CommandPayload::DisplayProfileCycle);
        let json: Value = serde_json::from_str(&cmd.to_json().unwrap()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj["type"], "display-profile-cycle");
        assert_eq!(obj.len(), 3, "type, source and timestamp only: {obj:?}");
    }

    #[test]
    fn camera_select_uses_camel_case_field() {
        let cmd = ControlCommand::new(
            CommandSource::Ui,
            CommandPayload::CameraSelect {
                camera_id: "rear".to_string(),
            },
        );
        let json: Value = serde_json::from_str(&cmd.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "camera-select");
        assert_eq!(json["cameraId"], "rear");
    }

    #[test]
    fn kind_matches_serialized_tag() {
        let payloads = [
            CommandPayload::Mode { mode: DriveMode::Boost },
            CommandPayload::Steering { mode: SteeringMode::FourWd },
            CommandPayload::CameraPan { direction: PanDirection::Left, active: true },
            CommandPayload::CameraVector { x: 0.5, y: -0.25 },
            CommandPayload::LedToggle { target: LightTarget::Front },
            CommandPayload::LaserToggle { target: LightTarget::Sweep },
            CommandPayload::LedIntensity { value: 40 },
            CommandPayload::Gamepad { throttle: 1.0, brake: 0.0, steering: 0.0 },
        ];
        for payload in payloads {
            let json = serde_json::to_value(&payload).unwrap();
            assert_eq!(json["type"], payload.kind());
        }
    }

    #[test]
    fn envelope_parses_back() {
        let raw = r#"{"type":"led-intensity","source":"ui","timestamp":1700000000000,"value":70}"#;
        let cmd: ControlCommand = serde_json::from_str(raw).unwrap();
        assert_eq!(cmd.source, CommandSource::Ui);
        assert_eq!(cmd.payload, CommandPayload::LedIntensity { value: 70 });
    }
}
