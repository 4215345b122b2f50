//! Operator control vocabulary: logical keys, input sources, modes and the
//! canonical [`ControlState`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DeckError;

/// Which logical axis a [`Key`] steers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAxis {
    /// Vehicle motion (`w`, `a`, `s`, `d`).
    Drive,
    /// Camera pan (arrow keys / right stick).
    Camera,
}

/// A logical input, independent of the physical device that asserted it.
///
/// Keyboard and gamepad both map onto this set so that their assertions can
/// be merged per key.  The serialized form matches the lower-cased DOM key
/// name the console has always put on the wire (`"w"`, `"arrowup"`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Key {
    #[serde(rename = "w")]
    Forward,
    #[serde(rename = "a")]
    Left,
    #[serde(rename = "s")]
    Backward,
    #[serde(rename = "d")]
    Right,
    #[serde(rename = "arrowup")]
    CameraUp,
    #[serde(rename = "arrowdown")]
    CameraDown,
    #[serde(rename = "arrowleft")]
    CameraLeft,
    #[serde(rename = "arrowright")]
    CameraRight,
}

impl Key {
    /// Every logical key, drive keys first.
    pub const ALL: [Key; 8] = [
        Key::Forward,
        Key::Left,
        Key::Backward,
        Key::Right,
        Key::CameraUp,
        Key::CameraDown,
        Key::CameraLeft,
        Key::CameraRight,
    ];

    pub fn axis(self) -> KeyAxis {
        match self {
            Key::Forward | Key::Left | Key::Backward | Key::Right => KeyAxis::Drive,
            _ => KeyAxis::Camera,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Key::Forward => "w",
            Key::Left => "a",
            Key::Backward => "s",
            Key::Right => "d",
            Key::CameraUp => "arrowup",
            Key::CameraDown => "arrowdown",
            Key::CameraLeft => "arrowleft",
            Key::CameraRight => "arrowright",
        }
    }

    /// Pan direction for camera-axis keys; `None` for drive keys.
    pub fn pan_direction(self) -> Option<PanDirection> {
        match self {
            Key::CameraUp => Some(PanDirection::Up),
            Key::CameraDown => Some(PanDirection::Down),
            Key::CameraLeft => Some(PanDirection::Left),
            Key::CameraRight => Some(PanDirection::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Key {
    type Err = DeckError;

    /// Accepts DOM key names in any case (`"W"`, `"ArrowUp"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Key::ALL
            .into_iter()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| DeckError::InvalidInput(format!("unknown key '{s}'")))
    }
}

/// Physical device class that asserted a [`Key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    Keyboard,
    Gamepad,
}

impl KeySource {
    pub const ALL: [KeySource; 2] = [KeySource::Keyboard, KeySource::Gamepad];
}

impl FromStr for KeySource {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyboard" => Ok(KeySource::Keyboard),
            "gamepad" => Ok(KeySource::Gamepad),
            other => Err(DeckError::InvalidInput(format!("unknown key source '{other}'"))),
        }
    }
}

/// Originator recorded on every outbound command envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandSource {
    Keyboard,
    Gamepad,
    /// Discrete UI actions (buttons, selectors, REPL).
    Ui,
}

impl From<KeySource> for CommandSource {
    fn from(source: KeySource) -> Self {
        match source {
            KeySource::Keyboard => CommandSource::Keyboard,
            KeySource::Gamepad => CommandSource::Gamepad,
        }
    }
}

/// Power profile of the drivetrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriveMode {
    Eco,
    #[default]
    Normal,
    Boost,
}

impl DriveMode {
    /// Next mode in the ECO → NORMAL → BOOST → ECO cycle.
    pub fn next(self) -> Self {
        match self {
            DriveMode::Eco => DriveMode::Normal,
            DriveMode::Normal => DriveMode::Boost,
            DriveMode::Boost => DriveMode::Eco,
        }
    }
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveMode::Eco => write!(f, "ECO"),
            DriveMode::Normal => write!(f, "NORMAL"),
            DriveMode::Boost => write!(f, "BOOST"),
        }
    }
}

impl FromStr for DriveMode {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ECO" => Ok(DriveMode::Eco),
            "NORMAL" => Ok(DriveMode::Normal),
            "BOOST" => Ok(DriveMode::Boost),
            _ => Err(DeckError::InvalidInput(format!("unknown drive mode '{s}'"))),
        }
    }
}

/// Number of driven axles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SteeringMode {
    #[default]
    #[serde(rename = "2WD")]
    TwoWd,
    #[serde(rename = "4WD")]
    FourWd,
}

impl SteeringMode {
    pub fn next(self) -> Self {
        match self {
            SteeringMode::TwoWd => SteeringMode::FourWd,
            SteeringMode::FourWd => SteeringMode::TwoWd,
        }
    }
}

impl fmt::Display for SteeringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SteeringMode::TwoWd => write!(f, "2WD"),
            SteeringMode::FourWd => write!(f, "4WD"),
        }
    }
}

impl FromStr for SteeringMode {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "2WD" | "TWO_WD" => Ok(SteeringMode::TwoWd),
            "4WD" | "FOUR_WD" => Ok(SteeringMode::FourWd),
            _ => Err(DeckError::InvalidInput(format!("unknown steering mode '{s}'"))),
        }
    }
}

/// Direction carried by a `camera-pan` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Light / laser emitter addressed by toggle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightTarget {
    Front,
    Sweep,
}

impl FromStr for LightTarget {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "front" => Ok(LightTarget::Front),
            "sweep" => Ok(LightTarget::Sweep),
            other => Err(DeckError::InvalidInput(format!("unknown light target '{other}'"))),
        }
    }
}

/// A button transition detected by diffing two consecutive polled frames.
///
/// Only exists for the polling tick that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamepadButtonEdge {
    pub index: usize,
    pub pressed: bool,
}

/// The canonical, merged operator control state.
///
/// Only the input aggregator produces new versions; every reader receives
/// its own clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    pub active_keys: BTreeSet<Key>,
    /// Normalized throttle in `[0, 1]`.
    pub throttle: f64,
    /// Normalized brake in `[0, 1]`.
    pub brake: f64,
    pub drive_mode: DriveMode,
    pub steering_mode: SteeringMode,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            active_keys: BTreeSet::new(),
            throttle: 0.0,
            brake: 0.0,
            drive_mode: DriveMode::Normal,
            steering_mode: SteeringMode::TwoWd,
        }
    }
}

impl ControlState {
    pub fn is_active(&self, key: Key) -> bool {
        self.active_keys.contains(&key)
    }

    /// Active keys on the drive axis, in canonical order.
    pub fn drive_keys(&self) -> Vec<Key> {
        self.active_keys
            .iter()
            .copied()
            .filter(|k| k.axis() == KeyAxis::Drive)
            .collect()
    }
}
