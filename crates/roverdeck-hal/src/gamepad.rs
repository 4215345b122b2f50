//! Generic `GamepadDevice` trait and the raw frame it produces.
//!
//! A device is polled once per sampler tick and answers with a snapshot of
//! the first connected controller, or `None` when nothing is connected.
//! Drivers implement the trait; the sampler only ever talks to the trait, so
//! a host-fed device, a scripted test device and the null device are
//! interchangeable.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Index constants for the standard controller mapping.
pub mod layout {
    pub const LEFT_STICK_X: usize = 0;
    pub const LEFT_STICK_Y: usize = 1;
    pub const RIGHT_STICK_X: usize = 2;
    pub const RIGHT_STICK_Y: usize = 3;

    pub const BUTTON_A: usize = 0;
    pub const BUTTON_B: usize = 1;
    pub const BUTTON_X: usize = 2;
    pub const BUTTON_Y: usize = 3;
    pub const LEFT_BUMPER: usize = 4;
    pub const RIGHT_BUMPER: usize = 5;
    pub const LEFT_TRIGGER: usize = 6;
    pub const RIGHT_TRIGGER: usize = 7;
    pub const SELECT: usize = 8;
    pub const START: usize = 9;
    pub const DPAD_UP: usize = 12;
    pub const DPAD_DOWN: usize = 13;

    /// Axes reported by a standard controller.
    pub const AXIS_COUNT: usize = 4;
    /// Buttons reported by a standard controller.
    pub const BUTTON_COUNT: usize = 17;
}

/// One button as reported by the host.  Triggers are analog: `value` in
/// `[0, 1]`, `pressed` once past the host's own threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ButtonState {
    #[serde(default)]
    pub pressed: bool,
    #[serde(default)]
    pub value: f64,
}

/// Raw snapshot of one controller.
///
/// Values are exactly what the host reported; no dead-zone or clamping is
/// applied here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamepadFrame {
    #[serde(default)]
    pub axes: Vec<f64>,
    #[serde(default)]
    pub buttons: Vec<ButtonState>,
}

impl Default for GamepadFrame {
    fn default() -> Self {
        Self::neutral()
    }
}

impl GamepadFrame {
    /// A standard-layout frame with sticks centred and nothing pressed.
    pub fn neutral() -> Self {
        Self {
            axes: vec![0.0; layout::AXIS_COUNT],
            buttons: vec![ButtonState::default(); layout::BUTTON_COUNT],
        }
    }

    /// Axis `index`, or `0.0` when the device does not report it or reports
    /// a non-finite value.
    pub fn axis(&self, index: usize) -> f64 {
        self.axes
            .get(index)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    /// Button `index`, released when the device does not report it.
    pub fn button(&self, index: usize) -> ButtonState {
        self.buttons.get(index).copied().unwrap_or_default()
    }

    pub fn is_pressed(&self, index: usize) -> bool {
        self.button(index).pressed
    }

    pub fn with_axis(mut self, index: usize, value: f64) -> Self {
        if self.axes.len() <= index {
            self.axes.resize(index + 1, 0.0);
        }
        self.axes[index] = value;
        self
    }

    /// Press or release a digital button (`value` follows `pressed`).
    pub fn with_button(self, index: usize, pressed: bool) -> Self {
        let value = if pressed { 1.0 } else { 0.0 };
        self.with_button_state(index, ButtonState { pressed, value })
    }

    /// Set an analog button; it counts as pressed past half travel.
    pub fn with_trigger(self, index: usize, value: f64) -> Self {
        self.with_button_state(
            index,
            ButtonState {
                pressed: value > 0.5,
                value,
            },
        )
    }

    fn with_button_state(mut self, index: usize, state: ButtonState) -> Self {
        if self.buttons.len() <= index {
            self.buttons.resize(index + 1, ButtonState::default());
        }
        self.buttons[index] = state;
        self
    }
}

/// A source of controller snapshots.
pub trait GamepadDevice: Send {
    /// Human-readable driver name for logs.
    fn name(&self) -> &str;

    /// Snapshot of the first connected controller, `None` if none is.
    fn poll(&mut self) -> Option<GamepadFrame>;
}

impl<D: GamepadDevice + ?Sized> GamepadDevice for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn poll(&mut self) -> Option<GamepadFrame> {
        (**self).poll()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Null device
// ────────────────────────────────────────────────────────────────────────────

/// The device of a host without any controller support.  Never connected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGamepad;

impl GamepadDevice for NoGamepad {
    fn name(&self) -> &str {
        "none"
    }

    fn poll(&mut self) -> Option<GamepadFrame> {
        None
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Host-fed device
// ────────────────────────────────────────────────────────────────────────────

/// A device whose snapshots are pushed in from elsewhere (e.g. a browser
/// cockpit forwarding its own controller state).
///
/// Clones share the same slot: one clone is handed to the sampler, the other
/// to whoever receives frames from the host.  Polling returns the latest
/// pushed frame until it is replaced or cleared.
#[derive(Debug, Clone, Default)]
pub struct SharedGamepad {
    latest: Arc<Mutex<Option<GamepadFrame>>>,
}

impl SharedGamepad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot.  `None` means the host lost its
    /// controller.
    pub fn set_frame(&self, frame: Option<GamepadFrame>) {
        let mut latest = self.lock();
        if latest.is_some() != frame.is_some() {
            debug!(connected = frame.is_some(), "host gamepad connection changed");
        }
        *latest = frame;
    }

    pub fn disconnect(&self) {
        self.set_frame(None);
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<GamepadFrame>> {
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl GamepadDevice for SharedGamepad {
    fn name(&self) -> &str {
        "host"
    }

    fn poll(&mut self) -> Option<GamepadFrame> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_axes_and_buttons_read_as_idle() {
        let frame = GamepadFrame {
            axes: vec![0.5, f64::NAN],
            buttons: vec![],
        };
        assert_eq!(frame.axis(0), 0.5);
        assert_eq!(frame.axis(1), 0.0, "NaN must read as centred");
        assert_eq!(frame.axis(7), 0.0);
        assert!(!frame.is_pressed(3));
        assert_eq!(frame.button(layout::RIGHT_TRIGGER).value, 0.0);
    }

    #[test]
    fn builders_grow_short_frames() {
        let frame = GamepadFrame {
            axes: vec![],
            buttons: vec![],
        }
        .with_axis(layout::RIGHT_STICK_Y, -0.8)
        .with_button(layout::DPAD_DOWN, true)
        .with_trigger(layout::LEFT_TRIGGER, 0.3);

        assert_eq!(frame.axes.len(), 4);
        assert_eq!(frame.axis(layout::RIGHT_STICK_Y), -0.8);
        assert!(frame.is_pressed(layout::DPAD_DOWN));
        assert!(!frame.is_pressed(layout::LEFT_TRIGGER));
        assert_eq!(frame.button(layout::LEFT_TRIGGER).value, 0.3);
    }

    #[test]
    fn no_gamepad_is_never_connected() {
        let mut device = NoGamepad;
        assert!(device.poll().is_none());
        assert_eq!(device.name(), "none");
    }

    #[test]
    fn shared_gamepad_clones_see_pushed_frames() {
        let feeder = SharedGamepad::new();
        let mut device: Box<dyn GamepadDevice> = Box::new(feeder.clone());
        assert!(device.poll().is_none());

        feeder.set_frame(Some(GamepadFrame::neutral().with_button(layout::BUTTON_A, true)));
        assert!(feeder.is_connected());
        let frame = device.poll().unwrap();
        assert!(frame.is_pressed(layout::BUTTON_A));
        // Polling does not consume the snapshot.
        assert!(device.poll().is_some());

        feeder.disconnect();
        assert!(device.poll().is_none());
    }

    #[test]
    fn frame_parses_host_json() {
        let raw = r#"{"axes":[0.0,-1.0,0.25,0.0],"buttons":[{"pressed":true,"value":1.0},{"value":0.2}]}"#;
        let frame: GamepadFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.axis(layout::LEFT_STICK_Y), -1.0);
        assert!(frame.is_pressed(layout::BUTTON_A));
        assert!(!frame.is_pressed(layout::BUTTON_B));
        assert_eq!(frame.button(layout::BUTTON_B).value, 0.2);
    }
}
