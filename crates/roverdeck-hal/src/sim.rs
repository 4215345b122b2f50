//! Scripted gamepad for headless tests and demos.
//!
//! [`ScriptedGamepad`] replays a fixed sequence of polls, one step per
//! [`poll`][GamepadDevice::poll], then keeps returning the last step.  This
//! lets the sampler and the console run without any physical controller.
//!
//! # Example
//!
//! ```rust
//! use roverdeck_hal::gamepad::{layout, GamepadDevice, GamepadFrame};
//! use roverdeck_hal::sim::ScriptedGamepad;
//!
//! let mut pad = ScriptedGamepad::new()
//!     .hold(GamepadFrame::neutral().with_button(layout::BUTTON_A, true), 5)
//!     .then_disconnect();
//!
//! assert!(pad.poll().is_some());
//! ```

use std::collections::VecDeque;

use crate::gamepad::{GamepadDevice, GamepadFrame};

/// Replays a scripted sequence of controller snapshots.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGamepad {
    steps: VecDeque<Option<GamepadFrame>>,
    last: Option<GamepadFrame>,
    polls: usize,
}

impl ScriptedGamepad {
    /// An empty script; polls as disconnected until steps are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one connected poll.
    pub fn then(mut self, frame: GamepadFrame) -> Self {
        self.steps.push_back(Some(frame));
        self
    }

    /// Append `ticks` identical connected polls.
    pub fn hold(mut self, frame: GamepadFrame, ticks: usize) -> Self {
        for _ in 0..ticks {
            self.steps.push_back(Some(frame.clone()));
        }
        self
    }

    /// Append one disconnected poll.
    pub fn then_disconnect(mut self) -> Self {
        self.steps.push_back(None);
        self
    }

    /// Steps not yet replayed.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    /// Number of times the device has been polled.
    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl GamepadDevice for ScriptedGamepad {
    fn name(&self) -> &str {
        "scripted"
    }

    fn poll(&mut self) -> Option<GamepadFrame> {
        self.polls += 1;
        if let Some(step) = self.steps.pop_front() {
            self.last = step;
        }
        self.last.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamepad::layout;

    #[test]
    fn replays_steps_then_sticks_on_last() {
        let pressed = GamepadFrame::neutral().with_button(layout::BUTTON_X, true);
        let mut pad = ScriptedGamepad::new()
            .then(GamepadFrame::neutral())
            .hold(pressed.clone(), 2);

        assert_eq!(pad.remaining(), 3);
        assert_eq!(pad.poll(), Some(GamepadFrame::neutral()));
        assert_eq!(pad.poll(), Some(pressed.clone()));
        assert_eq!(pad.poll(), Some(pressed.clone()));
        assert_eq!(pad.poll(), Some(pressed), "script exhausted: last step repeats");
        assert_eq!(pad.polls(), 4);
    }

    #[test]
    fn disconnect_step_sticks() {
        let mut pad = ScriptedGamepad::new()
            .then(GamepadFrame::neutral())
            .then_disconnect();
        assert!(pad.poll().is_some());
        assert!(pad.poll().is_none());
        assert!(pad.poll().is_none());
    }

    #[test]
    fn empty_script_is_disconnected() {
        let mut pad = ScriptedGamepad::new();
        assert!(pad.poll().is_none());
    }
}
