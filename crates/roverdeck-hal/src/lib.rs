//! `roverdeck-hal` – input device abstraction.
//!
//! - [`gamepad`] – the [`GamepadDevice`] trait, raw [`GamepadFrame`]
//!   snapshots, the null device and the host-fed [`SharedGamepad`].
//! - [`sim`] – [`ScriptedGamepad`] for headless runs.

pub mod gamepad;
pub mod sim;

pub use gamepad::{ButtonState, GamepadDevice, GamepadFrame, NoGamepad, SharedGamepad};
pub use sim::ScriptedGamepad;
