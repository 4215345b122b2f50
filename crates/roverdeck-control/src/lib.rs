//! `roverdeck-control` – operator input merging.
//!
//! Every human input, whatever device it comes from, is folded into one
//! canonical [`ControlState`][roverdeck_types::ControlState] here.
//!
//! # Modules
//!
//! - [`key_state`] – [`KeyState`][key_state::KeyState]: which sources hold
//!   which logical keys; a key is active while any source holds it.
//! - [`aggregator`] – [`InputAggregator`][aggregator::InputAggregator]: the
//!   single serialization point that applies key edges, analog values, mode
//!   changes and discrete UI actions, emitting one command per accepted
//!   change.
//! - [`sampler`] – [`GamepadSampler`][sampler::GamepadSampler]: polls a
//!   [`GamepadDevice`][roverdeck_hal::GamepadDevice], applies dead-zones,
//!   maps sticks onto logical keys and fires actions on button edges.

pub mod aggregator;
pub mod key_state;
pub mod sampler;

pub use aggregator::InputAggregator;
pub use key_state::KeyState;
pub use sampler::{ButtonAction, ButtonEdgeDetector, GamepadSampler, SamplerConfig, TickReport};
