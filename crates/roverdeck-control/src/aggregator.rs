//! [`InputAggregator`] – the single serialization point for operator input.
//!
//! Keyboard edges, gamepad-derived directions and discrete UI actions all
//! land here.  The aggregator merges them into the canonical
//! [`ControlState`] and, for every accepted change, synchronously:
//!
//! 1. hands exactly one [`ControlCommand`] to its [`CommandSink`];
//! 2. republishes the new state on its [`StateSlot`] and the event bus.
//!
//! Calls that would not change anything return `None` and emit nothing.

use std::sync::Arc;

use roverdeck_middleware::{CommandSink, EventBus, StateSlot};
use roverdeck_types::{
    CommandPayload, CommandSource, ControlCommand, ControlState, DriveMode, EventPayload, Key,
    KeySource, LightTarget, PanDirection, SteeringMode,
};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::key_state::KeyState;

const EVENT_SOURCE: &str = "roverdeck-control::aggregator";

/// LED intensity before the operator touches it, in percent.
pub const DEFAULT_LED_INTENSITY: u8 = 50;

/// Analog values are compared at this many steps per unit so sensor jitter
/// does not flood the link.
const ANALOG_RESOLUTION: f64 = 100.0;

pub(crate) fn quantize(value: f64) -> f64 {
    (value * ANALOG_RESOLUTION).round() / ANALOG_RESOLUTION
}

/// Clamp into `[lo, hi]`, mapping NaN to `lo`.
fn clamp_finite(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() { lo } else { value.clamp(lo, hi) }
}

pub struct InputAggregator {
    keys: KeyState,
    state: ControlState,
    steering: f64,
    led_intensity: u8,
    sink: Arc<dyn CommandSink>,
    slot: StateSlot<ControlState>,
    bus: EventBus,
}

impl InputAggregator {
    pub fn new(sink: Arc<dyn CommandSink>, bus: EventBus) -> Self {
        let state = ControlState::default();
        Self {
            keys: KeyState::new(),
            slot: StateSlot::new(state.clone()),
            state,
            steering: 0.0,
            led_intensity: DEFAULT_LED_INTENSITY,
            sink,
            bus,
        }
    }

    /// The current merged state.
    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn key_state(&self) -> &KeyState {
        &self.keys
    }

    /// A receiver that observes every republished [`ControlState`].
    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.slot.subscribe()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn led_intensity(&self) -> u8 {
        self.led_intensity
    }

    // ────────────────────────────────────────────────────────────────────────
    // State-changing inputs
    // ────────────────────────────────────────────────────────────────────────

    /// Record that `source` pressed (`active = true`) or released `key`.
    ///
    /// If the aggregate membership of `key` changes, emits one `drive`
    /// command (drive keys) or one `camera-pan` command (camera keys) and
    /// returns the new state.
    pub fn set_key_state(
        &mut self,
        source: KeySource,
        key: Key,
        active: bool,
    ) -> Option<ControlState> {
        if !self.keys.set(source, key, active) {
            trace!(?source, %key, active, "key state unchanged");
            return None;
        }
        self.state.active_keys = self.keys.active_keys();

        let payload = match key.pan_direction() {
            Some(direction) => CommandPayload::CameraPan {
                direction,
                active: self.state.is_active(key),
            },
            None => self.drive_payload(),
        };
        self.dispatch(source.into(), payload);
        Some(self.publish_state())
    }

    /// Retract every key held by `source`.
    ///
    /// Emits at most one `drive` command plus one `camera-pan` release per
    /// camera key that went inactive.
    pub fn release_source(&mut self, source: KeySource) -> Option<ControlState> {
        let released = self.keys.release_source(source);
        if released.is_empty() {
            return None;
        }
        self.state.active_keys = self.keys.active_keys();
        debug!(?source, count = released.len(), "released source keys");

        let mut drive_changed = false;
        for key in &released {
            match key.pan_direction() {
                Some(direction) => self.dispatch(
                    source.into(),
                    CommandPayload::CameraPan {
                        direction,
                        active: false,
                    },
                ),
                None => drive_changed = true,
            }
        }
        if drive_changed {
            let payload = self.drive_payload();
            self.dispatch(source.into(), payload);
        }
        Some(self.publish_state())
    }

    /// Merge analog gamepad values.  Throttle and brake are clamped to
    /// `[0, 1]`, steering to `[-1, 1]`; emits one `gamepad` command when any
    /// of them moved by at least one step.
    pub fn set_analog(&mut self, throttle: f64, brake: f64, steering: f64) -> Option<ControlState> {
        let throttle = quantize(clamp_finite(throttle, 0.0, 1.0));
        let brake = quantize(clamp_finite(brake, 0.0, 1.0));
        let steering = quantize(clamp_finite(steering, -1.0, 1.0));

        if throttle == self.state.throttle && brake == self.state.brake && steering == self.steering {
            return None;
        }
        self.state.throttle = throttle;
        self.state.brake = brake;
        self.steering = steering;

        self.dispatch(
            CommandSource::Gamepad,
            CommandPayload::Gamepad {
                throttle,
                brake,
                steering,
            },
        );
        Some(self.publish_state())
    }

    pub fn set_drive_mode(&mut self, source: CommandSource, mode: DriveMode) -> Option<ControlState> {
        if mode == self.state.drive_mode {
            debug!(%mode, "drive mode unchanged");
            return None;
        }
        self.state.drive_mode = mode;
        self.dispatch(source, CommandPayload::Mode { mode });
        Some(self.publish_state())
    }

    pub fn set_steering_mode(
        &mut self,
        source: CommandSource,
        mode: SteeringMode,
    ) -> Option<ControlState> {
        if mode == self.state.steering_mode {
            debug!(%mode, "steering mode unchanged");
            return None;
        }
        self.state.steering_mode = mode;
        self.dispatch(source, CommandPayload::Steering { mode });
        Some(self.publish_state())
    }

    pub fn cycle_drive_mode(&mut self, source: CommandSource) -> ControlState {
        let next = self.state.drive_mode.next();
        self.set_drive_mode(source, next)
            .unwrap_or_else(|| self.state.clone())
    }

    pub fn cycle_steering_mode(&mut self, source: CommandSource) -> ControlState {
        let next = self.state.steering_mode.next();
        self.set_steering_mode(source, next)
            .unwrap_or_else(|| self.state.clone())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Discrete actions (always emitted)
    // ────────────────────────────────────────────────────────────────────────

    pub fn select_camera(&mut self, source: CommandSource, camera_id: impl Into<String>) {
        self.dispatch(
            source,
            CommandPayload::CameraSelect {
                camera_id: camera_id.into(),
            },
        );
    }

    /// One-shot pan nudge, independent of the held arrow keys.
    pub fn pan_camera(&mut self, source: CommandSource, direction: PanDirection) {
        self.dispatch(
            source,
            CommandPayload::CameraPan {
                direction,
                active: true,
            },
        );
    }

    /// Continuous camera vector, each component clamped to `[-1, 1]`.
    pub fn camera_vector(&mut self, source: CommandSource, x: f64, y: f64) {
        self.dispatch(
            source,
            CommandPayload::CameraVector {
                x: clamp_finite(x, -1.0, 1.0),
                y: clamp_finite(y, -1.0, 1.0),
            },
        );
    }

    pub fn toggle_led(&mut self, source: CommandSource, target: LightTarget) {
        self.dispatch(source, CommandPayload::LedToggle { target });
    }

    pub fn toggle_laser(&mut self, source: CommandSource, target: LightTarget) {
        self.dispatch(source, CommandPayload::LaserToggle { target });
    }

    /// Set the LED level, clamped to `0..=100` percent.
    pub fn set_led_intensity(&mut self, source: CommandSource, value: i32) -> u8 {
        let value = value.clamp(0, 100) as u8;
        self.led_intensity = value;
        self.dispatch(source, CommandPayload::LedIntensity { value });
        value
    }

    /// Move the LED level by `delta` percent from its current value.
    pub fn adjust_led_intensity(&mut self, source: CommandSource, delta: i32) -> u8 {
        let target = i32::from(self.led_intensity) + delta;
        self.set_led_intensity(source, target)
    }

    pub fn cycle_display_profile(&mut self, source: CommandSource) {
        self.dispatch(source, CommandPayload::DisplayProfileCycle);
    }

    // ────────────────────────────────────────────────────────────────────────
    // Internals
    // ────────────────────────────────────────────────────────────────────────

    fn drive_payload(&self) -> CommandPayload {
        CommandPayload::Drive {
            keys: self.state.drive_keys(),
            drive_mode: self.state.drive_mode,
            steering_mode: self.state.steering_mode,
        }
    }

    fn dispatch(&self, source: CommandSource, payload: CommandPayload) {
        let command = ControlCommand::new(source, payload);
        let outcome = self.sink.send(&command);
        trace!(kind = command.kind(), ?outcome, "command dispatched");
        self.bus.emit(EVENT_SOURCE, EventPayload::Command(command));
    }

    fn publish_state(&self) -> ControlState {
        self.slot.publish(self.state.clone());
        self.bus
            .emit(EVENT_SOURCE, EventPayload::ControlState(self.state.clone()));
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roverdeck_middleware::{RecordingSink, Topic};

    fn make_aggregator() -> (RecordingSink, InputAggregator) {
        let sink = RecordingSink::new();
        let aggregator = InputAggregator::new(Arc::new(sink.clone()), EventBus::default());
        (sink, aggregator)
    }

    fn drive_keys(cmd: &ControlCommand) -> Vec<Key> {
        match &cmd.payload {
            CommandPayload::Drive { keys, .. } => keys.clone(),
            other => panic!("expected drive command, got {other:?}"),
        }
    }

    #[test]
    fn keyboard_and_gamepad_forward_scenario() {
        let (sink, mut agg) = make_aggregator();

        let state = agg.set_key_state(KeySource::Keyboard, Key::Forward, true).unwrap();
        assert!(state.is_active(Key::Forward));
        assert!(agg.set_key_state(KeySource::Gamepad, Key::Forward, true).is_none());
        assert!(agg.set_key_state(KeySource::Keyboard, Key::Forward, false).is_none());
        assert!(agg.state().is_active(Key::Forward), "gamepad still holds w");
        let state = agg.set_key_state(KeySource::Gamepad, Key::Forward, false).unwrap();
        assert!(state.active_keys.is_empty());

        let commands = sink.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(drive_keys(&commands[0]), vec![Key::Forward]);
        assert_eq!(commands[0].source, CommandSource::Keyboard);
        assert_eq!(drive_keys(&commands[1]), Vec::<Key>::new());
        assert_eq!(commands[1].source, CommandSource::Gamepad);
    }

    #[test]
    fn redundant_key_state_emits_nothing() {
        let (sink, mut agg) = make_aggregator();
        agg.set_key_state(KeySource::Keyboard, Key::Left, true);
        for _ in 0..5 {
            assert!(agg.set_key_state(KeySource::Keyboard, Key::Left, true).is_none());
        }
        assert!(agg.set_key_state(KeySource::Keyboard, Key::Right, false).is_none());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn drive_command_carries_current_modes() {
        let (sink, mut agg) = make_aggregator();
        agg.set_drive_mode(CommandSource::Ui, DriveMode::Boost);
        agg.set_steering_mode(CommandSource::Ui, SteeringMode::FourWd);
        agg.set_key_state(KeySource::Keyboard, Key::Backward, true);

        let commands = sink.commands();
        assert_eq!(sink.kinds(), vec!["mode", "steering", "drive"]);
        assert_eq!(
            commands[2].payload,
            CommandPayload::Drive {
                keys: vec![Key::Backward],
                drive_mode: DriveMode::Boost,
                steering_mode: SteeringMode::FourWd,
            }
        );
    }

    #[test]
    fn set_drive_mode_twice_emits_once() {
        let (sink, mut agg) = make_aggregator();
        assert!(agg.set_drive_mode(CommandSource::Ui, DriveMode::Eco).is_some());
        assert!(agg.set_drive_mode(CommandSource::Ui, DriveMode::Eco).is_none());
        assert_eq!(sink.kinds(), vec!["mode"]);
        assert_eq!(agg.state().drive_mode, DriveMode::Eco);
    }

    #[test]
    fn setting_default_mode_is_a_no_op() {
        let (sink, mut agg) = make_aggregator();
        assert!(agg.set_drive_mode(CommandSource::Ui, DriveMode::Normal).is_none());
        assert!(agg.set_steering_mode(CommandSource::Ui, SteeringMode::TwoWd).is_none());
        assert!(sink.is_empty());
    }

    #[test]
    fn cycle_modes_always_emit() {
        let (sink, mut agg) = make_aggregator();
        assert_eq!(agg.cycle_drive_mode(CommandSource::Gamepad).drive_mode, DriveMode::Boost);
        assert_eq!(agg.cycle_drive_mode(CommandSource::Gamepad).drive_mode, DriveMode::Eco);
        assert_eq!(
            agg.cycle_steering_mode(CommandSource::Gamepad).steering_mode,
            SteeringMode::FourWd
        );
        assert_eq!(sink.kinds(), vec!["mode", "mode", "steering"]);
    }

    #[test]
    fn camera_keys_emit_pan_on_both_edges() {
        let (sink, mut agg) = make_aggregator();
        agg.set_key_state(KeySource::Keyboard, Key::CameraLeft, true);
        agg.set_key_state(KeySource::Keyboard, Key::CameraLeft, false);

        let payloads: Vec<_> = sink.commands().into_iter().map(|c| c.payload).collect();
        assert_eq!(
            payloads,
            vec![
                CommandPayload::CameraPan { direction: PanDirection::Left, active: true },
                CommandPayload::CameraPan { direction: PanDirection::Left, active: false },
            ]
        );
        assert!(agg.state().drive_keys().is_empty());
    }

    #[test]
    fn release_gamepad_removes_exactly_its_keys() {
        let (sink, mut agg) = make_aggregator();
        agg.set_key_state(KeySource::Keyboard, Key::Right, true);
        agg.set_key_state(KeySource::Gamepad, Key::Forward, true);
        agg.set_key_state(KeySource::Gamepad, Key::Left, true);
        agg.set_key_state(KeySource::Gamepad, Key::CameraUp, true);
        sink.take();

        let state = agg.release_source(KeySource::Gamepad).unwrap();
        assert_eq!(state.active_keys.into_iter().collect::<Vec<_>>(), vec![Key::Right]);
        assert_eq!(sink.kinds(), vec!["camera-pan", "drive"]);
        assert_eq!(drive_keys(&sink.commands()[1]), vec![Key::Right]);

        assert!(agg.release_source(KeySource::Gamepad).is_none());
    }

    #[test]
    fn analog_is_clamped_and_deduplicated() {
        let (sink, mut agg) = make_aggregator();
        let state = agg.set_analog(1.7, -0.2, 0.0).unwrap();
        assert_eq!(state.throttle, 1.0);
        assert_eq!(state.brake, 0.0);
        // Below one step of resolution.
        assert!(agg.set_analog(0.999, 0.001, 0.002).is_none());
        assert!(agg.set_analog(0.5, 0.0, 0.0).is_some());
        assert_eq!(sink.kinds(), vec!["gamepad", "gamepad"]);
    }

    #[test]
    fn quantize_rounds_to_hundredths() {
        assert_eq!(quantize(0.123), 0.12);
        assert_eq!(quantize(-0.456), -0.46);
        assert_eq!(quantize(0.999), 1.0);
        assert_eq!(quantize(0.0), 0.0);
    }

    #[test]
    fn discrete_actions_are_never_deduplicated() {
        let (sink, mut agg) = make_aggregator();
        agg.select_camera(CommandSource::Ui, "front");
        agg.select_camera(CommandSource::Ui, "front");
        agg.toggle_led(CommandSource::Ui, LightTarget::Front);
        agg.toggle_laser(CommandSource::Ui, LightTarget::Sweep);
        agg.cycle_display_profile(CommandSource::Ui);
        agg.camera_vector(CommandSource::Gamepad, 3.0, -0.5);
        assert_eq!(
            sink.kinds(),
            vec![
                "camera-select",
                "camera-select",
                "led-toggle",
                "laser-toggle",
                "display-profile-cycle",
                "camera-vector"
            ]
        );
        assert_eq!(
            sink.commands()[5].payload,
            CommandPayload::CameraVector { x: 1.0, y: -0.5 }
        );
    }

    #[test]
    fn led_intensity_is_clamped() {
        let (sink, mut agg) = make_aggregator();
        assert_eq!(agg.set_led_intensity(CommandSource::Ui, 140), 100);
        assert_eq!(agg.adjust_led_intensity(CommandSource::Gamepad, -10), 90);
        assert_eq!(agg.set_led_intensity(CommandSource::Ui, -5), 0);
        assert_eq!(agg.adjust_led_intensity(CommandSource::Gamepad, -10), 0);
        assert_eq!(sink.len(), 4);
    }

    #[tokio::test]
    async fn accepted_change_republishes_state_and_command() {
        let (_sink, mut agg) = make_aggregator();
        let mut state_rx = agg.subscribe();
        let mut commands = agg.bus().subscribe_to(Topic::Commands);
        let mut states = agg.bus().subscribe_to(Topic::ControlState);

        agg.set_key_state(KeySource::Keyboard, Key::Forward, true);

        assert!(state_rx.has_changed().unwrap());
        assert!(state_rx.borrow_and_update().is_active(Key::Forward));

        let event = commands.try_recv().unwrap();
        assert!(matches!(event.payload, EventPayload::Command(ref c) if c.kind() == "drive"));
        let event = states.try_recv().unwrap();
        assert!(matches!(event.payload, EventPayload::ControlState(_)));
    }
}
