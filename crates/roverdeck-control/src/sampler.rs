//! [`GamepadSampler`] – turns polled controller snapshots into aggregator
//! input.
//!
//! Each [`tick`][GamepadSampler::tick] reads one [`GamepadFrame`] from a
//! [`GamepadDevice`] and:
//!
//! * applies the dead-zone and clamps every axis to `[-1, 1]`;
//! * thresholds the left stick into drive keys and the right stick into
//!   camera keys, fused through `set_key_state(gamepad, …)`;
//! * merges analog throttle/brake (triggers or stick deflection);
//! * diffs buttons against the previous tick and fires the mapped action on
//!   every *just pressed* edge.
//!
//! A missing device is not an error: the sampler simply has nothing to do.
//! Losing a device releases everything the gamepad held.

use std::collections::BTreeSet;

use roverdeck_hal::gamepad::layout;
use roverdeck_hal::{GamepadDevice, GamepadFrame};
use roverdeck_middleware::EventBus;
use roverdeck_types::{
    CommandSource, EventPayload, GamepadButtonEdge, Key, KeySource, LightTarget,
};
use tracing::{debug, info};

use crate::aggregator::{InputAggregator, quantize};

const EVENT_SOURCE: &str = "roverdeck-control::sampler";

/// Stick deflection below which an axis reads exactly zero.
pub const DEFAULT_DEAD_ZONE: f64 = 0.12;

/// Dead-zoned deflection past which a stick counts as a direction key.
pub const DEFAULT_DIRECTION_THRESHOLD: f64 = 0.5;

/// LED intensity step for the D-pad, in percent.
const LED_STEP: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    pub dead_zone: f64,
    pub direction_threshold: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            dead_zone: DEFAULT_DEAD_ZONE,
            direction_threshold: DEFAULT_DIRECTION_THRESHOLD,
        }
    }
}

/// Clamp `value` to `[-1, 1]` and zero it inside the dead-zone.
pub fn apply_dead_zone(value: f64, dead_zone: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let value = value.clamp(-1.0, 1.0);
    if value.abs() < dead_zone { 0.0 } else { value }
}

// ────────────────────────────────────────────────────────────────────────────
// Button actions
// ────────────────────────────────────────────────────────────────────────────

/// Discrete action bound to a controller button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    ToggleLed(LightTarget),
    ToggleLaser(LightTarget),
    CycleSteering,
    CycleDriveMode,
    CycleDisplayProfile,
    AdjustLedIntensity(i32),
}

impl ButtonAction {
    /// The action bound to button `index` of the standard layout, if any.
    pub fn for_button(index: usize) -> Option<Self> {
        match index {
            layout::BUTTON_A => Some(ButtonAction::ToggleLed(LightTarget::Front)),
            layout::BUTTON_B => Some(ButtonAction::ToggleLaser(LightTarget::Front)),
            layout::BUTTON_X => Some(ButtonAction::ToggleLed(LightTarget::Sweep)),
            layout::BUTTON_Y => Some(ButtonAction::ToggleLaser(LightTarget::Sweep)),
            layout::LEFT_BUMPER => Some(ButtonAction::CycleSteering),
            layout::RIGHT_BUMPER => Some(ButtonAction::CycleDriveMode),
            layout::START => Some(ButtonAction::CycleDisplayProfile),
            layout::DPAD_UP => Some(ButtonAction::AdjustLedIntensity(LED_STEP)),
            layout::DPAD_DOWN => Some(ButtonAction::AdjustLedIntensity(-LED_STEP)),
            _ => None,
        }
    }

    fn apply(self, aggregator: &mut InputAggregator) {
        let source = CommandSource::Gamepad;
        match self {
            ButtonAction::ToggleLed(target) => aggregator.toggle_led(source, target),
            ButtonAction::ToggleLaser(target) => aggregator.toggle_laser(source, target),
            ButtonAction::CycleSteering => {
                aggregator.cycle_steering_mode(source);
            }
            ButtonAction::CycleDriveMode => {
                aggregator.cycle_drive_mode(source);
            }
            ButtonAction::CycleDisplayProfile => aggregator.cycle_display_profile(source),
            ButtonAction::AdjustLedIntensity(delta) => {
                aggregator.adjust_led_intensity(source, delta);
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Edge detection
// ────────────────────────────────────────────────────────────────────────────

/// Diffs consecutive button snapshots.
#[derive(Debug, Clone, Default)]
pub struct ButtonEdgeDetector {
    previous: Vec<bool>,
}

impl ButtonEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edges between the previous frame and `frame`, in button order.
    ///
    /// A button absent from the previous frame counts as released there.
    pub fn detect(&mut self, frame: &GamepadFrame) -> Vec<GamepadButtonEdge> {
        let current: Vec<bool> = frame.buttons.iter().map(|b| b.pressed).collect();
        let len = current.len().max(self.previous.len());

        let edges = (0..len)
            .filter_map(|index| {
                let was = self.previous.get(index).copied().unwrap_or(false);
                let now = current.get(index).copied().unwrap_or(false);
                (was != now).then_some(GamepadButtonEdge { index, pressed: now })
            })
            .collect();

        self.previous = current;
        edges
    }

    /// Forget the previous snapshot.
    pub fn reset(&mut self) {
        self.previous.clear();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sampler
// ────────────────────────────────────────────────────────────────────────────

/// What one [`GamepadSampler::tick`] observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub connected: bool,
    pub edges: Vec<GamepadButtonEdge>,
}

impl TickReport {
    pub fn pressed(&self) -> impl Iterator<Item = usize> + '_ {
        self.edges.iter().filter(|e| e.pressed).map(|e| e.index)
    }
}

pub struct GamepadSampler {
    config: SamplerConfig,
    running: bool,
    connected: bool,
    edges: ButtonEdgeDetector,
    /// Direction keys the gamepad currently asserts.
    held: BTreeSet<Key>,
    camera_vector: (f64, f64),
    bus: EventBus,
}

impl GamepadSampler {
    pub fn new(config: SamplerConfig, bus: EventBus) -> Self {
        Self {
            config,
            running: false,
            connected: false,
            edges: ButtonEdgeDetector::new(),
            held: BTreeSet::new(),
            camera_vector: (0.0, 0.0),
            bus,
        }
    }

    pub fn config(&self) -> SamplerConfig {
        self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn start(&mut self) {
        if !self.running {
            info!("gamepad sampler started");
        }
        self.running = true;
    }

    /// Stop sampling and release everything the gamepad held, so a later
    /// [`start`][Self::start] begins from a clean slate.
    pub fn stop(&mut self, aggregator: &mut InputAggregator) {
        if self.running {
            info!("gamepad sampler stopped");
        }
        self.running = false;
        if self.connected {
            self.connected = false;
            self.bus.emit(
                EVENT_SOURCE,
                EventPayload::GamepadConnection { connected: false },
            );
        }
        self.release_all(aggregator);
    }

    /// Poll `device` once and fold the snapshot into `aggregator`.
    ///
    /// Inert (returns an empty report) while stopped.
    pub fn tick(
        &mut self,
        device: &mut dyn GamepadDevice,
        aggregator: &mut InputAggregator,
    ) -> TickReport {
        if !self.running {
            return TickReport::default();
        }

        let Some(frame) = device.poll() else {
            if self.connected {
                self.connected = false;
                info!(device = device.name(), "gamepad disconnected");
                self.bus.emit(
                    EVENT_SOURCE,
                    EventPayload::GamepadConnection { connected: false },
                );
                self.release_all(aggregator);
            }
            return TickReport::default();
        };

        if !self.connected {
            self.connected = true;
            info!(device = device.name(), "gamepad connected");
            self.bus.emit(
                EVENT_SOURCE,
                EventPayload::GamepadConnection { connected: true },
            );
        }

        let dz = self.config.dead_zone;
        let left_x = apply_dead_zone(frame.axis(layout::LEFT_STICK_X), dz);
        let left_y = apply_dead_zone(frame.axis(layout::LEFT_STICK_Y), dz);
        let right_x = apply_dead_zone(frame.axis(layout::RIGHT_STICK_X), dz);
        let right_y = apply_dead_zone(frame.axis(layout::RIGHT_STICK_Y), dz);

        self.sync_directions(left_x, left_y, right_x, right_y, aggregator);

        let vector = (quantize(right_x), quantize(right_y));
        if vector != self.camera_vector {
            self.camera_vector = vector;
            aggregator.camera_vector(CommandSource::Gamepad, vector.0, vector.1);
        }

        let throttle = frame.button(layout::RIGHT_TRIGGER).value.max(-left_y);
        let brake = frame.button(layout::LEFT_TRIGGER).value.max(left_y);
        aggregator.set_analog(throttle, brake, left_x);

        let edges = self.edges.detect(&frame);
        for edge in &edges {
            self.bus.emit(EVENT_SOURCE, EventPayload::GamepadButton(*edge));
            if !edge.pressed {
                continue;
            }
            if let Some(action) = ButtonAction::for_button(edge.index) {
                debug!(button = edge.index, ?action, "gamepad button action");
                action.apply(aggregator);
            }
        }

        TickReport {
            connected: true,
            edges,
        }
    }

    /// Assert exactly the direction keys the sticks point at, touching only
    /// keys whose gamepad assertion changed.
    fn sync_directions(
        &mut self,
        left_x: f64,
        left_y: f64,
        right_x: f64,
        right_y: f64,
        aggregator: &mut InputAggregator,
    ) {
        let t = self.config.direction_threshold;
        let mut wanted = BTreeSet::new();
        for (pointing, key) in [
            (left_y < -t, Key::Forward),
            (left_y > t, Key::Backward),
            (left_x < -t, Key::Left),
            (left_x > t, Key::Right),
            (right_y < -t, Key::CameraUp),
            (right_y > t, Key::CameraDown),
            (right_x < -t, Key::CameraLeft),
            (right_x > t, Key::CameraRight),
        ] {
            if pointing {
                wanted.insert(key);
            }
        }

        for key in self.held.difference(&wanted) {
            aggregator.set_key_state(KeySource::Gamepad, *key, false);
        }
        for key in wanted.difference(&self.held) {
            aggregator.set_key_state(KeySource::Gamepad, *key, true);
        }
        self.held = wanted;
    }

    fn release_all(&mut self, aggregator: &mut InputAggregator) {
        aggregator.release_source(KeySource::Gamepad);
        aggregator.set_analog(0.0, 0.0, 0.0);
        self.held.clear();
        self.edges.reset();
        self.camera_vector = (0.0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roverdeck_hal::{NoGamepad, ScriptedGamepad};
    use roverdeck_middleware::{RecordingSink, Topic};
    use roverdeck_types::CommandPayload;
    use std::sync::Arc;

    fn setup() -> (RecordingSink, InputAggregator, GamepadSampler) {
        let sink = RecordingSink::new();
        let bus = EventBus::default();
        let aggregator = InputAggregator::new(Arc::new(sink.clone()), bus.clone());
        let mut sampler = GamepadSampler::new(SamplerConfig::default(), bus);
        sampler.start();
        (sink, aggregator, sampler)
    }

    #[test]
    fn dead_zone_zeroes_small_deflections_and_clamps() {
        assert_eq!(apply_dead_zone(0.11, DEFAULT_DEAD_ZONE), 0.0);
        assert_eq!(apply_dead_zone(-0.05, DEFAULT_DEAD_ZONE), 0.0);
        assert_eq!(apply_dead_zone(0.4, DEFAULT_DEAD_ZONE), 0.4);
        assert_eq!(apply_dead_zone(1.8, DEFAULT_DEAD_ZONE), 1.0);
        assert_eq!(apply_dead_zone(-3.0, DEFAULT_DEAD_ZONE), -1.0);
        assert_eq!(apply_dead_zone(f64::NAN, DEFAULT_DEAD_ZONE), 0.0);
    }

    #[test]
    fn edge_detector_reports_transitions_only() {
        let mut detector = ButtonEdgeDetector::new();
        let pressed = GamepadFrame::neutral().with_button(layout::BUTTON_B, true);

        assert_eq!(
            detector.detect(&pressed),
            vec![GamepadButtonEdge { index: layout::BUTTON_B, pressed: true }]
        );
        assert!(detector.detect(&pressed).is_empty());
        assert_eq!(
            detector.detect(&GamepadFrame::neutral()),
            vec![GamepadButtonEdge { index: layout::BUTTON_B, pressed: false }]
        );
    }

    #[test]
    fn held_button_fires_action_once() {
        let (sink, mut agg, mut sampler) = setup();
        let frame = GamepadFrame::neutral().with_button(layout::BUTTON_A, true);
        let mut pad = ScriptedGamepad::new().hold(frame, 5);

        let pressed: usize = (0..5)
            .map(|_| sampler.tick(&mut pad, &mut agg).pressed().count())
            .sum();

        assert_eq!(pressed, 1);
        assert_eq!(sink.kinds(), vec!["led-toggle"]);
    }

    #[test]
    fn absent_device_is_inert() {
        let (sink, mut agg, mut sampler) = setup();
        let mut pad = NoGamepad;
        for _ in 0..3 {
            assert_eq!(sampler.tick(&mut pad, &mut agg), TickReport::default());
        }
        assert!(!sampler.is_connected());
        assert!(sink.is_empty());
    }

    #[test]
    fn stopped_sampler_does_not_poll() {
        let (_sink, mut agg, mut sampler) = setup();
        sampler.stop(&mut agg);
        let mut pad = ScriptedGamepad::new().then(GamepadFrame::neutral());
        sampler.tick(&mut pad, &mut agg);
        assert_eq!(pad.polls(), 0);
    }

    #[test]
    fn left_stick_maps_to_drive_keys_and_analog() {
        let (sink, mut agg, mut sampler) = setup();
        let frame = GamepadFrame::neutral()
            .with_axis(layout::LEFT_STICK_Y, -0.9)
            .with_axis(layout::LEFT_STICK_X, 0.05);
        let mut pad = ScriptedGamepad::new().hold(frame, 3);

        for _ in 0..3 {
            sampler.tick(&mut pad, &mut agg);
        }

        let state = agg.state();
        assert!(state.is_active(Key::Forward));
        assert!(!state.is_active(Key::Right), "0.05 is inside the dead-zone");
        assert_eq!(state.throttle, 0.9);
        assert_eq!(state.brake, 0.0);
        assert_eq!(sink.kinds(), vec!["drive", "gamepad"], "no spam while held");
    }

    #[test]
    fn trigger_wins_over_smaller_stick_deflection() {
        let (_sink, mut agg, mut sampler) = setup();
        let frame = GamepadFrame::neutral()
            .with_axis(layout::LEFT_STICK_Y, -0.3)
            .with_trigger(layout::RIGHT_TRIGGER, 0.75)
            .with_trigger(layout::LEFT_TRIGGER, 0.2);
        let mut pad = ScriptedGamepad::new().then(frame);

        sampler.tick(&mut pad, &mut agg);
        assert_eq!(agg.state().throttle, 0.75);
        assert_eq!(agg.state().brake, 0.2);
    }

    #[test]
    fn right_stick_pans_and_streams_vector() {
        let (sink, mut agg, mut sampler) = setup();
        let frame = GamepadFrame::neutral().with_axis(layout::RIGHT_STICK_X, 0.8);
        let mut pad = ScriptedGamepad::new().then(frame).then(GamepadFrame::neutral());

        sampler.tick(&mut pad, &mut agg);
        assert!(agg.state().is_active(Key::CameraRight));
        sampler.tick(&mut pad, &mut agg);
        assert!(!agg.state().is_active(Key::CameraRight));

        let payloads: Vec<_> = sink.commands().into_iter().map(|c| c.payload).collect();
        assert!(payloads.contains(&CommandPayload::CameraVector { x: 0.8, y: 0.0 }));
        assert!(payloads.contains(&CommandPayload::CameraVector { x: 0.0, y: 0.0 }));
        assert_eq!(
            sink.kinds().iter().filter(|k| **k == "camera-pan").count(),
            2
        );
    }

    #[test]
    fn disconnect_releases_exactly_gamepad_keys_and_zeroes_analog() {
        let (sink, mut agg, mut sampler) = setup();
        agg.set_key_state(KeySource::Keyboard, Key::Left, true);

        let frame = GamepadFrame::neutral()
            .with_axis(layout::LEFT_STICK_Y, -1.0)
            .with_axis(layout::LEFT_STICK_X, 1.0)
            .with_axis(layout::RIGHT_STICK_Y, -1.0);
        let mut pad = ScriptedGamepad::new().then(frame).then_disconnect();

        sampler.tick(&mut pad, &mut agg);
        let held = agg.key_state().asserted_by(KeySource::Gamepad);
        assert_eq!(held, vec![Key::Forward, Key::Right, Key::CameraUp]);
        assert!(agg.state().throttle > 0.0);
        sink.take();

        let report = sampler.tick(&mut pad, &mut agg);
        assert!(!report.connected);
        assert!(!sampler.is_connected());

        let state = agg.state();
        assert_eq!(state.active_keys.iter().copied().collect::<Vec<_>>(), vec![Key::Left]);
        assert_eq!(state.throttle, 0.0);
        assert_eq!(state.brake, 0.0);
        assert_eq!(sink.kinds(), vec!["camera-pan", "drive", "gamepad"]);
    }

    #[test]
    fn reconnect_starts_with_clean_button_state() {
        let (sink, mut agg, mut sampler) = setup();
        let pressed = GamepadFrame::neutral().with_button(layout::RIGHT_BUMPER, true);
        let mut pad = ScriptedGamepad::new()
            .then(pressed.clone())
            .then_disconnect()
            .then(pressed);

        sampler.tick(&mut pad, &mut agg);
        sampler.tick(&mut pad, &mut agg);
        sampler.tick(&mut pad, &mut agg);

        assert_eq!(sink.kinds(), vec!["mode", "mode"]);
    }

    #[test]
    fn connection_edges_are_published() {
        let (_sink, mut agg, mut sampler) = setup();
        let mut gamepad_events = agg.bus().subscribe_to(Topic::Gamepad);
        let mut pad = ScriptedGamepad::new()
            .then(GamepadFrame::neutral().with_button(layout::START, true))
            .then_disconnect();

        sampler.tick(&mut pad, &mut agg);
        sampler.tick(&mut pad, &mut agg);

        let mut seen = Vec::new();
        while let Ok(event) = gamepad_events.try_recv() {
            seen.push(event.payload);
        }
        assert!(matches!(seen[0], EventPayload::GamepadConnection { connected: true }));
        assert!(matches!(
            seen[1],
            EventPayload::GamepadButton(GamepadButtonEdge { index: layout::START, pressed: true })
        ));
        assert!(matches!(seen[2], EventPayload::GamepadConnection { connected: false }));
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn dpad_adjusts_led_intensity() {
        let (sink, mut agg, mut sampler) = setup();
        let up = GamepadFrame::neutral().with_button(layout::DPAD_UP, true);
        let mut pad = ScriptedGamepad::new()
            .then(up.clone())
            .then(GamepadFrame::neutral())
            .then(up);

        for _ in 0..3 {
            sampler.tick(&mut pad, &mut agg);
        }
        assert_eq!(agg.led_intensity(), 70);
        assert_eq!(sink.kinds(), vec!["led-intensity", "led-intensity"]);
    }
}
