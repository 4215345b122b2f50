//! [`TelemetrySimulator`] – synthetic telemetry for a console without a live
//! sensor feed.
//!
//! Every [`tick`][TelemetrySimulator::tick] derives the next
//! [`TelemetrySnapshot`] from the previous one by clone-and-mutate: heading
//! creeps forward, attitude performs a bounded random walk, the vehicle
//! drifts along a slowly accelerating track and the acceleration/braking
//! history windows slide by one sample.  Operator feedback
//! ([`apply_manual_input`][TelemetrySimulator::apply_manual_input]) and
//! pinned attitude ([`apply_manual_yaw`][TelemetrySimulator::apply_manual_yaw])
//! are folded in between ticks and republished at once.
//!
//! The simulator only computes frames.  The fixed-period loop that calls
//! `tick` lives in the [`Console`][crate::console::Console], which only
//! drives it while [`is_running`][TelemetrySimulator::is_running].

use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roverdeck_middleware::{EventBus, StateSlot};
use roverdeck_types::{
    EventPayload, GeoPosition, Orientation, SampleWindow, TelemetrySnapshot, TemperatureReading,
};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::manual_override::{OverrideAxis, OverrideTable};

const EVENT_SOURCE: &str = "roverdeck-runtime::simulator";

/// Period of the simulated telemetry feed.
pub const DEFAULT_TELEMETRY_PERIOD: Duration = Duration::from_millis(1500);

/// How long an operator-set attitude value pins the simulation.
pub const DEFAULT_MANUAL_HOLD: Duration = Duration::from_millis(600);

/// Samples kept in each history window.
pub const HISTORY_LEN: usize = 20;

const ROLL_LIMIT: f64 = 10.0;
const PITCH_LIMIT: f64 = 8.0;
const MAX_SIM_SPEED: f64 = 42.0;
const MAX_MANUAL_SPEED: f64 = 60.0;
const BATTERY_DRAIN: f64 = 0.05;
const BATTERY_FLOOR: f64 = 20.0;
const TEMP_RANGE: (f64, f64) = (20.0, 72.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    pub period: Duration,
    pub manual_hold: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_TELEMETRY_PERIOD,
            manual_hold: DEFAULT_MANUAL_HOLD,
        }
    }
}

/// Map any angle in degrees into `[0, 360)`.
pub fn normalize_angle(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if normalized >= 360.0 { 0.0 } else { normalized }
}

fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() { lo } else { value.clamp(lo, hi) }
}

/// The frame shown before the first tick.
pub fn initial_snapshot() -> TelemetrySnapshot {
    TelemetrySnapshot {
        timestamp: Utc::now(),
        position: GeoPosition {
            lat: 48.1351,
            lon: 11.582,
        },
        heading: 0.0,
        orientation: Orientation::default(),
        temperatures: vec![
            TemperatureReading {
                label: "Temp #1".to_string(),
                value: 32.5,
            },
            TemperatureReading {
                label: "Temp #3".to_string(),
                value: 36.1,
            },
        ],
        acceleration: SampleWindow::from_fn(HISTORY_LEN, |i| i as f64 * 2.0),
        braking: SampleWindow::from_fn(HISTORY_LEN, |i| (i as f64 * 0.4).sin().max(0.0) * 30.0),
        speed: 18.0,
        battery: 86.0,
    }
}

pub struct TelemetrySimulator {
    config: SimulatorConfig,
    rng: StdRng,
    snapshot: TelemetrySnapshot,
    /// Ticks produced since construction; never reset.
    tick_count: u64,
    running: bool,
    overrides: OverrideTable,
    slot: StateSlot<TelemetrySnapshot>,
    bus: EventBus,
}

impl TelemetrySimulator {
    pub fn new(config: SimulatorConfig, bus: EventBus) -> Self {
        Self::with_rng(config, bus, StdRng::from_entropy())
    }

    /// A simulator whose random walk is reproducible.
    pub fn with_seed(config: SimulatorConfig, bus: EventBus, seed: u64) -> Self {
        Self::with_rng(config, bus, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimulatorConfig, bus: EventBus, rng: StdRng) -> Self {
        let snapshot = initial_snapshot();
        Self {
            config,
            rng,
            slot: StateSlot::new(snapshot.clone()),
            snapshot,
            tick_count: 0,
            running: false,
            overrides: OverrideTable::new(),
            bus,
        }
    }

    pub fn config(&self) -> SimulatorConfig {
        self.config
    }

    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.slot.subscribe()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    /// `disconnected → running`.  Returns `false` if already running.
    pub fn connect(&mut self) -> bool {
        if self.running {
            debug!("telemetry simulator already running");
            return false;
        }
        self.running = true;
        info!(period_ms = self.config.period.as_millis() as u64, "telemetry simulator connected");
        true
    }

    /// `running → disconnected`.  Returns `false` if already disconnected.
    pub fn disconnect(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        info!(ticks = self.tick_count, "telemetry simulator disconnected");
        true
    }

    /// Produce and publish the next frame.
    pub fn tick(&mut self) -> TelemetrySnapshot {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> TelemetrySnapshot {
        let prev = &self.snapshot;
        let mut next = prev.clone();
        next.timestamp = Utc::now();

        next.heading = normalize_angle(prev.heading + 5.0 + self.rng.gen_range(0.0..4.0));

        let walked = Orientation {
            roll: clamp(prev.orientation.roll + self.rng.gen_range(-2.0..2.0), -ROLL_LIMIT, ROLL_LIMIT),
            pitch: clamp(prev.orientation.pitch + self.rng.gen_range(-1.5..1.5), -PITCH_LIMIT, PITCH_LIMIT),
            yaw: normalize_angle(prev.orientation.yaw + self.rng.gen_range(-3.0..3.0)),
        };
        next.orientation = Orientation {
            roll: self.overrides.active(OverrideAxis::Roll, now).unwrap_or(walked.roll),
            pitch: self.overrides.active(OverrideAxis::Pitch, now).unwrap_or(walked.pitch),
            yaw: self.overrides.active(OverrideAxis::Yaw, now).unwrap_or(walked.yaw),
        };

        let displacement = self.tick_count as f64 * 1e-4;
        next.position = GeoPosition {
            lat: prev.position.lat + displacement * 0.3 + self.rng.gen_range(-5e-6..5e-6),
            lon: prev.position.lon + displacement * 0.25 + self.rng.gen_range(-5e-6..5e-6),
        };

        next.speed = clamp(prev.speed + self.rng.gen_range(-2.0..2.0), 0.0, MAX_SIM_SPEED);
        next.battery = clamp(prev.battery - BATTERY_DRAIN, BATTERY_FLOOR, 100.0);

        let accel = clamp(next.speed.max(0.0) * 1.4 + self.rng.gen_range(0.0..5.0), 0.0, 100.0);
        let brake = clamp(
            ((40.0 - next.speed) * 1.1 + self.rng.gen_range(0.0..3.0)).max(0.0),
            0.0,
            100.0,
        );
        next.acceleration.push(accel);
        next.braking.push(brake);

        for reading in &mut next.temperatures {
            reading.value = clamp(
                reading.value + self.rng.gen_range(-0.6..0.6),
                TEMP_RANGE.0,
                TEMP_RANGE.1,
            );
        }

        self.tick_count += 1;
        self.publish(next)
    }

    /// Fold operator throttle/brake (percent, clamped to `[0, 100]`) into the
    /// history windows and speed, and republish immediately.
    ///
    /// Every call appends one sample to each window, even when the values
    /// repeat.
    pub fn apply_manual_input(&mut self, throttle_percent: f64, brake_percent: f64) -> TelemetrySnapshot {
        let throttle = clamp(throttle_percent, 0.0, 100.0);
        let brake = clamp(brake_percent, 0.0, 100.0);

        let mut next = self.snapshot.clone();
        next.timestamp = Utc::now();
        next.acceleration.push(throttle);
        next.braking.push(brake);
        next.speed = clamp(next.speed + throttle * 0.05 - brake * 0.06, 0.0, MAX_MANUAL_SPEED);
        self.publish(next)
    }

    /// Pin yaw to `degrees` (normalized) for the manual hold.
    pub fn apply_manual_yaw(&mut self, degrees: f64) -> Option<TelemetrySnapshot> {
        self.apply_manual_override(OverrideAxis::Yaw, degrees)
    }

    /// Drop a pending yaw pin so the next tick resumes the random walk.
    pub fn clear_manual_yaw(&mut self) {
        self.overrides.clear(OverrideAxis::Yaw);
    }

    /// Pin one attitude axis for the manual hold.  Yaw is normalized to
    /// `[0, 360)`, roll and pitch are clamped to their ranges.
    ///
    /// Republishes (and returns the new frame) only if the visible value
    /// changed.
    pub fn apply_manual_override(&mut self, axis: OverrideAxis, value: f64) -> Option<TelemetrySnapshot> {
        self.apply_override_at(axis, value, Instant::now())
    }

    fn apply_override_at(&mut self, axis: OverrideAxis, value: f64, now: Instant) -> Option<TelemetrySnapshot> {
        let value = match axis {
            OverrideAxis::Yaw => normalize_angle(value),
            OverrideAxis::Roll => clamp(value, -ROLL_LIMIT, ROLL_LIMIT),
            OverrideAxis::Pitch => clamp(value, -PITCH_LIMIT, PITCH_LIMIT),
        };
        self.overrides.set(axis, value, self.config.manual_hold, now);
        debug!(%axis, value, "manual attitude override");

        let orientation = &self.snapshot.orientation;
        let current = match axis {
            OverrideAxis::Yaw => orientation.yaw,
            OverrideAxis::Roll => orientation.roll,
            OverrideAxis::Pitch => orientation.pitch,
        };
        if current == value {
            return None;
        }

        let mut next = self.snapshot.clone();
        next.timestamp = Utc::now();
        match axis {
            OverrideAxis::Yaw => next.orientation.yaw = value,
            OverrideAxis::Roll => next.orientation.roll = value,
            OverrideAxis::Pitch => next.orientation.pitch = value,
        }
        Some(self.publish(next))
    }

    fn publish(&mut self, next: TelemetrySnapshot) -> TelemetrySnapshot {
        self.snapshot = next;
        self.slot.publish(self.snapshot.clone());
        self.bus
            .emit(EVENT_SOURCE, EventPayload::Telemetry(self.snapshot.clone()));
        self.snapshot.clone()
    }
}
