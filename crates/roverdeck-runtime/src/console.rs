//! [`Console`] – the single control task of the operator console.
//!
//! One Tokio task owns the [`InputAggregator`], the [`GamepadSampler`], the
//! gamepad device and the [`TelemetrySimulator`].  Every mutation of the
//! control state and the telemetry frame happens on that task, in arrival
//! order, so none of them needs a lock.  The task multiplexes three sources:
//!
//! * the [`ConsoleInput`] queue fed by every [`ConsoleHandle`] clone;
//! * the telemetry ticker (only while the simulator is connected);
//! * the gamepad ticker (only while the sampler is started).
//!
//! After each input or gamepad tick the effective throttle/brake is mirrored
//! into the simulator as local feedback.

use std::sync::Arc;
use std::time::Duration;

use roverdeck_control::{GamepadSampler, InputAggregator, SamplerConfig};
use roverdeck_hal::GamepadDevice;
use roverdeck_middleware::{CommandSink, EventBus};
use roverdeck_types::{
    CommandSource, ControlState, DeckError, DriveMode, Key, KeySource, LightTarget, PanDirection,
    SteeringMode, TelemetrySnapshot,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::manual_override::OverrideAxis;
use crate::simulator::{SimulatorConfig, TelemetrySimulator};

/// Capacity of the input queue.
const INPUT_QUEUE: usize = 256;

/// Default gamepad polling rate (display refresh).
pub const DEFAULT_GAMEPAD_POLL_HZ: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsoleConfig {
    pub simulator: SimulatorConfig,
    pub sampler: SamplerConfig,
    pub gamepad_poll_interval: Duration,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            sampler: SamplerConfig::default(),
            gamepad_poll_interval: poll_interval(DEFAULT_GAMEPAD_POLL_HZ),
        }
    }
}

/// Tick period for a polling rate in Hz (at least 1 Hz).
pub fn poll_interval(hz: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(hz.max(1)))
}

/// Everything the console can be asked to do.
#[derive(Debug)]
pub enum ConsoleInput {
    Key {
        source: KeySource,
        key: Key,
        active: bool,
    },
    DriveMode(DriveMode),
    CycleDriveMode,
    SteeringMode(SteeringMode),
    CycleSteering,
    SelectCamera(String),
    PanCamera(PanDirection),
    CameraVector {
        x: f64,
        y: f64,
    },
    ToggleLed(LightTarget),
    ToggleLaser(LightTarget),
    LedIntensity(i32),
    CycleDisplayProfile,
    ManualYaw(f64),
    ManualOverride {
        axis: OverrideAxis,
        value: f64,
    },
    ClearManualYaw,
    TelemetryConnect,
    TelemetryDisconnect,
    GamepadStart,
    GamepadStop,
    Status(oneshot::Sender<ConsoleStatus>),
    Shutdown,
}

/// Point-in-time view of the control task.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleStatus {
    pub control: ControlState,
    pub telemetry_running: bool,
    pub telemetry_ticks: u64,
    pub gamepad_running: bool,
    pub gamepad_connected: bool,
    pub led_intensity: u8,
}

pub struct Console {
    config: ConsoleConfig,
    aggregator: InputAggregator,
    sampler: GamepadSampler,
    simulator: TelemetrySimulator,
    device: Box<dyn GamepadDevice>,
    bus: EventBus,
    /// Last throttle/brake percentages mirrored into the simulator.
    feedback: (f64, f64),
}

impl Console {
    pub fn new(
        config: ConsoleConfig,
        sink: Arc<dyn CommandSink>,
        device: Box<dyn GamepadDevice>,
        bus: EventBus,
    ) -> Self {
        Self {
            config,
            aggregator: InputAggregator::new(sink, bus.clone()),
            sampler: GamepadSampler::new(config.sampler, bus.clone()),
            simulator: TelemetrySimulator::new(config.simulator, bus.clone()),
            device,
            bus,
            feedback: (0.0, 0.0),
        }
    }

    /// Make the telemetry random walk reproducible.
    pub fn with_telemetry_seed(mut self, seed: u64) -> Self {
        self.simulator = TelemetrySimulator::with_seed(self.config.simulator, self.bus.clone(), seed);
        self
    }

    /// Move the console onto its own task.
    pub fn spawn(self) -> (ConsoleHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(INPUT_QUEUE);
        let handle = ConsoleHandle {
            tx,
            control: self.aggregator.subscribe(),
            telemetry: self.simulator.subscribe(),
            bus: self.bus.clone(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<ConsoleInput>) {
        let mut telemetry_ticker = ticker(self.config.simulator.period);
        let mut gamepad_ticker = ticker(self.config.gamepad_poll_interval);
        info!(device = self.device.name(), "console started");

        loop {
            tokio::select! {
                input = rx.recv() => match input {
                    Some(ConsoleInput::Shutdown) | None => break,
                    Some(input) => {
                        self.handle(input, &mut telemetry_ticker, &mut gamepad_ticker);
                        self.sync_feedback();
                    }
                },
                _ = telemetry_ticker.tick(), if self.simulator.is_running() => {
                    self.simulator.tick();
                }
                _ = gamepad_ticker.tick(), if self.sampler.is_running() => {
                    self.sampler.tick(self.device.as_mut(), &mut self.aggregator);
                    self.sync_feedback();
                }
            }
        }

        self.sampler.stop(&mut self.aggregator);
        self.simulator.disconnect();
        info!("console stopped");
    }

    fn handle(&mut self, input: ConsoleInput, telemetry_ticker: &mut Interval, gamepad_ticker: &mut Interval) {
        let ui = CommandSource::Ui;
        let agg = &mut self.aggregator;
        match input {
            ConsoleInput::Key { source, key, active } => {
                agg.set_key_state(source, key, active);
            }
            ConsoleInput::DriveMode(mode) => {
                agg.set_drive_mode(ui, mode);
            }
            ConsoleInput::CycleDriveMode => {
                agg.cycle_drive_mode(ui);
            }
            ConsoleInput::SteeringMode(mode) => {
                agg.set_steering_mode(ui, mode);
            }
            ConsoleInput::CycleSteering => {
                agg.cycle_steering_mode(ui);
            }
            ConsoleInput::SelectCamera(id) => agg.select_camera(ui, id),
            ConsoleInput::PanCamera(direction) => agg.pan_camera(ui, direction),
            ConsoleInput::CameraVector { x, y } => agg.camera_vector(ui, x, y),
            ConsoleInput::ToggleLed(target) => agg.toggle_led(ui, target),
            ConsoleInput::ToggleLaser(target) => agg.toggle_laser(ui, target),
            ConsoleInput::LedIntensity(value) => {
                agg.set_led_intensity(ui, value);
            }
            ConsoleInput::CycleDisplayProfile => agg.cycle_display_profile(ui),
            ConsoleInput::ManualYaw(degrees) => {
                self.simulator.apply_manual_yaw(degrees);
            }
            ConsoleInput::ManualOverride { axis, value } => {
                self.simulator.apply_manual_override(axis, value);
            }
            ConsoleInput::ClearManualYaw => self.simulator.clear_manual_yaw(),
            ConsoleInput::TelemetryConnect => {
                if self.simulator.connect() {
                    telemetry_ticker.reset();
                }
            }
            ConsoleInput::TelemetryDisconnect => {
                self.simulator.disconnect();
            }
            ConsoleInput::GamepadStart => {
                if !self.sampler.is_running() {
                    self.sampler.start();
                    gamepad_ticker.reset();
                }
            }
            ConsoleInput::GamepadStop => self.sampler.stop(&mut self.aggregator),
            ConsoleInput::Status(reply) => {
                let _ = reply.send(self.status());
            }
            // Handled by the run loop.
            ConsoleInput::Shutdown => {}
        }
    }

    fn status(&self) -> ConsoleStatus {
        ConsoleStatus {
            control: self.aggregator.state().clone(),
            telemetry_running: self.simulator.is_running(),
            telemetry_ticks: self.simulator.tick_count(),
            gamepad_running: self.sampler.is_running(),
            gamepad_connected: self.sampler.is_connected(),
            led_intensity: self.aggregator.led_intensity(),
        }
    }

    /// Mirror the effective throttle/brake into the simulator when it moved.
    ///
    /// With a controller attached its analog values are authoritative;
    /// otherwise `w` means full throttle and `s` full brake.
    fn sync_feedback(&mut self) {
        let state = self.aggregator.state();
        let feedback = if self.sampler.is_connected() {
            ((state.throttle * 100.0).round(), (state.brake * 100.0).round())
        } else {
            let pct = |key| if state.is_active(key) { 100.0 } else { 0.0 };
            (pct(Key::Forward), pct(Key::Backward))
        };

        if feedback != self.feedback {
            debug!(throttle = feedback.0, brake = feedback.1, "local feedback");
            self.feedback = feedback;
            self.simulator.apply_manual_input(feedback.0, feedback.1);
        }
    }
}

/// An interval whose first tick is one full period away.
fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Cheap, cloneable front door to a running [`Console`].
#[derive(Clone)]
pub struct ConsoleHandle {
    tx: mpsc::Sender<ConsoleInput>,
    control: watch::Receiver<ControlState>,
    telemetry: watch::Receiver<TelemetrySnapshot>,
    bus: EventBus,
}

impl ConsoleHandle {
    /// Queue `input` for the control task.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::Channel`] once the console has stopped.
    pub async fn send(&self, input: ConsoleInput) -> Result<(), DeckError> {
        self.tx
            .send(input)
            .await
            .map_err(|e| DeckError::Channel(format!("console stopped: {e}")))
    }

    pub async fn status(&self) -> Result<ConsoleStatus, DeckError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ConsoleInput::Status(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| DeckError::Channel("console dropped status request".to_string()))
    }

    /// Ask the control task to release everything and stop.
    pub async fn shutdown(&self) -> Result<(), DeckError> {
        self.send(ConsoleInput::Shutdown).await
    }

    pub fn control_state(&self) -> ControlState {
        self.control.borrow().clone()
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.borrow().clone()
    }

    pub fn subscribe_control(&self) -> watch::Receiver<ControlState> {
        self.control.clone()
    }

    pub fn subscribe_telemetry(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.telemetry.clone()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the control task has stopped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}
