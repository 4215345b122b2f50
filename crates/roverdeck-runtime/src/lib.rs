//! `roverdeck-runtime` – the console's execution engine.
//!
//! # Modules
//!
//! - [`console`] – [`Console`][console::Console]: the single control task that
//!   owns the aggregator, the gamepad sampler and the telemetry simulator,
//!   and its cloneable [`ConsoleHandle`][console::ConsoleHandle].
//! - [`simulator`] – [`TelemetrySimulator`][simulator::TelemetrySimulator]:
//!   synthesizes a plausible telemetry stream when no live feed exists.
//! - [`manual_override`] – [`OverrideTable`][manual_override::OverrideTable]:
//!   operator-pinned attitude values that expire after a short hold.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod console;
pub mod manual_override;
pub mod simulator;
pub mod telemetry;

pub use console::{Console, ConsoleConfig, ConsoleHandle, ConsoleInput, ConsoleStatus};
pub use manual_override::{ManualOverride, OverrideAxis, OverrideTable};
pub use simulator::{SimulatorConfig, TelemetrySimulator};
pub use telemetry::{LogFormat, TracerProviderGuard, TracingConfig, init_tracing};
