//! Telemetry snapshot published to the view layer.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed-capacity sliding window of samples.
///
/// Once full, every [`push`][Self::push] drops the oldest sample so the
/// length never exceeds the capacity chosen at construction.  Serialized as
/// a plain JSON array; a deserialized window takes its capacity from the
/// array length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct SampleWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleWindow {
    /// An empty window holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// A full window whose `i`-th sample is `f(i)`.
    pub fn from_fn(capacity: usize, f: impl Fn(usize) -> f64) -> Self {
        Self {
            samples: (0..capacity).map(f).collect(),
            capacity,
        }
    }

    /// Append `value`, evicting the oldest sample when the window is full.
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
}

impl From<Vec<f64>> for SampleWindow {
    fn from(samples: Vec<f64>) -> Self {
        let capacity = samples.len();
        Self {
            samples: samples.into(),
            capacity,
        }
    }
}

impl From<SampleWindow> for Vec<f64> {
    fn from(window: SampleWindow) -> Self {
        window.samples.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
}

/// Vehicle attitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    /// Always in `[0, 360)`.
    pub yaw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub label: String,
    pub value: f64,
}

/// One complete telemetry frame.
///
/// Snapshots are values: the producer clones the previous frame and mutates
/// the clone, so a reader never observes a frame changing under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub timestamp: DateTime<Utc>,
    pub position: GeoPosition,
    /// Compass heading in `[0, 360)`.
    pub heading: f64,
    pub orientation: Orientation,
    /// Ordered as the sensors are listed on the vehicle.
    pub temperatures: Vec<TemperatureReading>,
    pub acceleration: SampleWindow,
    pub braking: SampleWindow,
    pub speed: f64,
    /// Charge in percent.
    pub battery: f64,
}
