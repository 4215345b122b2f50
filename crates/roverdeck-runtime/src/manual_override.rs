//! [`OverrideTable`] – operator-pinned attitude values with a time-to-live.
//!
//! An absolute operator set (e.g. dragging the yaw dial) pins one axis of the
//! simulated orientation for a short hold.  At most one override exists per
//! axis; a new set replaces the old one.  Expiry is evaluated lazily: an
//! override whose deadline has passed is discarded the next time it is read.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tokio::time::Instant;
//! use roverdeck_runtime::manual_override::{OverrideAxis, OverrideTable};
//!
//! let mut table = OverrideTable::new();
//! let now = Instant::now();
//! table.set(OverrideAxis::Yaw, 90.0, Duration::from_millis(600), now);
//!
//! assert_eq!(table.active(OverrideAxis::Yaw, now), Some(90.0));
//! assert_eq!(table.active(OverrideAxis::Yaw, now + Duration::from_secs(1)), None);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Orientation axis an override can pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverrideAxis {
    Yaw,
    Roll,
    Pitch,
}

impl fmt::Display for OverrideAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideAxis::Yaw => write!(f, "yaw"),
            OverrideAxis::Roll => write!(f, "roll"),
            OverrideAxis::Pitch => write!(f, "pitch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualOverride {
    pub axis: OverrideAxis,
    pub value: f64,
    pub expires_at: Instant,
}

impl ManualOverride {
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: BTreeMap<OverrideAxis, ManualOverride>,
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `axis` to `value` until `now + hold`, replacing any earlier pin.
    pub fn set(&mut self, axis: OverrideAxis, value: f64, hold: Duration, now: Instant) -> ManualOverride {
        let entry = ManualOverride {
            axis,
            value,
            expires_at: now + hold,
        };
        self.entries.insert(axis, entry);
        entry
    }

    /// The pinned value of `axis` at `now`.  An expired override is removed.
    pub fn active(&mut self, axis: OverrideAxis, now: Instant) -> Option<f64> {
        match self.entries.get(&axis) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value),
            Some(_) => {
                self.entries.remove(&axis);
                None
            }
            None => None,
        }
    }

    /// Whether an entry (expired or not) is still stored for `axis`.
    pub fn contains(&self, axis: OverrideAxis) -> bool {
        self.entries.contains_key(&axis)
    }

    pub fn get(&self, axis: OverrideAxis) -> Option<&ManualOverride> {
        self.entries.get(&axis)
    }

    pub fn clear(&mut self, axis: OverrideAxis) -> Option<ManualOverride> {
        self.entries.remove(&axis)
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD: Duration = Duration::from_millis(600);

    #[test]
    fn override_live_until_deadline_inclusive() {
        let mut table = OverrideTable::new();
        let t0 = Instant::now();
        table.set(OverrideAxis::Roll, 4.0, HOLD, t0);

        assert_eq!(table.active(OverrideAxis::Roll, t0 + HOLD), Some(4.0));
        assert_eq!(table.active(OverrideAxis::Roll, t0 + HOLD + Duration::from_millis(1)), None);
        assert!(!table.contains(OverrideAxis::Roll), "expired entry is dropped on read");
    }

    #[test]
    fn new_set_replaces_previous() {
        let mut table = OverrideTable::new();
        let t0 = Instant::now();
        table.set(OverrideAxis::Yaw, 10.0, HOLD, t0);
        let later = t0 + Duration::from_millis(500);
        table.set(OverrideAxis::Yaw, 20.0, HOLD, later);

        // The first deadline has passed; the replacement is still live.
        assert_eq!(table.active(OverrideAxis::Yaw, t0 + Duration::from_millis(700)), Some(20.0));
        assert_eq!(table.get(OverrideAxis::Yaw).map(|o| o.expires_at), Some(later + HOLD));
    }

    #[test]
    fn axes_are_independent() {
        let mut table = OverrideTable::new();
        let t0 = Instant::now();
        table.set(OverrideAxis::Yaw, 180.0, HOLD, t0);
        table.set(OverrideAxis::Pitch, -3.0, HOLD, t0);

        assert_eq!(table.clear(OverrideAxis::Yaw).map(|o| o.value), Some(180.0));
        assert_eq!(table.active(OverrideAxis::Yaw, t0), None);
        assert_eq!(table.active(OverrideAxis::Pitch, t0), Some(-3.0));

        table.clear_all();
        assert!(table.is_empty());
    }
}
