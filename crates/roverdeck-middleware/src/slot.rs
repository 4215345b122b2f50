//! Observable latest-value slot.
//!
//! A [`StateSlot`] holds the most recent value of some piece of console state
//! (the merged [`ControlState`][roverdeck_types::ControlState], the current
//! [`TelemetrySnapshot`][roverdeck_types::TelemetrySnapshot]).  Exactly one
//! owner publishes; any number of readers await changes on a
//! [`watch::Receiver`].
//!
//! Unlike the [`EventBus`][crate::bus::EventBus] a slot never lags: late
//! subscribers always see the latest value and intermediate values may be
//! skipped.

use tokio::sync::watch;

#[derive(Debug)]
pub struct StateSlot<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateSlot<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the current value and wake every subscriber.
    ///
    /// Succeeds even when nobody is subscribed.
    pub fn publish(&self, value: T) {
        self.tx.send_replace(value);
    }

    #[cfg(test)]
    fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// A receiver that starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for StateSlot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
