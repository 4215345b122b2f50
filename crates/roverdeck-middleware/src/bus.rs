//! Headless, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the publisher.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::ControlState`] | Merged control state after every accepted input |
//! | [`Topic::Telemetry`] | Simulated or live telemetry frames |
//! | [`Topic::Commands`] | Every command handed to the transport |
//! | [`Topic::Gamepad`] | Controller connect/disconnect and button edges |
//!
//! Every event is also mirrored onto a firehose lane for collaborators that
//! want the whole stream (see [`EventBus::subscribe_all`]).

use roverdeck_types::{Event, EventPayload};
use tokio::sync::broadcast;
use tracing::trace;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes of the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ControlState,
    Telemetry,
    Commands,
    Gamepad,
}

impl Topic {
    /// The lane an event payload naturally belongs to.
    pub fn of(payload: &EventPayload) -> Self {
        match payload {
            EventPayload::ControlState(_) => Topic::ControlState,
            EventPayload::Telemetry(_) => Topic::Telemetry,
            EventPayload::Command(_) => Topic::Commands,
            EventPayload::GamepadConnection { .. } | EventPayload::GamepadButton(_) => {
                Topic::Gamepad
            }
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    all: broadcast::Sender<Event>,
    control_state: broadcast::Sender<Event>,
    telemetry: broadcast::Sender<Event>,
    commands: broadcast::Sender<Event>,
    gamepad: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity);
        let (control_state, _) = broadcast::channel(capacity);
        let (telemetry, _) = broadcast::channel(capacity);
        let (commands, _) = broadcast::channel(capacity);
        let (gamepad, _) = broadcast::channel(capacity);
        Self {
            all,
            control_state,
            telemetry,
            commands,
            gamepad,
        }
    }

    /// Publish `event` to the given [`Topic`] and to the firehose.
    ///
    /// Returns the number of topic subscribers that were handed the event.
    /// Having nobody listening is the normal state of a headless console, so
    /// it yields `0` rather than an error.
    pub fn publish_to(&self, topic: Topic, event: Event) -> usize {
        let _ = self.all.send(event.clone());
        match self.topic_sender(topic).send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(_)) => {
                trace!(?topic, "no subscribers on topic");
                0
            }
        }
    }

    /// Wrap `payload` into an [`Event`] from `source` and publish it on its
    /// natural topic.
    pub fn emit(&self, source: &str, payload: EventPayload) -> usize {
        let topic = Topic::of(&payload);
        self.publish_to(topic, Event::new(source, payload))
    }

    /// Subscribe to a single [`Topic`].
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to every event regardless of topic.
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.all.subscribe()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::ControlState => &self.control_state,
            Topic::Telemetry => &self.telemetry,
            Topic::Commands => &self.commands,
            Topic::Gamepad => &self.gamepad,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`][Self::recv].
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
