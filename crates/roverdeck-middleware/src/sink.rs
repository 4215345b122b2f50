//! The command sink seam.
//!
//! The input aggregator never speaks to a socket directly.  It hands every
//! [`ControlCommand`] to a [`CommandSink`]; the production sink is the
//! WebSocket [`TransportChannel`][crate::transport::TransportChannel], tests
//! plug in a [`RecordingSink`].

use std::sync::{Arc, Mutex, MutexGuard};

use roverdeck_types::ControlCommand;

/// What happened to a command handed to a [`CommandSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to an open connection.
    Sent,
    /// Not connected; the command was logged and discarded.
    Dropped,
}

/// Every outbound command destination must implement this trait.
///
/// # Contract
///
/// * `send` never fails and never blocks on the network.  A sink that cannot
///   deliver drops the command and reports [`SendOutcome::Dropped`].
pub trait CommandSink: Send + Sync {
    fn send(&self, command: &ControlCommand) -> SendOutcome;
}

impl<S: CommandSink + ?Sized> CommandSink for Arc<S> {
    fn send(&self, command: &ControlCommand) -> SendOutcome {
        (**self).send(command)
    }
}

/// In-memory sink that keeps every command it is handed.
///
/// Clones share the same log, so a test can keep one clone and give the
/// other to the component under test.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<Vec<ControlCommand>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command received so far, oldest first.
    pub fn commands(&self) -> Vec<ControlCommand> {
        self.lock().clone()
    }

    /// The wire `type` of every command received so far.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.lock().iter().map(ControlCommand::kind).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return everything received so far.
    pub fn take(&self) -> Vec<ControlCommand> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ControlCommand>> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CommandSink for RecordingSink {
    fn send(&self, command: &ControlCommand) -> SendOutcome {
        self.lock().push(command.clone());
        SendOutcome::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roverdeck_types::{CommandPayload, CommandSource, DriveMode};

    #[test]
    fn recording_sink_clones_share_log() {
        let sink = RecordingSink::new();
        let handle: Arc<dyn CommandSink> = Arc::new(sink.clone());

        let cmd = ControlCommand::new(CommandSource::Ui, CommandPayload::Mode { mode: DriveMode::Eco });
        assert_eq!(handle.send(&cmd), SendOutcome::Sent);

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.kinds(), vec!["mode"]);
        assert_eq!(sink.take(), vec![cmd]);
        assert!(sink.is_empty());
    }
}
