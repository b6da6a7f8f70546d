//! Monitor lifecycle and tick events.
//!
//! Events are published on a tokio broadcast channel for observers such as
//! an API layer or tests. Publishing never blocks the loop; with no
//! subscribers an event is simply dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::{Snapshot, TransitionKind};

/// Events emitted by the server monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// The loop entered `Running`.
    Started {
        address: String,
        poll_interval_secs: u64,
        timestamp: DateTime<Utc>,
    },
    /// The loop returned to `Stopped`.
    Stopped {
        ticks_completed: u64,
        timestamp: DateTime<Utc>,
    },
    /// A tick finished and `last_snapshot` now holds `snapshot`.
    TickCompleted {
        snapshot: Snapshot,
        /// Whether the snapshot reached the status store.
        persisted: bool,
        timestamp: DateTime<Utc>,
    },
    /// A transition was detected and dispatched.
    Transition {
        kind: TransitionKind,
        previous: Option<Snapshot>,
        current: Snapshot,
        delivered: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },
    /// A tick was aborted by an unexpected error or panic.
    TickFailed {
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl MonitorEvent {
    /// Get a human-readable description of the event.
    pub fn description(&self) -> String {
        match self {
            MonitorEvent::Started {
                address,
                poll_interval_secs,
                ..
            } => format!("monitoring {} every {}s", address, poll_interval_secs),
            MonitorEvent::Stopped {
                ticks_completed, ..
            } => format!("monitoring stopped after {} ticks", ticks_completed),
            MonitorEvent::TickCompleted { snapshot, .. } => {
                if snapshot.online {
                    format!(
                        "online {}/{} on {}",
                        snapshot.player_count, snapshot.max_players, snapshot.map_name
                    )
                } else {
                    format!(
                        "offline ({})",
                        snapshot.failure_reason.as_deref().unwrap_or("no reply")
                    )
                }
            }
            MonitorEvent::Transition {
                kind,
                delivered,
                failed,
                ..
            } => format!("{}: {} delivered, {} failed", kind, delivered, failed),
            MonitorEvent::TickFailed { error, .. } => format!("tick failed: {}", error),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            MonitorEvent::Started { timestamp, .. }
            | MonitorEvent::Stopped { timestamp, .. }
            | MonitorEvent::TickCompleted { timestamp, .. }
            | MonitorEvent::Transition { timestamp, .. }
            | MonitorEvent::TickFailed { timestamp, .. } => *timestamp,
        }
    }
}

/// Broadcaster for monitor events.
#[derive(Clone)]
pub struct MonitorEventBroadcaster {
    sender: broadcast::Sender<MonitorEvent>,
}

impl MonitorEventBroadcaster {
    /// Create a new broadcaster with default capacity (256).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns the number of receivers it reached.
    pub fn publish(&self, event: MonitorEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MonitorEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
