//! Monitor lifecycle state machine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Snapshot, TransitionKind};
use crate::Error;

/// Lifecycle phase of the monitoring loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorPhase {
    /// No tick task exists.
    #[default]
    Stopped,
    /// Priming from storage before the first tick.
    Starting,
    /// The tick task is scheduled.
    Running,
    /// Cancellation requested, waiting for the tick task to finish.
    Stopping,
}

impl MonitorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STOPPED" => Some(Self::Stopped),
            "STARTING" => Some(Self::Starting),
            "RUNNING" => Some(Self::Running),
            "STOPPING" => Some(Self::Stopping),
            _ => None,
        }
    }

    /// Running or about to be.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Validate a phase transition.
    pub fn can_transition_to(&self, target: MonitorPhase) -> bool {
        use MonitorPhase::*;

        match (self, target) {
            (from, to) if from == &to => true,
            (Stopped, Starting) => true,
            // Starting falls back to Stopped when priming fails validation
            (Starting, Running | Stopped) => true,
            (Running, Stopping) => true,
            (Stopping, Stopped) => true,
            _ => false,
        }
    }

    pub fn transition_to(&self, target: MonitorPhase) -> Result<MonitorPhase, Error> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(Error::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: target.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The mutable state owned by the monitoring loop.
///
/// Readers get clones through `ServerMonitor::status`, so a value of this
/// type always reflects fully completed ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    pub phase: MonitorPhase,
    pub last_snapshot: Option<Snapshot>,
    pub poll_interval: Duration,
    /// Set by a capacity warning, cleared by the matching normal or any connectivity change.
    pub capacity_alert_active: bool,
    pub ticks_completed: u64,
    pub last_transition: Option<TransitionKind>,
    pub started_at: Option<DateTime<Utc>>,
}

impl MonitorState {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            phase: MonitorPhase::Stopped,
            last_snapshot: None,
            poll_interval,
            capacity_alert_active: false,
            ticks_completed: 0,
            last_transition: None,
            started_at: None,
        }
    }

    pub fn running(&self) -> bool {
        self.phase == MonitorPhase::Running
    }

    /// Move to `target`, rejecting transitions the state machine forbids.
    pub fn set_phase(&mut self, target: MonitorPhase) -> Result<(), Error> {
        self.phase = self.phase.transition_to(target)?;
        Ok(())
    }
}
