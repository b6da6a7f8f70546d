//! Transition detection.
//!
//! [`TransitionDetector`] is a pure comparison of two consecutive snapshots.
//! The capacity latch ([`apply_capacity_latch`]) sits on top of it and keeps
//! a warning from repeating until occupancy has returned to normal.

use serde::{Deserialize, Serialize};

use crate::domain::{Snapshot, TransitionEvent, TransitionKind};
use crate::{Error, Result};

pub const DEFAULT_WARNING_RATIO: f64 = 0.8;
pub const DEFAULT_NORMAL_RATIO: f64 = 0.6;

/// Occupancy thresholds. Invariant: `0 < normal_ratio < warning_ratio <= 1`.
///
/// The monitor gates capacity kinds through [`apply_capacity_latch`], so a
/// `CapacityNormal` is only sent after a `CapacityWarning` was. When the
/// first snapshot a monitor ever holds is already above `warning_ratio` (a
/// cold start with no stored history to prime from), no warning is sent for
/// it and the later drop back below `normal_ratio` is silent too. Priming
/// from a stored high snapshot sets the latch, so that normal is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityThresholds {
    warning_ratio: f64,
    normal_ratio: f64,
}

impl CapacityThresholds {
    pub fn new(warning_ratio: f64, normal_ratio: f64) -> Result<Self> {
        let valid = warning_ratio.is_finite()
            && normal_ratio.is_finite()
            && normal_ratio > 0.0
            && normal_ratio < warning_ratio
            && warning_ratio <= 1.0;
        if !valid {
            return Err(Error::config(format!(
                "capacity ratios must satisfy 0 < normal ({normal_ratio}) < warning ({warning_ratio}) <= 1"
            )));
        }
        Ok(Self {
            warning_ratio,
            normal_ratio,
        })
    }

    pub fn warning_ratio(&self) -> f64 {
        self.warning_ratio
    }

    pub fn normal_ratio(&self) -> f64 {
        self.normal_ratio
    }

    /// Whether the snapshot sits at or above the warning ratio.
    pub fn is_high(&self, snapshot: &Snapshot) -> bool {
        snapshot
            .occupancy()
            .is_some_and(|ratio| ratio >= self.warning_ratio)
    }
}

impl Default for CapacityThresholds {
    fn default() -> Self {
        Self {
            warning_ratio: DEFAULT_WARNING_RATIO,
            normal_ratio: DEFAULT_NORMAL_RATIO,
        }
    }
}

/// Classifies the change between two snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionDetector {
    thresholds: CapacityThresholds,
}

impl TransitionDetector {
    pub fn new(thresholds: CapacityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &CapacityThresholds {
        &self.thresholds
    }

    /// Compare `current` with `previous` and build the event.
    pub fn detect(&self, previous: Option<&Snapshot>, current: &Snapshot) -> TransitionEvent {
        let kind = self.classify(previous, current);
        TransitionEvent::new(kind, previous.cloned(), current.clone())
    }

    pub fn classify(&self, previous: Option<&Snapshot>, current: &Snapshot) -> TransitionKind {
        let Some(previous) = previous else {
            // Cold start: nothing to compare against.
            return TransitionKind::None;
        };

        match (previous.online, current.online) {
            (false, true) => return TransitionKind::CameOnline,
            (true, false) => return TransitionKind::WentOffline,
            (false, false) => return TransitionKind::None,
            (true, true) => {}
        }

        // occupancy() is None when max_players == 0
        let (Some(prev), Some(cur)) = (previous.occupancy(), current.occupancy()) else {
            return TransitionKind::None;
        };

        let warning = self.thresholds.warning_ratio;
        let normal = self.thresholds.normal_ratio;
        if prev < warning && warning <= cur {
            TransitionKind::CapacityWarning
        } else if prev >= normal && normal > cur {
            TransitionKind::CapacityNormal
        } else {
            TransitionKind::None
        }
    }
}

/// Gate a detected kind through the capacity latch.
///
/// Returns the kind to act on and the new latch value. A warning is dropped
/// while the latch is set and a normal is dropped while it is clear.
/// Connectivity changes always pass and clear the latch.
pub fn apply_capacity_latch(kind: TransitionKind, alert_active: bool) -> (TransitionKind, bool) {
    match kind {
        TransitionKind::CameOnline | TransitionKind::WentOffline => (kind, false),
        TransitionKind::CapacityWarning if alert_active => (TransitionKind::None, true),
        TransitionKind::CapacityWarning => (kind, true),
        TransitionKind::CapacityNormal if alert_active => (kind, false),
        TransitionKind::CapacityNormal => (TransitionKind::None, false),
        TransitionKind::None => (kind, alert_active),
    }
}
