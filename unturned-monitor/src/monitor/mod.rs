//! Server monitoring: transition detection, the polling loop and its events.

pub mod detector;
pub mod events;
mod service;

pub use detector::{CapacityThresholds, TransitionDetector, apply_capacity_latch};
pub use events::{MonitorEvent, MonitorEventBroadcaster};
pub use service::{MonitorConfig, ServerMonitor, StartOutcome, StopOutcome};
