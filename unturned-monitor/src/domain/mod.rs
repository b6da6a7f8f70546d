//! Domain types for server monitoring.

pub mod monitor;
pub mod recipient;
pub mod snapshot;
pub mod transition;

pub use monitor::{MonitorPhase, MonitorState};
pub use recipient::{PreferenceKind, Recipient, RecipientChannel, RecipientKey};
pub use snapshot::Snapshot;
pub use transition::{TransitionEvent, TransitionKind};
