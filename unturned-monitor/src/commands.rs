//! Typed command surface for admin and status commands.
//!
//! A chat command router or an HTTP layer calls these methods. Admin
//! commands return their outcome synchronously; nothing here touches the
//! monitor's schedule except `start_monitoring` and `stop_monitoring`.

use std::sync::Arc;

use tracing::info;

use crate::database::repositories::StatusStore;
use crate::domain::{PreferenceKind, Recipient, RecipientChannel, RecipientKey, Snapshot};
use crate::monitor::{ServerMonitor, StartOutcome, StopOutcome};
use crate::notification::DispatchReport;
use crate::registry::RecipientRegistry;
use crate::{Error, Result};

/// Most rows `history` returns in one call.
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Entry points for the command-dispatch layer.
#[derive(Clone)]
pub struct MonitorCommands {
    monitor: Arc<ServerMonitor>,
}

impl MonitorCommands {
    pub fn new(monitor: Arc<ServerMonitor>) -> Self {
        Self { monitor }
    }

    fn registry(&self) -> &RecipientRegistry {
        self.monitor.registry()
    }

    pub async fn start_monitoring(&self) -> Result<StartOutcome> {
        self.monitor.start().await
    }

    pub async fn stop_monitoring(&self) -> Result<StopOutcome> {
        self.monitor.stop().await
    }

    /// Last observed snapshot, `None` while the status is unknown.
    pub fn get_status(&self) -> Option<Snapshot> {
        self.monitor.status().last_snapshot
    }

    /// Run one ad-hoc tick without moving the schedule.
    pub async fn force_check_now(&self) -> Result<Snapshot> {
        self.monitor.force_check_now().await
    }

    /// Human-readable status, as answered to a chat status command.
    pub fn status_report(&self) -> String {
        self.monitor
            .dispatcher()
            .renderer()
            .status_report(&self.monitor.status())
    }

    /// Toggle one preference. Unknown recipients are registered with
    /// channel defaults first.
    pub async fn set_recipient_preference(
        &self,
        key: RecipientKey,
        kind: PreferenceKind,
        enabled: bool,
    ) -> Result<Recipient> {
        if key.id.trim().is_empty() {
            return Err(Error::validation("recipient id must not be empty"));
        }
        self.registry().set_preference(key, kind, enabled).await
    }

    /// Soft-disable a recipient.
    pub async fn disable_recipient(&self, key: &RecipientKey) -> Result<Recipient> {
        self.registry().disable(key).await
    }

    /// Every recipient, disabled ones included, ordered by id.
    pub fn list_recipients(&self) -> Vec<Recipient> {
        self.registry().list()
    }

    /// Send an announcement to every enabled group.
    pub async fn broadcast(&self, content: &str) -> Result<DispatchReport> {
        if content.trim().is_empty() {
            return Err(Error::validation("broadcast content must not be empty"));
        }
        let groups = self.registry().enabled(Some(RecipientChannel::Group));
        if groups.is_empty() {
            return Err(Error::validation("no groups to broadcast to"));
        }

        let dispatcher = self.monitor.dispatcher();
        let text = dispatcher.renderer().announcement(content);
        let report = dispatcher.send_text(&text, &groups).await;
        info!(
            delivered = report.succeeded.len(),
            failed = report.failed.len(),
            "Broadcast sent"
        );
        Ok(report)
    }

    /// Recent snapshots, newest first. `limit` is clamped to
    /// `1..=MAX_HISTORY_LIMIT`.
    pub async fn history(&self, limit: u32) -> Result<Vec<Snapshot>> {
        self.monitor
            .store()
            .history(limit.clamp(1, MAX_HISTORY_LIMIT))
            .await
    }
}
