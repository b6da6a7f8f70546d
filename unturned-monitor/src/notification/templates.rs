//! Message templates.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use crate::domain::{MonitorState, Snapshot, TransitionEvent, TransitionKind};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

fn players_line(snapshot: &Snapshot) -> String {
    match snapshot.occupancy() {
        Some(ratio) => format!(
            "Players: {}/{} ({:.0}%)",
            snapshot.player_count,
            snapshot.max_players,
            ratio * 100.0
        ),
        None => format!("Players: {}/{}", snapshot.player_count, snapshot.max_players),
    }
}

fn latency_line(snapshot: &Snapshot) -> Option<String> {
    snapshot.latency_ms.map(|ms| format!("Latency: {} ms", ms))
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() { "unknown" } else { value }
}

/// Renders notification text for one monitored server.
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    /// Human label, e.g. "Unturned Server".
    server_label: String,
    /// Game address shown to players, `host:port`.
    address: String,
}

impl MessageRenderer {
    pub fn new(server_label: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            server_label: server_label.into(),
            address: address.into(),
        }
    }

    pub fn server_label(&self) -> &str {
        &self.server_label
    }

    /// Text for a transition, or `None` when there is nothing to report.
    pub fn render(&self, event: &TransitionEvent) -> Option<String> {
        let current = &event.current;
        let mut lines = match event.kind {
            TransitionKind::None => return None,
            TransitionKind::CameOnline => {
                let mut lines = vec![
                    format!("[Server online] {}", self.server_label),
                    format!("Address: {}", self.address),
                    format!("Map: {}", or_unknown(&current.map_name)),
                    players_line(current),
                ];
                lines.extend(latency_line(current));
                lines
            }
            TransitionKind::WentOffline => {
                let mut lines = vec![
                    format!("[Server offline] {}", self.server_label),
                    format!("Address: {}", self.address),
                ];
                if let Some(previous) = &event.previous {
                    lines.push(format!("Last seen online: {}", local_time(previous.observed_at)));
                }
                lines.push(format!(
                    "Reason: {}",
                    current.failure_reason.as_deref().unwrap_or("no response")
                ));
                lines
            }
            TransitionKind::CapacityWarning => vec![
                format!("[Capacity warning] {}", self.server_label),
                players_line(current),
                "The server is close to full.".to_string(),
            ],
            TransitionKind::CapacityNormal => vec![
                format!("[Capacity normal] {}", self.server_label),
                players_line(current),
                "Player count is back to normal.".to_string(),
            ],
        };
        lines.push(format!("Time: {}", local_time(current.observed_at)));
        Some(lines.join("\n"))
    }

    /// Human-readable status, as answered to a status command.
    pub fn status_report(&self, state: &MonitorState) -> String {
        let mut lines = vec![format!("[Server status] {}", self.server_label)];
        lines.push(format!("Address: {}", self.address));

        match &state.last_snapshot {
            None => lines.push("Status: unknown (no check has completed yet)".to_string()),
            Some(s) if s.online => {
                lines.push("Status: online".to_string());
                if !s.server_name.is_empty() {
                    lines.push(format!("Name: {}", s.server_name));
                }
                lines.push(format!("Map: {}", or_unknown(&s.map_name)));
                lines.push(format!("Version: {}", or_unknown(&s.version)));
                lines.push(players_line(s));
                lines.extend(latency_line(s));
                lines.push(format!("Checked at: {}", local_time(s.observed_at)));
            }
            Some(s) => {
                lines.push("Status: offline".to_string());
                if let Some(reason) = &s.failure_reason {
                    lines.push(format!("Reason: {}", reason));
                }
                lines.push(format!("Checked at: {}", local_time(s.observed_at)));
            }
        }

        lines.push(format!(
            "Monitoring: {} (every {}s)",
            state.phase.as_str().to_ascii_lowercase(),
            state.poll_interval.as_secs()
        ));
        lines.join("\n")
    }

    /// Notice sent to superusers when the service starts.
    pub fn startup_notice(&self, poll_interval: Duration, monitoring: bool) -> String {
        [
            "[Monitor started]".to_string(),
            format!("Server: {} ({})", self.server_label, self.address),
            format!("Check interval: {}s", poll_interval.as_secs()),
            format!(
                "Monitoring: {}",
                if monitoring { "enabled" } else { "disabled" }
            ),
            format!("Started at: {}", local_time(Utc::now())),
        ]
        .join("\n")
    }

    /// Admin broadcast wrapper.
    pub fn announcement(&self, content: &str) -> String {
        format!("[Announcement]\n{}\n-- admin broadcast", content.trim())
    }

    /// Notice sent to superusers when the service shuts down.
    pub fn shutdown_notice(&self) -> String {
        [
            "[Monitor stopped]".to_string(),
            format!("Server: {} ({})", self.server_label, self.address),
            format!("Stopped at: {}", local_time(Utc::now())),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MonitorPhase;

    fn renderer() -> MessageRenderer {
        MessageRenderer::new("Test Server", "1.2.3.4:27015")
    }

    #[test]
    fn test_none_renders_nothing() {
        let event = TransitionEvent::new(
            TransitionKind::None,
            None,
            Snapshot::online(Utc::now(), 1, 2, "PEI"),
        );
        assert!(renderer().render(&event).is_none());
    }

    #[test]
    fn test_came_online_message() {
        let current = Snapshot::online(Utc::now(), 6, 24, "Washington").with_latency(42);
        let event = TransitionEvent::new(
            TransitionKind::CameOnline,
            Some(Snapshot::offline(Utc::now(), None)),
            current,
        );
        let text = renderer().render(&event).unwrap();
        assert!(text.starts_with("[Server online] Test Server"));
        assert!(text.contains("Address: 1.2.3.4:27015"));
        assert!(text.contains("Map: Washington"));
        assert!(text.contains("Players: 6/24 (25%)"));
        assert!(text.contains("Latency: 42 ms"));
    }

    #[test]
    fn test_went_offline_message_has_reason() {
        let event = TransitionEvent::new(
            TransitionKind::WentOffline,
            Some(Snapshot::online(Utc::now(), 6, 24, "PEI")),
            Snapshot::offline(Utc::now(), Some("connection refused".to_string())),
        );
        let text = renderer().render(&event).unwrap();
        assert!(text.starts_with("[Server offline]"));
        assert!(text.contains("Last seen online: "));
        assert!(text.contains("Reason: connection refused"));
    }

    #[test]
    fn test_capacity_messages() {
        let warning = TransitionEvent::new(
            TransitionKind::CapacityWarning,
            Some(Snapshot::online(Utc::now(), 10, 20, "PEI")),
            Snapshot::online(Utc::now(), 17, 20, "PEI"),
        );
        let text = renderer().render(&warning).unwrap();
        assert!(text.starts_with("[Capacity warning]"));
        assert!(text.contains("Players: 17/20 (85%)"));

        let normal = warning.with_kind(TransitionKind::CapacityNormal);
        assert!(renderer().render(&normal).unwrap().starts_with("[Capacity normal]"));
    }

    #[test]
    fn test_status_report_variants() {
        let mut state = MonitorState::new(Duration::from_secs(60));
        let text = renderer().status_report(&state);
        assert!(text.contains("Status: unknown"));
        assert!(text.contains("Monitoring: stopped (every 60s)"));

        state.phase = MonitorPhase::Running;
        state.last_snapshot = Some(
            Snapshot::online(Utc::now(), 3, 24, "PEI").with_server("My Server", "3.24.0.0"),
        );
        let text = renderer().status_report(&state);
        assert!(text.contains("Status: online"));
        assert!(text.contains("Name: My Server"));
        assert!(text.contains("Version: 3.24.0.0"));
        assert!(text.contains("Monitoring: running"));

        state.last_snapshot = Some(Snapshot::offline(Utc::now(), Some("timeout".to_string())));
        let text = renderer().status_report(&state);
        assert!(text.contains("Status: offline"));
        assert!(text.contains("Reason: timeout"));
    }

    #[test]
    fn test_notices() {
        let text = renderer().startup_notice(Duration::from_secs(30), true);
        assert!(text.contains("Check interval: 30s"));
        assert!(text.contains("Monitoring: enabled"));
        assert!(renderer().shutdown_notice().starts_with("[Monitor stopped]"));
        assert_eq!(
            renderer().announcement("  maintenance at 22:00 "),
            "[Announcement]\nmaintenance at 22:00\n-- admin broadcast"
        );
    }
}
