//! Point-in-time server observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation of the game server.
///
/// Offline snapshots carry no map, version or latency; use [`Snapshot::offline`]
/// so those fields are always cleared and cannot be mistaken for live data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub observed_at: DateTime<Utc>,
    pub online: bool,
    pub player_count: u32,
    pub max_players: u32,
    pub map_name: String,
    pub server_name: String,
    pub version: String,
    /// Query round trip, present only when online.
    pub latency_ms: Option<u64>,
    /// Why the probe failed, present only for error-caused offline snapshots.
    pub failure_reason: Option<String>,
}

impl Snapshot {
    /// Create an online snapshot. `player_count` is clamped to `max_players`
    /// when the capacity is known.
    pub fn online(
        observed_at: DateTime<Utc>,
        player_count: u32,
        max_players: u32,
        map_name: impl Into<String>,
    ) -> Self {
        let player_count = if max_players > 0 {
            player_count.min(max_players)
        } else {
            player_count
        };

        Self {
            observed_at,
            online: true,
            player_count,
            max_players,
            map_name: map_name.into(),
            server_name: String::new(),
            version: String::new(),
            latency_ms: None,
            failure_reason: None,
        }
    }

    /// Create an offline snapshot. `failure_reason` is `None` for a clean
    /// "server reports offline" and `Some` when an error caused it.
    pub fn offline(observed_at: DateTime<Utc>, failure_reason: Option<String>) -> Self {
        Self {
            observed_at,
            online: false,
            player_count: 0,
            max_players: 0,
            map_name: String::new(),
            server_name: String::new(),
            version: String::new(),
            latency_ms: None,
            failure_reason,
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        if self.online {
            self.latency_ms = Some(latency_ms);
        }
        self
    }

    pub fn with_server(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        if self.online {
            self.server_name = name.into();
            self.version = version.into();
        }
        self
    }

    /// Player occupancy in `[0, 1]`, or `None` when offline or capacity unknown.
    pub fn occupancy(&self) -> Option<f64> {
        if !self.online || self.max_players == 0 {
            return None;
        }
        Some(f64::from(self.player_count) / f64::from(self.max_players))
    }

    /// Whether this snapshot records a probe failure.
    pub fn is_failure(&self) -> bool {
        !self.online && self.failure_reason.is_some()
    }
}
