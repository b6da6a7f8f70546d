//! Status history database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::{datetime_to_ms, ms_to_datetime};
use crate::domain::Snapshot;

/// One row of `server_status`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ServerStatusDbModel {
    pub id: i64,
    /// Unix epoch milliseconds.
    pub observed_at: i64,
    pub online: bool,
    pub player_count: i64,
    pub max_players: i64,
    pub map_name: String,
    pub server_name: String,
    pub version: String,
    pub latency_ms: Option<i64>,
    pub failure_reason: Option<String>,
}

impl ServerStatusDbModel {
    /// Build an insertable row. `id` is assigned by SQLite.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            id: 0,
            observed_at: datetime_to_ms(snapshot.observed_at),
            online: snapshot.online,
            player_count: i64::from(snapshot.player_count),
            max_players: i64::from(snapshot.max_players),
            map_name: snapshot.map_name.clone(),
            server_name: snapshot.server_name.clone(),
            version: snapshot.version.clone(),
            latency_ms: snapshot
                .latency_ms
                .map(|ms| i64::try_from(ms).unwrap_or(i64::MAX)),
            failure_reason: snapshot.failure_reason.clone(),
        }
    }

    /// Rebuild the domain value through the same constructors the probe uses,
    /// so rows written by older versions still satisfy the snapshot invariants.
    pub fn into_snapshot(self) -> Snapshot {
        let observed_at = ms_to_datetime(self.observed_at);
        if !self.online {
            return Snapshot::offline(observed_at, self.failure_reason);
        }

        let player_count = u32::try_from(self.player_count).unwrap_or(0);
        let max_players = u32::try_from(self.max_players).unwrap_or(0);
        let snapshot = Snapshot::online(observed_at, player_count, max_players, self.map_name)
            .with_server(self.server_name, self.version);
        match self.latency_ms.and_then(|ms| u64::try_from(ms).ok()) {
            Some(ms) => snapshot.with_latency(ms),
            None => snapshot,
        }
    }
}
