//! A probe that replays a fixed script, for tests and dry runs.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{ProbeTarget, StatusProbe};
use crate::domain::Snapshot;
use crate::{Error, Result};

/// One scripted probe result.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedOutcome {
    Online {
        players: u32,
        max_players: u32,
        map: String,
    },
    /// Offline with an optional failure reason.
    Offline(Option<String>),
    /// Return `Err(Error::Probe)`.
    Error(String),
    /// Panic inside the probe.
    Panic,
}

impl ScriptedOutcome {
    pub fn online(players: u32, max_players: u32) -> Self {
        Self::Online {
            players,
            max_players,
            map: "PEI".to_string(),
        }
    }

    pub fn offline() -> Self {
        Self::Offline(Some("connection refused".to_string()))
    }
}

/// Replays outcomes in order, repeating the last one once the script runs out.
///
/// Cloning shares the script and the call counter.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    script: Arc<Mutex<VecDeque<ScriptedOutcome>>>,
    last: Arc<Mutex<Option<ScriptedOutcome>>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl ScriptedProbe {
    pub fn new(outcomes: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Sleep this long inside every probe call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue more outcomes after the current script.
    pub fn push(&self, outcome: ScriptedOutcome) {
        self.script.lock().push_back(outcome);
    }

    /// Number of completed or in-progress probe calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(outcome) => {
                *last = Some(outcome.clone());
                outcome
            }
            None => last.clone().unwrap_or(ScriptedOutcome::Offline(None)),
        }
    }
}

#[async_trait]
impl StatusProbe for ScriptedProbe {
    async fn probe(&self, address: &str, _timeout: Duration) -> Result<Snapshot> {
        ProbeTarget::parse(address)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.next_outcome();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let now = Utc::now();
        match outcome {
            ScriptedOutcome::Online {
                players,
                max_players,
                map,
            } => Ok(Snapshot::online(now, players, max_players, map).with_latency(1)),
            ScriptedOutcome::Offline(reason) => Ok(Snapshot::offline(now, reason)),
            ScriptedOutcome::Error(msg) => Err(Error::Probe(msg)),
            ScriptedOutcome::Panic => panic!("scripted probe panic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "127.0.0.1:27016";

    #[tokio::test]
    async fn test_replays_then_repeats_last() {
        let probe = ScriptedProbe::new([ScriptedOutcome::offline(), ScriptedOutcome::online(3, 10)]);
        let timeout = Duration::from_secs(1);

        assert!(!probe.probe(ADDR, timeout).await.unwrap().online);
        assert!(probe.probe(ADDR, timeout).await.unwrap().online);
        let repeated = probe.probe(ADDR, timeout).await.unwrap();
        assert!(repeated.online);
        assert_eq!(repeated.player_count, 3);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_is_clean_offline() {
        let probe = ScriptedProbe::default();
        let snapshot = probe.probe(ADDR, Duration::from_secs(1)).await.unwrap();
        assert!(!snapshot.online);
        assert!(snapshot.failure_reason.is_none());
    }

    #[tokio::test]
    async fn test_rejects_malformed_address() {
        let probe = ScriptedProbe::new([ScriptedOutcome::online(1, 2)]);
        assert!(probe.probe("nope", Duration::from_secs(1)).await.is_err());
        assert_eq!(probe.calls(), 0);
    }
}
