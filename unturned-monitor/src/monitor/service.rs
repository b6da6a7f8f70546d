//! The monitoring loop.
//!
//! [`ServerMonitor`] owns the lifecycle (`start`/`stop`), the polling task and
//! the [`MonitorState`]. Every tick runs probe, store, detect and dispatch in
//! that order and is serialized with ad-hoc checks through the tick lock.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::detector::{CapacityThresholds, TransitionDetector, apply_capacity_latch};
use super::events::{MonitorEvent, MonitorEventBroadcaster};
use crate::database::repositories::StatusStore;
use crate::domain::{MonitorPhase, MonitorState, Snapshot, TransitionKind};
use crate::notification::NotificationDispatcher;
use crate::probe::{ProbeTarget, StatusProbe};
use crate::registry::RecipientRegistry;
use crate::{Error, Result};

const PRUNE_EVERY: Duration = Duration::from_secs(24 * 60 * 60);

/// Static configuration of one monitor.
///
/// See [`CapacityThresholds`] for which capacity notices the latch
/// suppresses, including the normal dropped after a cold start that began
/// above the warning ratio.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// A2S query address, `host:port`.
    pub address: String,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
    pub thresholds: CapacityThresholds,
    /// Keep history this long. `None` keeps everything.
    pub retention: Option<Duration>,
}

impl MonitorConfig {
    pub fn new(address: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            address: address.into(),
            poll_interval,
            probe_timeout: Duration::from_secs(5),
            thresholds: CapacityThresholds::default(),
            retention: None,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_thresholds(mut self, thresholds: CapacityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_retention(mut self, retention: Option<Duration>) -> Self {
        self.retention = retention;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ProbeTarget::parse(&self.address)?;
        if self.poll_interval.is_zero() {
            return Err(Error::config("poll interval must be greater than zero"));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::config("probe timeout must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct MonitorInner {
    config: MonitorConfig,
    probe: Arc<dyn StatusProbe>,
    store: Arc<dyn StatusStore>,
    registry: Arc<RecipientRegistry>,
    dispatcher: Arc<NotificationDispatcher>,
    detector: TransitionDetector,
    state: RwLock<MonitorState>,
    /// Serializes scheduled ticks with `force_check_now`.
    tick_lock: tokio::sync::Mutex<()>,
    events: MonitorEventBroadcaster,
    last_prune: Mutex<Option<Instant>>,
}

/// Periodically probes one server and notifies recipients of transitions.
pub struct ServerMonitor {
    inner: Arc<MonitorInner>,
    /// Held across the whole of `start` and `stop`.
    control: tokio::sync::Mutex<Option<RunHandle>>,
}

impl ServerMonitor {
    pub fn new(
        config: MonitorConfig,
        probe: Arc<dyn StatusProbe>,
        store: Arc<dyn StatusStore>,
        registry: Arc<RecipientRegistry>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        let state = MonitorState::new(config.poll_interval);
        let detector = TransitionDetector::new(config.thresholds);
        Self {
            inner: Arc::new(MonitorInner {
                config,
                probe,
                store,
                registry,
                dispatcher,
                detector,
                state: RwLock::new(state),
                tick_lock: tokio::sync::Mutex::new(()),
                events: MonitorEventBroadcaster::new(),
                last_prune: Mutex::new(None),
            }),
            control: tokio::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.inner.dispatcher
    }

    pub fn registry(&self) -> &Arc<RecipientRegistry> {
        &self.inner.registry
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.inner.store
    }

    pub fn events(&self) -> &MonitorEventBroadcaster {
        &self.inner.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    /// Clone of the current state. Never reflects a partially applied tick.
    pub fn status(&self) -> MonitorState {
        self.inner.state.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.read().running()
    }

    /// Start the polling task.
    ///
    /// Returns `AlreadyRunning` without side effects when the loop is
    /// `Starting` or `Running`. Configuration errors leave the phase at
    /// `Stopped`.
    pub async fn start(&self) -> Result<StartOutcome> {
        if self.inner.state.read().phase.is_active() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let mut control = self.control.lock().await;
        if control.is_some() || self.inner.state.read().phase.is_active() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        self.inner.config.validate()?;

        self.inner.state.write().set_phase(MonitorPhase::Starting)?;
        // Falls back to Stopped if this future is dropped while priming.
        let phase_guard = PhaseGuard::new(&self.inner.state, MonitorPhase::Starting);
        self.inner.prime().await;

        {
            let mut state = self.inner.state.write();
            state.set_phase(MonitorPhase::Running)?;
            state.started_at = Some(Utc::now());
        }
        phase_guard.disarm();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(self.inner.clone(), cancel.clone()));
        *control = Some(RunHandle { cancel, task });

        let config = &self.inner.config;
        info!(
            address = %config.address,
            interval_secs = config.poll_interval.as_secs(),
            "Server monitor started"
        );
        self.inner.events.publish(MonitorEvent::Started {
            address: config.address.clone(),
            poll_interval_secs: config.poll_interval.as_secs(),
            timestamp: Utc::now(),
        });

        Ok(StartOutcome::Started)
    }

    /// Stop the polling task.
    ///
    /// Interrupts the wait between ticks; a tick already in progress runs to
    /// completion before this returns.
    pub async fn stop(&self) -> Result<StopOutcome> {
        if !self.inner.state.read().phase.is_active() {
            return Ok(StopOutcome::AlreadyStopped);
        }

        let mut control = self.control.lock().await;
        let Some(handle) = control.take() else {
            return Ok(StopOutcome::AlreadyStopped);
        };

        self.inner.state.write().set_phase(MonitorPhase::Stopping)?;
        handle.cancel.cancel();
        // The task is already cancelled; if this future is dropped while
        // waiting for it, the phase must not stay at Stopping.
        let phase_guard = PhaseGuard::new(&self.inner.state, MonitorPhase::Stopping);
        if let Err(e) = handle.task.await {
            error!(error = %e, "Monitor task ended abnormally");
        }
        phase_guard.disarm();

        let ticks_completed = {
            let mut state = self.inner.state.write();
            state.set_phase(MonitorPhase::Stopped)?;
            state.started_at = None;
            state.ticks_completed
        };

        info!(ticks_completed, "Server monitor stopped");
        self.inner.events.publish(MonitorEvent::Stopped {
            ticks_completed,
            timestamp: Utc::now(),
        });

        Ok(StopOutcome::Stopped)
    }

    /// Run one tick now, outside the schedule.
    ///
    /// Waits for an in-flight scheduled tick and does not move the next one.
    /// Works whether or not the loop is running.
    pub async fn force_check_now(&self) -> Result<Snapshot> {
        self.inner.guarded_tick().await
    }
}

impl Drop for ServerMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.control.get_mut().as_ref() {
            handle.cancel.cancel();
        }
    }
}

/// Resets the phase from `pending` to `Stopped` on drop unless disarmed.
struct PhaseGuard<'a> {
    state: &'a RwLock<MonitorState>,
    pending: MonitorPhase,
    armed: bool,
}

impl<'a> PhaseGuard<'a> {
    fn new(state: &'a RwLock<MonitorState>, pending: MonitorPhase) -> Self {
        Self {
            state,
            pending,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.write();
        if state.phase == self.pending {
            warn!(phase = %self.pending, "Lifecycle call abandoned, resetting to STOPPED");
            state.phase = MonitorPhase::Stopped;
            state.started_at = None;
        }
    }
}

async fn run_loop(inner: Arc<MonitorInner>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(inner.config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Monitor loop cancelled");
                break;
            }
            _ = interval.tick() => {
                // Errors are logged and published inside.
                let _ = inner.guarded_tick().await;
            }
        }
    }
}

impl MonitorInner {
    /// Seed `last_snapshot` from the store so a restart does not re-announce
    /// the current state.
    async fn prime(&self) {
        let _guard = self.tick_lock.lock().await;

        match self.store.latest().await {
            Ok(Some(stored)) => {
                let mut state = self.state.write();
                let newer = state
                    .last_snapshot
                    .as_ref()
                    .is_none_or(|held| stored.observed_at > held.observed_at);
                if newer {
                    state.capacity_alert_active = self.detector.thresholds().is_high(&stored);
                    debug!(online = stored.online, "Primed last snapshot from store");
                    state.last_snapshot = Some(stored);
                }
            }
            Ok(None) => debug!("Status store is empty, cold start"),
            Err(e) => warn!(error = %e, "Failed to load latest status, cold start"),
        }
    }

    /// Run a tick under the tick lock. Errors and panics stop here.
    async fn guarded_tick(&self) -> Result<Snapshot> {
        let _guard = self.tick_lock.lock().await;

        let outcome = AssertUnwindSafe(self.tick()).catch_unwind().await;
        let error = match outcome {
            Ok(Ok(snapshot)) => return Ok(snapshot),
            Ok(Err(e)) => e,
            Err(panic) => Error::Other(format!("tick panicked: {}", panic_message(&*panic))),
        };

        error!(address = %self.config.address, error = %error, "Monitor tick failed");
        self.events.publish(MonitorEvent::TickFailed {
            error: error.to_string(),
            timestamp: Utc::now(),
        });
        Err(error)
    }

    async fn tick(&self) -> Result<Snapshot> {
        let snapshot = self
            .probe
            .probe(&self.config.address, self.config.probe_timeout)
            .await?;

        let persisted = match self.store.append(&snapshot).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to persist status snapshot");
                false
            }
        };

        let (previous, alert_active) = {
            let state = self.state.read();
            (state.last_snapshot.clone(), state.capacity_alert_active)
        };
        let detected = self.detector.detect(previous.as_ref(), &snapshot);
        let (kind, alert_active) = apply_capacity_latch(detected.kind, alert_active);
        if kind != detected.kind {
            debug!(detected = %detected.kind, "Capacity transition suppressed by latch");
        }
        let event = detected.with_kind(kind);

        if !event.is_none() {
            let recipients = self.registry.eligible_for(kind);
            let report = self.dispatcher.dispatch(&event, &recipients).await;
            info!(
                kind = %kind,
                online = snapshot.online,
                players = snapshot.player_count,
                max_players = snapshot.max_players,
                delivered = report.succeeded.len(),
                failed = report.failed.len(),
                "Server status transition"
            );
            self.events.publish(MonitorEvent::Transition {
                kind,
                previous: event.previous.clone(),
                current: event.current.clone(),
                delivered: report.succeeded.len(),
                failed: report.failed.len(),
                timestamp: Utc::now(),
            });
        }

        self.maybe_prune().await;

        {
            let mut state = self.state.write();
            state.last_snapshot = Some(snapshot.clone());
            state.capacity_alert_active = alert_active;
            state.ticks_completed += 1;
            if !kind.is_none() {
                state.last_transition = Some(kind);
            }
        }

        debug!(
            online = snapshot.online,
            players = snapshot.player_count,
            persisted,
            "Monitor tick completed"
        );
        self.events.publish(MonitorEvent::TickCompleted {
            snapshot: snapshot.clone(),
            persisted,
            timestamp: Utc::now(),
        });

        Ok(snapshot)
    }

    async fn maybe_prune(&self) {
        let Some(retention) = self.config.retention else {
            return;
        };
        {
            let mut last = self.last_prune.lock();
            if last.is_some_and(|at| at.elapsed() < PRUNE_EVERY) {
                return;
            }
            *last = Some(Instant::now());
        }

        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return;
        };
        let cutoff = Utc::now() - retention;
        match self.store.prune_before(cutoff).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Pruned old status history"),
            Err(e) => warn!(error = %e, "Failed to prune status history"),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::RecipientRepository;
    use crate::domain::{Recipient, RecipientKey};
    use crate::notification::{MessageRenderer, MessagingTransport};
    use crate::probe::{ScriptedOutcome, ScriptedProbe};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::BTreeMap;

    const ADDR: &str = "127.0.0.1:27016";

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<Snapshot>>,
        fail: bool,
        /// `latest` sleeps this long for this many calls.
        slow_latest: Mutex<Option<(Duration, u32)>>,
    }

    #[async_trait]
    impl StatusStore for MemoryStore {
        async fn append(&self, snapshot: &Snapshot) -> Result<()> {
            if self.fail {
                return Err(Error::Database("disk full".to_string()));
            }
            self.rows.lock().push(snapshot.clone());
            Ok(())
        }

        async fn latest(&self) -> Result<Option<Snapshot>> {
            let delay = {
                let mut slow = self.slow_latest.lock();
                match slow.as_mut() {
                    Some((delay, remaining)) if *remaining > 0 => {
                        *remaining -= 1;
                        Some(*delay)
                    }
                    _ => None,
                }
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(Error::Database("disk full".to_string()));
            }
            Ok(self.rows.lock().last().cloned())
        }

        async fn history(&self, limit: u32) -> Result<Vec<Snapshot>> {
            let rows = self.rows.lock();
            Ok(rows.iter().rev().take(limit as usize).cloned().collect())
        }

        async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
            let mut rows = self.rows.lock();
            let before = rows.len();
            rows.retain(|s| s.observed_at >= cutoff);
            Ok((before - rows.len()) as u64)
        }
    }

    #[derive(Default)]
    struct MemoryRecipients {
        rows: Mutex<BTreeMap<RecipientKey, Recipient>>,
    }

    #[async_trait]
    impl RecipientRepository for MemoryRecipients {
        async fn get_recipient(&self, key: &RecipientKey) -> Result<Option<Recipient>> {
            Ok(self.rows.lock().get(key).cloned())
        }

        async fn list_recipients(&self) -> Result<Vec<Recipient>> {
            Ok(self.rows.lock().values().cloned().collect())
        }

        async fn upsert_recipient(&self, recipient: &Recipient) -> Result<()> {
            self.rows.lock().insert(recipient.key(), recipient.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(RecipientKey, String)>>,
    }

    #[async_trait]
    impl MessagingTransport for RecordingTransport {
        fn transport_type(&self) -> &'static str {
            "recording"
        }

        async fn send_to_group(&self, group_id: &str, text: &str) -> Result<()> {
            self.sent
                .lock()
                .push((RecipientKey::group(group_id), text.to_string()));
            Ok(())
        }

        async fn send_to_user(&self, user_id: &str, text: &str) -> Result<()> {
            self.sent
                .lock()
                .push((RecipientKey::direct(user_id), text.to_string()));
            Ok(())
        }
    }

    struct Harness {
        monitor: ServerMonitor,
        probe: ScriptedProbe,
        transport: Arc<RecordingTransport>,
    }

    async fn harness(
        outcomes: Vec<ScriptedOutcome>,
        store: MemoryStore,
        poll_interval: Duration,
    ) -> Harness {
        let probe = ScriptedProbe::new(outcomes);
        let transport = Arc::new(RecordingTransport::default());
        let registry = Arc::new(RecipientRegistry::new(Arc::new(
            MemoryRecipients::default(),
        )));
        registry
            .ensure_registered(RecipientKey::group("100"))
            .await
            .unwrap();
        let dispatcher = Arc::new(NotificationDispatcher::new(
            transport.clone(),
            MessageRenderer::new("Test", "127.0.0.1:27015"),
        ));
        let monitor = ServerMonitor::new(
            MonitorConfig::new(ADDR, poll_interval),
            Arc::new(probe.clone()),
            Arc::new(store),
            registry,
            dispatcher,
        );
        Harness {
            monitor,
            probe,
            transport,
        }
    }

    #[tokio::test]
    async fn test_first_tick_is_silent() {
        let h = harness(
            vec![ScriptedOutcome::online(5, 24)],
            MemoryStore::default(),
            Duration::from_secs(60),
        )
        .await;

        let snapshot = h.monitor.force_check_now().await.unwrap();
        assert!(snapshot.online);
        assert!(h.transport.sent.lock().is_empty());

        let state = h.monitor.status();
        assert_eq!(state.last_snapshot, Some(snapshot));
        assert_eq!(state.ticks_completed, 1);
        assert_eq!(state.last_transition, None);
    }

    #[tokio::test]
    async fn test_offline_transition_notifies() {
        let h = harness(
            vec![ScriptedOutcome::online(5, 24), ScriptedOutcome::offline()],
            MemoryStore::default(),
            Duration::from_secs(60),
        )
        .await;

        h.monitor.force_check_now().await.unwrap();
        h.monitor.force_check_now().await.unwrap();

        let sent = h.transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.starts_with("[Server offline]"));
        assert_eq!(
            h.monitor.status().last_transition,
            Some(TransitionKind::WentOffline)
        );
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let h = harness(
            vec![ScriptedOutcome::online(1, 10)],
            MemoryStore::default(),
            Duration::from_secs(3600),
        )
        .await;

        assert_eq!(h.monitor.stop().await.unwrap(), StopOutcome::AlreadyStopped);
        assert_eq!(h.monitor.start().await.unwrap(), StartOutcome::Started);
        assert_eq!(
            h.monitor.start().await.unwrap(),
            StartOutcome::AlreadyRunning
        );
        assert!(h.monitor.is_running());

        assert_eq!(h.monitor.stop().await.unwrap(), StopOutcome::Stopped);
        assert_eq!(h.monitor.stop().await.unwrap(), StopOutcome::AlreadyStopped);
        assert_eq!(h.monitor.status().phase, MonitorPhase::Stopped);
        assert!(h.monitor.status().started_at.is_none());
    }

    #[tokio::test]
    async fn test_start_dropped_while_priming_resets_phase() {
        let store = MemoryStore {
            slow_latest: Mutex::new(Some((Duration::from_millis(500), 1))),
            ..MemoryStore::default()
        };
        let h = harness(
            vec![ScriptedOutcome::online(1, 10)],
            store,
            Duration::from_millis(20),
        )
        .await;

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), h.monitor.start()).await;
        assert!(abandoned.is_err());
        assert_eq!(h.monitor.status().phase, MonitorPhase::Stopped);
        assert!(h.monitor.status().started_at.is_none());
        assert!(!h.monitor.is_running());
        assert_eq!(h.monitor.stop().await.unwrap(), StopOutcome::AlreadyStopped);

        assert_eq!(h.monitor.start().await.unwrap(), StartOutcome::Started);
        assert_eq!(h.monitor.status().phase, MonitorPhase::Running);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(h.probe.calls() >= 1);

        assert_eq!(h.monitor.stop().await.unwrap(), StopOutcome::Stopped);
        assert_eq!(h.monitor.status().phase, MonitorPhase::Stopped);
    }

    #[tokio::test]
    async fn test_invalid_config_keeps_stopped() {
        let probe = ScriptedProbe::default();
        let registry = Arc::new(RecipientRegistry::new(Arc::new(
            MemoryRecipients::default(),
        )));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(RecordingTransport::default()),
            MessageRenderer::new("Test", "x"),
        ));
        let monitor = ServerMonitor::new(
            MonitorConfig::new("no-port", Duration::from_secs(60)),
            Arc::new(probe.clone()),
            Arc::new(MemoryStore::default()),
            registry,
            dispatcher,
        );

        let err = monitor.start().await.unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(monitor.status().phase, MonitorPhase::Stopped);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_start_primes_from_store() {
        let store = MemoryStore::default();
        store
            .rows
            .lock()
            .push(Snapshot::online(Utc::now(), 20, 24, "PEI"));
        let h = harness(
            vec![ScriptedOutcome::online(20, 24)],
            store,
            Duration::from_secs(3600),
        )
        .await;

        h.monitor.start().await.unwrap();
        let state = h.monitor.status();
        assert!(state.last_snapshot.is_some());
        assert!(state.capacity_alert_active);
        h.monitor.stop().await.unwrap();

        // Already high and primed: no repeated warning, no came-online.
        assert!(h.transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cold_start_above_warning_drops_later_normal() {
        let h = harness(
            vec![ScriptedOutcome::online(22, 24), ScriptedOutcome::online(5, 24)],
            MemoryStore::default(),
            Duration::from_secs(3600),
        )
        .await;

        h.monitor.force_check_now().await.unwrap();
        assert!(!h.monitor.status().capacity_alert_active);
        h.monitor.force_check_now().await.unwrap();

        assert!(h.transport.sent.lock().is_empty());
        assert_eq!(h.monitor.status().last_transition, None);
    }

    #[tokio::test]
    async fn test_primed_high_snapshot_delivers_later_normal() {
        let store = MemoryStore::default();
        store
            .rows
            .lock()
            .push(Snapshot::online(Utc::now(), 22, 24, "PEI"));
        let h = harness(
            vec![ScriptedOutcome::online(5, 24)],
            store,
            Duration::from_secs(3600),
        )
        .await;

        h.monitor.start().await.unwrap();
        h.monitor.stop().await.unwrap();
        h.monitor.force_check_now().await.unwrap();

        assert_eq!(h.transport.sent.lock().len(), 1);
        assert_eq!(
            h.monitor.status().last_transition,
            Some(TransitionKind::CapacityNormal)
        );
        assert!(!h.monitor.status().capacity_alert_active);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_block_tick() {
        let store = MemoryStore {
            fail: true,
            ..MemoryStore::default()
        };
        let h = harness(
            vec![ScriptedOutcome::offline(), ScriptedOutcome::online(3, 24)],
            store,
            Duration::from_secs(60),
        )
        .await;
        let mut events = h.monitor.subscribe();

        h.monitor.force_check_now().await.unwrap();
        h.monitor.force_check_now().await.unwrap();

        assert_eq!(h.transport.sent.lock().len(), 1);
        assert!(h.monitor.status().last_snapshot.unwrap().online);

        let mut persisted_flags = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let MonitorEvent::TickCompleted { persisted, .. } = event {
                persisted_flags.push(persisted);
            }
        }
        assert_eq!(persisted_flags, vec![false, false]);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_contained() {
        let h = harness(
            vec![ScriptedOutcome::Panic, ScriptedOutcome::online(1, 10)],
            MemoryStore::default(),
            Duration::from_secs(60),
        )
        .await;

        let err = h.monitor.force_check_now().await.unwrap_err();
        assert!(err.to_string().contains("tick panicked"));
        assert_eq!(h.monitor.status().ticks_completed, 0);

        assert!(h.monitor.force_check_now().await.unwrap().online);
        assert_eq!(h.monitor.status().ticks_completed, 1);
    }

    #[tokio::test]
    async fn test_loop_ticks_until_stopped() {
        let h = harness(
            vec![ScriptedOutcome::online(1, 10)],
            MemoryStore::default(),
            Duration::from_millis(20),
        )
        .await;

        h.monitor.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        h.monitor.stop().await.unwrap();

        let calls = h.probe.calls();
        assert!(calls >= 2, "expected several ticks, got {calls}");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(h.probe.calls(), calls);
    }

    #[tokio::test]
    async fn test_retention_prunes_once() {
        let store = MemoryStore::default();
        store.rows.lock().push(Snapshot::offline(
            Utc::now() - chrono::Duration::days(90),
            None,
        ));
        let probe = ScriptedProbe::new([ScriptedOutcome::online(1, 10)]);
        let store = Arc::new(store);
        let registry = Arc::new(RecipientRegistry::new(Arc::new(
            MemoryRecipients::default(),
        )));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(RecordingTransport::default()),
            MessageRenderer::new("Test", "x"),
        ));
        let monitor = ServerMonitor::new(
            MonitorConfig::new(ADDR, Duration::from_secs(60))
                .with_retention(Some(Duration::from_secs(30 * 24 * 3600))),
            Arc::new(probe),
            store.clone(),
            registry,
            dispatcher,
        );

        monitor.force_check_now().await.unwrap();
        let rows = store.rows.lock().clone();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].online);
    }
}
