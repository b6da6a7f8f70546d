//! Recipient registry.
//!
//! The registry keeps every recipient in memory with write-through
//! persistence. Writers are serialized and persist before the cache is
//! touched, and each cache update swaps a whole record, so a concurrent
//! reader sees either the old or the new recipient, never a mix.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::database::repositories::RecipientRepository;
use crate::domain::{PreferenceKind, Recipient, RecipientChannel, RecipientKey, TransitionKind};
use crate::{Error, Result};

/// In-memory recipient set with write-through persistence.
pub struct RecipientRegistry {
    cache: RwLock<BTreeMap<RecipientKey, Recipient>>,
    repo: Arc<dyn RecipientRepository>,
    /// Serializes persist-then-swap sequences.
    write_lock: Mutex<()>,
}

impl RecipientRegistry {
    pub fn new(repo: Arc<dyn RecipientRepository>) -> Self {
        Self {
            cache: RwLock::new(BTreeMap::new()),
            repo,
            write_lock: Mutex::new(()),
        }
    }

    /// Populate the cache from storage, replacing whatever it held.
    pub async fn load(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let recipients = self.repo.list_recipients().await?;
        let count = recipients.len();

        let fresh: BTreeMap<_, _> = recipients.into_iter().map(|r| (r.key(), r)).collect();
        *self.cache.write() = fresh;

        info!("Loaded {} recipients into memory", count);
        Ok(count)
    }

    // ========== Reads ==========

    /// Enabled recipients that want `kind`, ordered by recipient id.
    pub fn eligible_for(&self, kind: TransitionKind) -> Vec<Recipient> {
        if kind.is_none() {
            return Vec::new();
        }
        self.cache
            .read()
            .values()
            .filter(|r| r.is_eligible_for(kind))
            .cloned()
            .collect()
    }

    /// Enabled recipients, optionally restricted to one channel.
    pub fn enabled(&self, channel: Option<RecipientChannel>) -> Vec<Recipient> {
        self.cache
            .read()
            .values()
            .filter(|r| r.enabled && channel.is_none_or(|c| r.channel == c))
            .cloned()
            .collect()
    }

    pub fn get(&self, key: &RecipientKey) -> Option<Recipient> {
        self.cache.read().get(key).cloned()
    }

    /// Every recipient, disabled ones included.
    pub fn list(&self) -> Vec<Recipient> {
        self.cache.read().values().cloned().collect()
    }

    // ========== Writes (persist first, then swap) ==========

    /// Insert or replace a recipient. An existing record keeps its `created_at`.
    pub async fn upsert(&self, mut recipient: Recipient) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.get(&recipient.key()) {
            recipient.created_at = existing.created_at;
        }
        self.persist_and_swap(recipient).await
    }

    /// Soft-disable a recipient. Returns the updated record.
    pub async fn disable(&self, key: &RecipientKey) -> Result<Recipient> {
        let _guard = self.write_lock.lock().await;
        let mut recipient = self
            .get(key)
            .ok_or_else(|| Error::not_found("Recipient", key.to_string()))?;

        if recipient.enabled {
            recipient.enabled = false;
            recipient.updated_at = Utc::now();
            self.persist_and_swap(recipient.clone()).await?;
            info!(recipient = %key, "Recipient disabled");
        }
        Ok(recipient)
    }

    /// Register `key` with channel defaults unless it already exists.
    /// Returns whether a new record was created.
    pub async fn ensure_registered(&self, key: RecipientKey) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if self.get(&key).is_some() {
            return Ok(false);
        }
        debug!(recipient = %key, "Registering recipient with defaults");
        self.persist_and_swap(Recipient::with_defaults(key)).await?;
        Ok(true)
    }

    /// Set one preference flag, registering the recipient with defaults
    /// first if it is unknown.
    pub async fn set_preference(
        &self,
        key: RecipientKey,
        kind: PreferenceKind,
        enabled: bool,
    ) -> Result<Recipient> {
        let _guard = self.write_lock.lock().await;
        let mut recipient = self
            .get(&key)
            .unwrap_or_else(|| Recipient::with_defaults(key.clone()));

        recipient.set_preference(kind, enabled);
        self.persist_and_swap(recipient.clone()).await?;

        info!(recipient = %key, preference = %kind, enabled, "Recipient preference updated");
        Ok(recipient)
    }

    /// Caller must hold `write_lock`.
    async fn persist_and_swap(&self, recipient: Recipient) -> Result<()> {
        self.repo.upsert_recipient(&recipient).await?;
        self.cache.write().insert(recipient.key(), recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Mock recipient repository for testing.
    #[derive(Default)]
    struct MockRecipientRepository {
        rows: parking_lot::Mutex<BTreeMap<RecipientKey, Recipient>>,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl RecipientRepository for MockRecipientRepository {
        async fn get_recipient(&self, key: &RecipientKey) -> Result<Option<Recipient>> {
            Ok(self.rows.lock().get(key).cloned())
        }

        async fn list_recipients(&self) -> Result<Vec<Recipient>> {
            Ok(self.rows.lock().values().cloned().collect())
        }

        async fn upsert_recipient(&self, recipient: &Recipient) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::Database("disk full".to_string()));
            }
            self.rows.lock().insert(recipient.key(), recipient.clone());
            Ok(())
        }
    }

    fn registry() -> (Arc<MockRecipientRepository>, RecipientRegistry) {
        let repo = Arc::new(MockRecipientRepository::default());
        let registry = RecipientRegistry::new(repo.clone());
        (repo, registry)
    }

    #[tokio::test]
    async fn test_eligible_for_is_sorted_and_filtered() {
        let (_, registry) = registry();
        registry.upsert(Recipient::group("300")).await.unwrap();
        registry.upsert(Recipient::direct("100")).await.unwrap();
        registry.upsert(Recipient::group("200")).await.unwrap();

        let online: Vec<String> = registry
            .eligible_for(TransitionKind::CameOnline)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(online, ["100", "200", "300"]);

        // Groups default to no capacity notices.
        let capacity = registry.eligible_for(TransitionKind::CapacityWarning);
        assert_eq!(capacity.len(), 1);
        assert_eq!(capacity[0].id, "100");

        assert!(registry.eligible_for(TransitionKind::None).is_empty());
    }

    #[tokio::test]
    async fn test_disable_is_soft() {
        let (repo, registry) = registry();
        registry.upsert(Recipient::group("1")).await.unwrap();

        let disabled = registry.disable(&RecipientKey::group("1")).await.unwrap();
        assert!(!disabled.enabled);
        assert!(registry.eligible_for(TransitionKind::WentOffline).is_empty());
        assert_eq!(registry.list().len(), 1);
        assert!(!repo.rows.lock()[&RecipientKey::group("1")].enabled);

        let missing = registry.disable(&RecipientKey::group("2")).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_ensure_registered_keeps_existing() {
        let (_, registry) = registry();
        let key = RecipientKey::group("9");
        registry
            .set_preference(key.clone(), PreferenceKind::Online, false)
            .await
            .unwrap();

        assert!(!registry.ensure_registered(key.clone()).await.unwrap());
        assert!(!registry.get(&key).unwrap().wants_online);

        assert!(registry.ensure_registered(RecipientKey::direct("9")).await.unwrap());
        assert_eq!(registry.list().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_cache_untouched() {
        let (repo, registry) = registry();
        registry.upsert(Recipient::group("1")).await.unwrap();
        repo.fail_writes.store(true, Ordering::SeqCst);

        let result = registry
            .set_preference(RecipientKey::group("1"), PreferenceKind::Online, false)
            .await;
        assert!(result.is_err());
        assert!(registry.get(&RecipientKey::group("1")).unwrap().wants_online);
    }

    #[tokio::test]
    async fn test_load_replaces_cache() {
        let (repo, registry) = registry();
        repo.upsert_recipient(&Recipient::direct("42")).await.unwrap();

        assert_eq!(registry.load().await.unwrap(), 1);
        assert!(registry.get(&RecipientKey::direct("42")).is_some());
        assert_eq!(registry.enabled(Some(RecipientChannel::Group)).len(), 0);
        assert_eq!(registry.enabled(Some(RecipientChannel::Direct)).len(), 1);
    }
}
