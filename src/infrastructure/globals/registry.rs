//! Read-through cache over the system globals table

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::CacheSettings;
use crate::domain::cache::{Cache, CacheExt};
use crate::domain::global::{
    DictOptions, GlobalFilter, GlobalName, GlobalPatch, GlobalRecord, GlobalSnapshot, GlobalValue,
};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

pub const DEFAULT_SNAPSHOT_KEY: &str = "SystemGlobals";
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(3600);

/// Front door for reading and writing system globals.
///
/// Reads are served from one snapshot stored under a single cache key and
/// only fall through to storage when that key is missing. Every write goes to
/// storage first and is then pushed into the snapshot, so a warm snapshot
/// never needs a full reload to observe a write made through the registry.
///
/// Records removed with [`GlobalRegistry::delete`] stay visible in a warm
/// snapshot until it is cleared or expires.
#[derive(Debug)]
pub struct GlobalRegistry {
    pub(super) storage: Arc<dyn Storage<GlobalRecord>>,
    cache: Arc<dyn Cache>,
    snapshot_key: String,
    ttl: Duration,
    // Serializes snapshot read-modify-write within this process
    write_lock: Mutex<()>,
}

impl GlobalRegistry {
    pub fn new(storage: Arc<dyn Storage<GlobalRecord>>, cache: Arc<dyn Cache>) -> Self {
        Self {
            storage,
            cache,
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            ttl: DEFAULT_SNAPSHOT_TTL,
            write_lock: Mutex::new(()),
        }
    }

    /// Builds a registry using the snapshot key and TTL from the `cache` config section
    pub fn from_settings(
        storage: Arc<dyn Storage<GlobalRecord>>,
        cache: Arc<dyn Cache>,
        settings: &CacheSettings,
    ) -> Self {
        Self::new(storage, cache)
            .with_snapshot_key(settings.snapshot_key.clone())
            .with_ttl(Duration::from_secs(settings.snapshot_ttl_secs))
    }

    pub fn with_snapshot_key(mut self, key: impl Into<String>) -> Self {
        self.snapshot_key = key.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn snapshot_key(&self) -> &str {
        &self.snapshot_key
    }

    /// Returns the coerced value of `name`
    pub async fn get_value(&self, name: &str) -> Result<GlobalValue, DomainError> {
        let snapshot = self.snapshot().await?;

        snapshot
            .get(name)
            .map(GlobalValue::coerce)
            .ok_or_else(|| DomainError::not_found(format!("System global '{}' not found", name)))
    }

    /// Projects the snapshot into a dictionary, see [`DictOptions`]
    pub async fn as_dict(
        &self,
        options: &DictOptions,
    ) -> Result<HashMap<String, GlobalValue>, DomainError> {
        Ok(self.snapshot().await?.to_dict(options))
    }

    /// Stores `value` under `name`, creating the record on first use
    #[instrument(skip(self, value))]
    pub async fn set(&self, name: &str, value: impl Into<GlobalValue>) -> Result<(), DomainError> {
        let name = GlobalName::new(name).map_err(|e| DomainError::validation(e.to_string()))?;
        let value: GlobalValue = value.into();
        let text = value.to_string();

        self.persist(&name, &text).await?;
        info!(name = %name, "System global written");

        self.write_through(vec![(name.to_string(), text)]).await;
        Ok(())
    }

    /// Fetches a full record straight from storage
    pub async fn record(&self, name: &str) -> Result<Option<GlobalRecord>, DomainError> {
        let name = GlobalName::new(name).map_err(|e| DomainError::validation(e.to_string()))?;
        debug!(name = %name, "Loading system global record");
        self.storage.get(&name).await
    }

    /// Lists every record straight from storage, ordered by name
    pub async fn records(&self) -> Result<Vec<GlobalRecord>, DomainError> {
        debug!("Listing system global records");
        let mut records = self.storage.list().await?;
        records.sort_by(|a, b| a.name().as_str().cmp(b.name().as_str()));
        Ok(records)
    }

    /// Removes a record from storage only. A warm snapshot keeps serving it.
    pub async fn delete(&self, name: &str) -> Result<bool, DomainError> {
        let name = GlobalName::new(name).map_err(|e| DomainError::validation(e.to_string()))?;
        let deleted = self.storage.delete(&name).await?;

        if deleted {
            info!(name = %name, "System global deleted");
        }

        Ok(deleted)
    }

    /// Rebuilds the snapshot from storage and overwrites the cached copy
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<GlobalSnapshot, DomainError> {
        // Held across load and store so a concurrent write-through cannot
        // land in between and be overwritten
        let _guard = self.write_lock.lock().await;
        let snapshot = self.load_from_storage().await?;

        if let Err(e) = self.cache.set(&self.snapshot_key, &snapshot, self.ttl).await {
            warn!(error = %e, "Failed to store reloaded system globals snapshot");
        }

        Ok(snapshot)
    }

    /// Drops the cached snapshot so the next read reloads it
    pub async fn clear_cache(&self) -> Result<(), DomainError> {
        let _guard = self.write_lock.lock().await;
        let removed = self.cache.delete(&self.snapshot_key).await?;
        info!(removed, "System globals snapshot invalidated");
        Ok(())
    }

    /// Current snapshot, loading it from storage when the cache has none
    pub async fn snapshot(&self) -> Result<GlobalSnapshot, DomainError> {
        if let Some(snapshot) = self.cached_snapshot().await {
            return Ok(snapshot);
        }

        let snapshot = self.load_from_storage().await?;

        // A writer may have populated the key while we were reading storage;
        // its copy is at least as new as ours
        match self
            .cache
            .set_nx(&self.snapshot_key, &snapshot, self.ttl)
            .await
        {
            Ok(true) => debug!("System globals snapshot populated"),
            Ok(false) => debug!("System globals snapshot populated concurrently"),
            Err(e) => warn!(error = %e, "Failed to store system globals snapshot"),
        }

        Ok(snapshot)
    }

    /// Pushes `entries` into the cached snapshot.
    ///
    /// Storage has already accepted the write, so failures here are logged
    /// rather than returned.
    pub(super) async fn write_through(&self, entries: Vec<(String, String)>) {
        if entries.is_empty() {
            return;
        }

        let _guard = self.write_lock.lock().await;

        let mut snapshot = match self.cached_snapshot().await {
            Some(snapshot) => snapshot,
            None => match self.load_from_storage().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "Failed to reload system globals for write-through");
                    self.discard_snapshot().await;
                    return;
                }
            },
        };

        let count = entries.len();
        for (name, value) in entries {
            snapshot.upsert(name, value);
        }

        match self.cache.set(&self.snapshot_key, &snapshot, self.ttl).await {
            Ok(()) => debug!(entries = count, "System globals snapshot updated"),
            Err(e) => {
                warn!(error = %e, "Failed to write through system globals snapshot");
                self.discard_snapshot().await;
            }
        }
    }

    async fn persist(&self, name: &GlobalName, text: &str) -> Result<(), DomainError> {
        let filter = GlobalFilter::name(name.as_str());
        let patch = GlobalPatch::value(text);

        debug!(name = %name, "Updating system global");
        if !self.storage.update_where(&filter, &patch).await?.is_empty() {
            return Ok(());
        }

        debug!(name = %name, "Creating system global");
        match self.storage.create(GlobalRecord::new(name.clone(), text)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => {
                warn!(name = %name, "System global created concurrently, retrying update");

                if self.storage.update_where(&filter, &patch).await?.is_empty() {
                    return Err(DomainError::storage_conflict(format!(
                        "System global '{}' could be neither created nor updated",
                        name
                    )));
                }

                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn cached_snapshot(&self) -> Option<GlobalSnapshot> {
        let raw = match self.cache.get_raw(&self.snapshot_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %self.snapshot_key, "System globals cache miss");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "System globals cache unreadable, using storage");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => {
                debug!(key = %self.snapshot_key, "System globals cache hit");
                Some(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "Discarding corrupt system globals snapshot");
                self.discard_snapshot().await;
                None
            }
        }
    }

    async fn load_from_storage(&self) -> Result<GlobalSnapshot, DomainError> {
        debug!("Fetching all system globals");
        let records = self.storage.list().await?;
        let snapshot = GlobalSnapshot::from_records(&records);

        info!(count = snapshot.len(), "System globals loaded from storage");
        Ok(snapshot)
    }

    async fn discard_snapshot(&self) {
        if let Err(e) = self.cache.delete(&self.snapshot_key).await {
            error!(error = %e, "Failed to discard system globals snapshot, it may be stale");
        }
    }
}
