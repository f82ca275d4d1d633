//! Override store
//!
//! Holds locally edited entity fields per identity and persists them as one
//! JSON blob through a [`KeyValueStore`].
//!
//! # Write model
//!
//! Every write replaces the whole record for an identity. [`OverrideStore::merge`]
//! provides patch semantics on top: read current record (or empty), lay the new
//! fields over it, write the whole record back. Callers must use `merge`
//! rather than a get/modify/put sequence of their own.
//!
//! # Persistence
//!
//! Durable writes are best effort. If the backing store fails, the failure is
//! logged and counted, and the in-memory records stay authoritative for the
//! session. A missing or unreadable blob at load time means "no overrides".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::model::{EntityFields, IdentityKey, OverrideRecord};
use crate::store::KeyValueStore;
use crate::time;
use crate::Error;

/// Storage key of the persisted override blob
pub const OVERRIDES_STORAGE_KEY: &str = "roster_overrides";

/// Persisted shape: `identity → { fields, lastModified }`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredOverride {
    fields: EntityFields,
    #[serde(rename = "lastModified")]
    last_modified: i64,
}

/// Keyed store of locally saved entity fields
pub struct OverrideStore<S: KeyValueStore> {
    backend: S,
    storage_key: String,
    records: BTreeMap<IdentityKey, StoredOverride>,
    failed_writes: u64,
}

impl<S: KeyValueStore> OverrideStore<S> {
    /// Load overrides from `backend` under the default storage key
    pub fn load(backend: S) -> Self {
        Self::load_with_key(backend, OVERRIDES_STORAGE_KEY)
    }

    /// Load overrides stored under `storage_key`
    pub fn load_with_key(backend: S, storage_key: impl Into<String>) -> Self {
        let storage_key = storage_key.into();
        let records: BTreeMap<IdentityKey, StoredOverride> = match backend.get(&storage_key) {
            Ok(Some(blob)) => match serde_json::from_str(&blob) {
                Ok(records) => records,
                Err(e) => {
                    warn!(key = %storage_key, error = %e, "Override blob unreadable; starting without overrides");
                    BTreeMap::new()
                }
            },
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!(key = %storage_key, error = %e, "Override blob could not be read; starting without overrides");
                BTreeMap::new()
            }
        };

        let latest = records
            .values()
            .map(|stored| stored.last_modified)
            .max()
            .and_then(time::from_millis);
        info!(count = records.len(), key = %storage_key, latest = ?latest, "Overrides loaded");

        Self {
            backend,
            storage_key,
            records,
            failed_writes: 0,
        }
    }

    /// Current override for `identity`
    pub fn get(&self, identity: &IdentityKey) -> Option<OverrideRecord> {
        self.records
            .get(identity)
            .map(|stored| to_record(identity, stored))
    }

    /// Replace the whole record for `identity`
    pub fn put(&mut self, identity: IdentityKey, fields: EntityFields) -> OverrideRecord {
        let stored = StoredOverride {
            fields,
            last_modified: time::now_millis(),
        };
        let record = to_record(&identity, &stored);
        self.records.insert(identity, stored);
        self.persist();
        record
    }

    /// Read-merge-write: lay `partial` over the current record (or an empty
    /// one) and store the result as a whole
    pub fn merge(&mut self, identity: IdentityKey, partial: EntityFields) -> OverrideRecord {
        let mut fields = self
            .records
            .get(&identity)
            .map(|stored| stored.fields.clone())
            .unwrap_or_default();
        fields.merge_from(partial);

        debug!(identity = %identity, "Merging override");
        self.put(identity, fields)
    }

    /// Drop the override for `identity`; returns whether one existed
    pub fn clear(&mut self, identity: &IdentityKey) -> bool {
        let existed = self.records.remove(identity).is_some();
        if existed {
            self.persist();
        }
        existed
    }

    /// All overrides, ordered by identity
    pub fn records(&self) -> impl Iterator<Item = OverrideRecord> + '_ {
        self.records
            .iter()
            .map(|(identity, stored)| to_record(identity, stored))
    }

    /// Number of durable writes that failed this session
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    fn persist(&mut self) {
        let result = serde_json::to_string(&self.records)
            .map_err(Error::from)
            .and_then(|blob| self.backend.put(&self.storage_key, &blob));

        if let Err(e) = result {
            self.failed_writes += 1;
            let failure = Error::PersistenceWriteFailure(e.to_string());
            warn!(
                key = %self.storage_key,
                failed_writes = self.failed_writes,
                "{}; keeping in-memory overrides",
                failure
            );
        }
    }
}

fn to_record(identity: &IdentityKey, stored: &StoredOverride) -> OverrideRecord {
    OverrideRecord {
        identity: identity.clone(),
        fields: stored.fields.clone(),
        last_modified: stored.last_modified,
    }
}
