//! Process-local ticket metadata cache.
//!
//! A concurrency-safe map from ticket identifier to descriptive metadata,
//! owned explicitly and passed by handle into the services so tests can
//! inject isolated instances. Cache contents are display data only: absence
//! after a confirmed registration is a reportable anomaly, not a forgery
//! signal (invariant I3).

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::types::{OwnerAddress, TicketId, TicketMetadata};

/// In-memory metadata store keyed by ticket identifier.
///
/// `get` distinguishes "absent" from "present": callers that expected a
/// record after a confirmed registration report absence rather than treating
/// it as not-found. A poisoned lock is absorbed - the map holds nothing but
/// display data.
#[derive(Debug, Default)]
pub struct MetadataStore {
    inner: RwLock<HashMap<TicketId, TicketMetadata>>,
}

impl MetadataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TicketId, TicketMetadata>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<TicketId, TicketMetadata>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or overwrites one record.
    pub fn put(&self, metadata: TicketMetadata) {
        self.write().insert(metadata.ticket_id.clone(), metadata);
    }

    /// Inserts a whole issuance batch under one lock acquisition, so
    /// concurrent readers never observe a partially written batch.
    pub fn put_all(&self, batch: Vec<TicketMetadata>) {
        let mut map = self.write();
        for metadata in batch {
            map.insert(metadata.ticket_id.clone(), metadata);
        }
    }

    /// Looks up one record. `None` means absent, never "present but empty".
    #[must_use]
    pub fn get(&self, ticket_id: &TicketId) -> Option<TicketMetadata> {
        self.read().get(ticket_id).cloned()
    }

    /// Updates the display owner for `ticket_id`, returning whether a record
    /// was present to update.
    pub fn update_owner(&self, ticket_id: &TicketId, owner: &OwnerAddress) -> bool {
        match self.write().get_mut(ticket_id) {
            Some(metadata) => {
                metadata.owner = owner.clone();
                true
            }
            None => false,
        }
    }

    /// Snapshot of every cached record, ordered by identifier for stable
    /// listings.
    #[must_use]
    pub fn all(&self) -> Vec<TicketMetadata> {
        let mut records: Vec<_> = self.read().values().cloned().collect();
        records.sort_by(|a, b| a.ticket_id.cmp(&b.ticket_id));
        records
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Removes one record. Exists for anomaly simulation in tests; the
    /// production flows never delete.
    pub fn remove(&self, ticket_id: &TicketId) -> Option<TicketMetadata> {
        self.write().remove(ticket_id)
    }
}
