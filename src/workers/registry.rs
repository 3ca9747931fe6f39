//! Local Instance Registry
//!
//! Process-wide table of the workers running on this node. It is owned by the
//! node runtime and handed to whatever needs it as an `Arc`; nothing reaches it
//! through global state.
//!
//! Every operation takes a single shard lock for a short critical section, so
//! lifecycle events and command reads can interleave freely.

use super::types::{WorkerHandle, WorkerIdentity};
use crate::error::RegistryError;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Shared pointer to a running worker.
pub type WorkerRef = Arc<dyn WorkerHandle>;

pub struct LocalInstanceRegistry {
    workers: DashMap<WorkerIdentity, WorkerRef>,
}

impl LocalInstanceRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records a freshly started worker under its identity.
    ///
    /// # Errors
    /// `AlreadyRegistered` if a worker with the same identity is still
    /// present. The previous instance has to be stopped first.
    pub fn register(&self, handle: WorkerRef) -> Result<(), RegistryError> {
        let identity = handle.identity();

        match self.workers.entry(identity.clone()) {
            Entry::Occupied(_) => {
                tracing::warn!("Rejected start of {}: already registered", identity);
                Err(RegistryError::AlreadyRegistered {
                    kind: identity.kind,
                    name: identity.name,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(handle);
                tracing::info!("Registered worker {}", identity);
                Ok(())
            }
        }
    }

    /// Removes a worker. Absent identities are ignored.
    pub fn unregister(&self, identity: &WorkerIdentity) {
        if self.workers.remove(identity).is_some() {
            tracing::info!("Unregistered worker {}", identity);
        } else {
            tracing::debug!("Unregister of unknown worker {} ignored", identity);
        }
    }

    /// Removes the entry only while it still holds `handle`. A newer instance
    /// registered under the same identity is left alone.
    ///
    /// Returns whether the entry was removed.
    pub fn unregister_handle(&self, identity: &WorkerIdentity, handle: &WorkerRef) -> bool {
        let removed = self
            .workers
            .remove_if(identity, |_, current| Arc::ptr_eq(current, handle))
            .is_some();

        if removed {
            tracing::info!("Unregistered worker {}", identity);
        } else {
            tracing::debug!("Worker {} already replaced or gone, entry kept", identity);
        }
        removed
    }

    pub fn lookup(&self, identity: &WorkerIdentity) -> Option<WorkerRef> {
        self.workers.get(identity).map(|entry| entry.value().clone())
    }

    /// Resolves a worker by name alone, which is how cluster commands
    /// address workers.
    ///
    /// If several kinds share the name on this node the smallest identity
    /// wins.
    pub fn find_by_name(&self, name: &str) -> Option<WorkerRef> {
        let mut matches: Vec<(WorkerIdentity, WorkerRef)> = self
            .workers
            .iter()
            .filter(|entry| entry.key().name == name)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        if matches.len() > 1 {
            tracing::warn!(
                "{} workers named '{}' on this node, picking the first by kind",
                matches.len(),
                name
            );
        }

        matches.sort_by(|a, b| a.0.cmp(&b.0));
        matches.into_iter().next().map(|(_, handle)| handle)
    }

    /// Snapshot of the identities currently registered, sorted by kind then name.
    ///
    /// Later registrations do not show up in a snapshot already taken.
    pub fn list_all(&self) -> Vec<WorkerIdentity> {
        let mut identities: Vec<WorkerIdentity> = self
            .workers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        identities.sort();
        identities
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl Default for LocalInstanceRegistry {
    fn default() -> Self {
        Self {
            workers: DashMap::new(),
        }
    }
}
