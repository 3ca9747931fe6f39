use serde::{Deserialize, Serialize};
use std::fmt;

/// Compound name of a worker: the partition type it serves plus its own name.
///
/// Used as the registry key. Immutable for the lifetime of a running worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerIdentity {
    pub kind: String,
    pub name: String,
}

impl WorkerIdentity {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// The slice of a running worker that the control plane relies on.
///
/// Implemented by the worker subsystem. Stop and restart requests are
/// fire-and-forget: their success or failure is reported by the worker
/// itself, not through the command result.
pub trait WorkerHandle: Send + Sync {
    fn identity(&self) -> WorkerIdentity;

    /// Begin a graceful shutdown.
    fn request_stop(&self);

    /// Shut down and start again with the last known configuration.
    fn request_restart(&self);

    fn owns_partition(&self, key: &str) -> anyhow::Result<bool>;

    /// Enqueue a full re-index of one partition, or of every owned partition
    /// when `partition` is `None`.
    ///
    /// Returns the partition keys that were scheduled, in scheduling order.
    fn schedule_full_reindex(&self, partition: Option<&str>) -> anyhow::Result<Vec<String>>;
}
