//! Error types for the control plane.
//!
//! Only genuine failures live here. "Worker not found" and "partition not
//! owned" are ordinary outcomes and are modelled by the aggregated result
//! types in `dispatch::types`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised by the per-node worker registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A worker with the same identity is already running on this node.
    /// The previous instance must be stopped before a new one starts.
    #[error("worker {kind}/{name} is already registered on this node")]
    AlreadyRegistered { kind: String, name: String },
}

/// Failures while executing a command against the local registry.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A worker callback failed (e.g. while answering `owns_partition`).
    #[error("worker '{name}' failed while handling command: {source}")]
    Worker {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Why a peer did not contribute an answer to a cluster command.
///
/// Every variant means "this node is silent"; none of them may be read as
/// "the worker is not there".
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerFailure {
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    #[error("peer did not answer within {0} ms")]
    Timeout(u64),

    /// The peer answered with a non-success status, typically because the
    /// command failed on that node.
    #[error("peer rejected command: {0}")]
    Rejected(String),

    /// The peer answered with something that does not fit the command.
    #[error("protocol violation: {0}")]
    Protocol(String),
}
