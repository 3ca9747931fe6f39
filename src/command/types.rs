use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecycleOp {
    Stop,
    Restart,
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleOp::Stop => f.write_str("stop"),
            LifecycleOp::Restart => f.write_str("restart"),
        }
    }
}

/// A cluster-wide operator command.
///
/// Every variant carries only the addressing data a node needs to execute it
/// locally. Workers are addressed by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum CommandRequest {
    ListWorkers,
    Lifecycle {
        op: LifecycleOp,
        target: String,
    },
    /// `partition_key: None` means every partition owned by the worker.
    FullUpdate {
        target: String,
        partition_key: Option<String>,
    },
}

impl CommandRequest {
    pub fn list_workers() -> Self {
        CommandRequest::ListWorkers
    }

    pub fn lifecycle(op: LifecycleOp, target: impl Into<String>) -> Self {
        CommandRequest::Lifecycle {
            op,
            target: target.into(),
        }
    }

    /// An empty partition key is treated the same as no key.
    pub fn full_update(target: impl Into<String>, partition_key: Option<String>) -> Self {
        CommandRequest::FullUpdate {
            target: target.into(),
            partition_key: partition_key.filter(|key| !key.is_empty()),
        }
    }
}

impl fmt::Display for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandRequest::ListWorkers => f.write_str("list-workers"),
            CommandRequest::Lifecycle { op, target } => write!(f, "{} '{}'", op, target),
            CommandRequest::FullUpdate {
                target,
                partition_key: Some(key),
            } => write!(f, "full-update '{}' partition '{}'", target, key),
            CommandRequest::FullUpdate {
                target,
                partition_key: None,
            } => write!(f, "full-update '{}'", target),
        }
    }
}

/// What one node answers to a command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum NodeReply {
    /// Names of the workers running on the node. May be empty.
    Workers { names: BTreeSet<String> },
    /// `target_found` is true iff the worker ran here and the operation was issued.
    Lifecycle { target_found: bool },
    FullUpdate {
        target_found: bool,
        partition_found: bool,
        scheduled_partitions: Vec<String>,
    },
}

impl NodeReply {
    /// Whether this reply has the shape expected for `command`.
    pub fn answers(&self, command: &CommandRequest) -> bool {
        matches!(
            (self, command),
            (NodeReply::Workers { .. }, CommandRequest::ListWorkers)
                | (NodeReply::Lifecycle { .. }, CommandRequest::Lifecycle { .. })
                | (NodeReply::FullUpdate { .. }, CommandRequest::FullUpdate { .. })
        )
    }
}
