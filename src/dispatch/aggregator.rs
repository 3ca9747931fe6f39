//! Folding rules that turn a raw `ClusterResult` into one answer.
//!
//! - **ListWorkers**: union of every responding node's names.
//! - **Lifecycle**: found if any node reported the target.
//! - **FullUpdate**: found if any node reported the target; for a scoped
//!   update the owning node must also report the partition. Scheduled
//!   partitions are concatenated in arrival order.
//!
//! Silent nodes contribute nothing. If every node is silent the result is a
//! valid "unknown" answer, not an error.

use super::types::{
    ClusterAnswer, ClusterResult, Coverage, FullUpdateOutcome, FullUpdateStatus, LifecycleOutcome,
    WorkerListing,
};
use crate::command::types::{CommandRequest, NodeReply};
use crate::membership::types::NodeId;

use std::collections::BTreeSet;

pub fn aggregate(result: &ClusterResult) -> ClusterAnswer {
    match &result.command {
        CommandRequest::ListWorkers => ClusterAnswer::Workers(list_workers(result)),
        CommandRequest::Lifecycle { .. } => ClusterAnswer::Lifecycle(lifecycle(result)),
        CommandRequest::FullUpdate { .. } => ClusterAnswer::FullUpdate(full_update(result)),
    }
}

pub fn list_workers(result: &ClusterResult) -> WorkerListing {
    let mut workers = BTreeSet::new();

    for (_, reply) in result.replies() {
        if let NodeReply::Workers { names } = reply {
            workers.extend(names.iter().cloned());
        }
    }

    WorkerListing {
        workers,
        coverage: Coverage::of(result),
    }
}

pub fn lifecycle(result: &ClusterResult) -> LifecycleOutcome {
    let found_on: Vec<NodeId> = result
        .replies()
        .filter(|(_, reply)| matches!(reply, NodeReply::Lifecycle { target_found: true }))
        .map(|(node, _)| node.clone())
        .collect();

    warn_if_duplicated(result, &found_on);

    LifecycleOutcome {
        found: !found_on.is_empty(),
        found_on,
        coverage: Coverage::of(result),
    }
}

pub fn full_update(result: &ClusterResult) -> FullUpdateOutcome {
    let partition_key = match &result.command {
        CommandRequest::FullUpdate { partition_key, .. } => {
            partition_key.clone().filter(|key| !key.is_empty())
        }
        _ => None,
    };

    let mut found_on = Vec::new();
    let mut partition_owned = false;
    let mut scheduled_partitions = Vec::new();

    for (node, reply) in result.replies() {
        let NodeReply::FullUpdate {
            target_found: true,
            partition_found,
            scheduled_partitions: scheduled,
        } = reply
        else {
            continue;
        };

        found_on.push(node.clone());
        partition_owned |= *partition_found;
        scheduled_partitions.extend(scheduled.iter().cloned());
    }

    warn_if_duplicated(result, &found_on);

    let status = if found_on.is_empty() {
        FullUpdateStatus::WorkerUnknown
    } else if partition_key.is_some() && !partition_owned {
        FullUpdateStatus::PartitionNotOwned
    } else {
        FullUpdateStatus::Scheduled
    };

    FullUpdateOutcome {
        status,
        partition_key,
        scheduled_partitions,
        found_on,
        coverage: Coverage::of(result),
    }
}

fn warn_if_duplicated(result: &ClusterResult, found_on: &[NodeId]) {
    if found_on.len() > 1 {
        tracing::warn!(
            "{}: worker reported by {} nodes {:?}, expected at most one",
            result.command,
            found_on.len(),
            found_on
        );
    }
}
