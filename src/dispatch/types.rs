use crate::command::types::{CommandRequest, NodeReply};
use crate::error::PeerFailure;
use crate::membership::types::NodeId;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What became of the exchange with one peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PeerOutcome {
    Answered(NodeReply),
    /// The peer contributed nothing. Never equivalent to a negative answer.
    Silent(PeerFailure),
}

/// One node's contribution to a cluster command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerResult {
    pub node: NodeId,
    pub outcome: PeerOutcome,
}

impl PeerResult {
    pub fn responded(&self) -> bool {
        matches!(self.outcome, PeerOutcome::Answered(_))
    }

    pub fn reply(&self) -> Option<&NodeReply> {
        match &self.outcome {
            PeerOutcome::Answered(reply) => Some(reply),
            PeerOutcome::Silent(_) => None,
        }
    }
}

/// Raw, unaggregated result of one scatter-gather round.
///
/// `per_node` is in arrival order. Only the aggregator collapses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResult {
    pub cluster_id: String,
    pub command: CommandRequest,
    pub per_node: Vec<PeerResult>,
}

impl ClusterResult {
    /// Number of nodes the command was sent to.
    pub fn queried(&self) -> usize {
        self.per_node.len()
    }

    /// Number of nodes that produced an answer.
    pub fn answered(&self) -> usize {
        self.per_node.iter().filter(|r| r.responded()).count()
    }

    /// Answers, in arrival order, with the node that gave them.
    pub fn replies(&self) -> impl Iterator<Item = (&NodeId, &NodeReply)> {
        self.per_node
            .iter()
            .filter_map(|result| result.reply().map(|reply| (&result.node, reply)))
    }

    pub fn silent(&self) -> Vec<SilentPeer> {
        self.per_node
            .iter()
            .filter_map(|result| match &result.outcome {
                PeerOutcome::Silent(failure) => Some(SilentPeer {
                    node: result.node.clone(),
                    failure: failure.clone(),
                }),
                PeerOutcome::Answered(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SilentPeer {
    pub node: NodeId,
    pub failure: PeerFailure,
}

/// How many nodes were asked and how many answered. Lets callers tell a
/// truthful empty answer from silence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coverage {
    pub queried: usize,
    pub answered: usize,
    pub silent: Vec<SilentPeer>,
}

impl Coverage {
    pub fn of(result: &ClusterResult) -> Self {
        Self {
            queried: result.queried(),
            answered: result.answered(),
            silent: result.silent(),
        }
    }

    pub fn complete(&self) -> bool {
        self.queried == self.answered
    }

    pub fn nobody_answered(&self) -> bool {
        self.answered == 0
    }
}

/// Aggregated answer to `ListWorkers`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerListing {
    pub workers: BTreeSet<String>,
    pub coverage: Coverage,
}

/// Aggregated answer to a stop/restart command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LifecycleOutcome {
    /// False renders as "worker not known".
    pub found: bool,
    /// Nodes that reported the worker. More than one entry means the
    /// one-node-per-worker rule was violated somewhere.
    pub found_on: Vec<NodeId>,
    pub coverage: Coverage,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FullUpdateStatus {
    /// No responding node runs the worker.
    WorkerUnknown,
    /// The worker runs somewhere but does not own the requested partition.
    PartitionNotOwned,
    Scheduled,
}

/// Aggregated answer to a full re-index command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FullUpdateOutcome {
    pub status: FullUpdateStatus,
    pub partition_key: Option<String>,
    pub scheduled_partitions: Vec<String>,
    pub found_on: Vec<NodeId>,
    pub coverage: Coverage,
}

impl FullUpdateOutcome {
    pub fn found(&self) -> bool {
        self.status == FullUpdateStatus::Scheduled
    }
}

/// Aggregated answer for whichever command was dispatched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command")]
pub enum ClusterAnswer {
    Workers(WorkerListing),
    Lifecycle(LifecycleOutcome),
    FullUpdate(FullUpdateOutcome),
}
