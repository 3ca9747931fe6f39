//! Fan-out/fan-in of one command across the live cluster.

use super::transport::PeerTransport;
use super::types::{ClusterResult, PeerOutcome, PeerResult};
use crate::command::protocol::{CommandEnvelope, PROTOCOL_VERSION, ReplyEnvelope};
use crate::command::types::CommandRequest;
use crate::config::DispatchConfig;
use crate::error::PeerFailure;
use crate::membership::directory::ClusterMembership;
use crate::membership::types::NodeId;

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;

pub struct Dispatcher<T: PeerTransport> {
    membership: Arc<dyn ClusterMembership>,
    transport: Arc<T>,
    config: DispatchConfig,
}

impl<T: PeerTransport> Dispatcher<T> {
    pub fn new(
        membership: Arc<dyn ClusterMembership>,
        transport: Arc<T>,
        config: DispatchConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            membership,
            transport,
            config,
        })
    }

    /// Sends `command` to every live member and waits until each one has
    /// answered or been marked silent.
    ///
    /// Every exchange runs in its own task. If the caller drops the returned
    /// future, exchanges already in flight still run to completion and their
    /// results are discarded.
    pub async fn dispatch(&self, command: CommandRequest) -> ClusterResult {
        let started = Instant::now();
        let peers = self.membership.live_members();
        let envelope = Arc::new(CommandEnvelope::new(
            self.config.cluster_id.clone(),
            command.clone(),
        ));
        let timeout = self.config.peer_timeout;

        tracing::info!("Dispatching {} to {} node(s)", command, peers.len());

        let mut pending: FuturesUnordered<_> = peers
            .into_iter()
            .map(|peer| {
                let transport = self.transport.clone();
                let envelope = envelope.clone();
                let node = peer.id.clone();

                let exchange = tokio::spawn(async move {
                    match tokio::time::timeout(timeout, transport.exchange(&peer, &envelope)).await
                    {
                        Ok(result) => result,
                        Err(_) => Err(PeerFailure::Timeout(timeout.as_millis() as u64)),
                    }
                });

                async move { (node, exchange.await) }
            })
            .collect();

        let mut per_node = Vec::with_capacity(pending.len());

        while let Some((node, joined)) = pending.next().await {
            let outcome = match joined {
                Ok(Ok(reply)) => validate_reply(&node, &command, reply),
                Ok(Err(failure)) => PeerOutcome::Silent(failure),
                Err(join_error) => PeerOutcome::Silent(PeerFailure::Rejected(format!(
                    "exchange task aborted: {}",
                    join_error
                ))),
            };

            match &outcome {
                PeerOutcome::Answered(_) => tracing::debug!("Node {} answered {}", node, command),
                PeerOutcome::Silent(failure) => {
                    tracing::warn!("Node {} silent for {}: {}", node, command, failure)
                }
            }

            per_node.push(PeerResult { node, outcome });
        }

        let result = ClusterResult {
            cluster_id: self.config.cluster_id.clone(),
            command,
            per_node,
        };

        tracing::info!(
            "{} finished in {:?}: {}/{} node(s) answered",
            result.command,
            started.elapsed(),
            result.answered(),
            result.queried()
        );

        result
    }
}

/// A reply only counts if it comes from the node we asked, speaks our
/// protocol version and has the shape the command expects.
fn validate_reply(node: &NodeId, command: &CommandRequest, envelope: ReplyEnvelope) -> PeerOutcome {
    if envelope.version != PROTOCOL_VERSION {
        return PeerOutcome::Silent(PeerFailure::Protocol(format!(
            "reply version {} (expected {})",
            envelope.version, PROTOCOL_VERSION
        )));
    }
    if &envelope.node_id != node {
        return PeerOutcome::Silent(PeerFailure::Protocol(format!(
            "reply signed by {} instead of {}",
            envelope.node_id, node
        )));
    }
    if !envelope.reply.answers(command) {
        return PeerOutcome::Silent(PeerFailure::Protocol(format!(
            "reply does not match command {}",
            command
        )));
    }

    PeerOutcome::Answered(envelope.reply)
}
