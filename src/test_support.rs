//! Shared fixtures for unit tests.

use crate::command::executor::NodeExecutor;
use crate::command::handlers::CommandEndpoint;
use crate::command::protocol::{CommandEnvelope, ReplyEnvelope};
use crate::dispatch::transport::PeerTransport;
use crate::error::PeerFailure;
use crate::membership::types::{Node, NodeId};
use crate::workers::registry::LocalInstanceRegistry;
use crate::workers::types::{WorkerHandle, WorkerIdentity};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory worker that records every request it receives.
pub struct FakeWorker {
    identity: WorkerIdentity,
    partitions: Vec<String>,
    failing: bool,
    pub stops: AtomicUsize,
    pub restarts: AtomicUsize,
    pub reindexed: Mutex<Vec<String>>,
}

impl FakeWorker {
    pub fn new(kind: &str, name: &str, partitions: &[&str]) -> Self {
        Self {
            identity: WorkerIdentity::new(kind, name),
            partitions: partitions.iter().map(|p| p.to_string()).collect(),
            failing: false,
            stops: AtomicUsize::new(0),
            restarts: AtomicUsize::new(0),
            reindexed: Mutex::new(Vec::new()),
        }
    }

    /// A worker whose partition callbacks always fail.
    pub fn failing(kind: &str, name: &str) -> Self {
        Self {
            failing: true,
            ..Self::new(kind, name, &[])
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn restart_count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn reindexed(&self) -> Vec<String> {
        self.reindexed.lock().unwrap().clone()
    }
}

impl WorkerHandle for FakeWorker {
    fn identity(&self) -> WorkerIdentity {
        self.identity.clone()
    }

    fn request_stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn request_restart(&self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
    }

    fn owns_partition(&self, key: &str) -> anyhow::Result<bool> {
        if self.failing {
            return Err(anyhow::anyhow!("partition store unavailable"));
        }
        Ok(self.partitions.iter().any(|p| p == key))
    }

    fn schedule_full_reindex(&self, partition: Option<&str>) -> anyhow::Result<Vec<String>> {
        if self.failing {
            return Err(anyhow::anyhow!("partition store unavailable"));
        }
        let scheduled: Vec<String> = match partition {
            Some(key) => vec![key.to_string()],
            None => self.partitions.clone(),
        };
        self.reindexed.lock().unwrap().extend(scheduled.iter().cloned());
        Ok(scheduled)
    }
}

/// Cluster id used by every fixture endpoint.
pub const TEST_CLUSTER: &str = "test-cluster";

pub fn test_node(id: &str) -> Node {
    let port = 5000 + id.bytes().map(u16::from).sum::<u16>() % 1000;
    Node::alive(
        NodeId(id.to_string()),
        SocketAddr::from(([127, 0, 0, 1], port)),
        SocketAddr::from(([127, 0, 0, 1], port + 1000)),
    )
}

/// A node endpoint backed by a fresh registry holding `workers`.
pub fn test_endpoint(id: &str, workers: Vec<Arc<FakeWorker>>) -> Arc<CommandEndpoint> {
    let registry = LocalInstanceRegistry::new();
    for worker in workers {
        registry.register(worker).unwrap();
    }
    Arc::new(CommandEndpoint::new(
        NodeId(id.to_string()),
        TEST_CLUSTER,
        NodeExecutor::new(registry),
    ))
}

/// How a fake peer behaves when a command reaches it.
pub enum PeerBehaviour {
    Serve(Arc<CommandEndpoint>),
    ServeAfter(Duration, Arc<CommandEndpoint>),
    /// Never answers.
    Hang,
    Unreachable,
    /// Answers with a canned envelope whatever the command.
    Canned(ReplyEnvelope),
}

/// Transport that routes exchanges to in-process endpoints.
#[derive(Default)]
pub struct InMemoryTransport {
    peers: HashMap<NodeId, PeerBehaviour>,
}

impl InMemoryTransport {
    pub fn with(mut self, id: &str, behaviour: PeerBehaviour) -> Self {
        self.peers.insert(NodeId(id.to_string()), behaviour);
        self
    }
}

impl PeerTransport for InMemoryTransport {
    async fn exchange(
        &self,
        peer: &Node,
        envelope: &CommandEnvelope,
    ) -> Result<ReplyEnvelope, PeerFailure> {
        match self.peers.get(&peer.id) {
            Some(PeerBehaviour::Serve(endpoint)) => endpoint.answer(envelope),
            Some(PeerBehaviour::ServeAfter(delay, endpoint)) => {
                tokio::time::sleep(*delay).await;
                endpoint.answer(envelope)
            }
            Some(PeerBehaviour::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PeerFailure::Unreachable("hung".to_string()))
            }
            Some(PeerBehaviour::Canned(reply)) => Ok(reply.clone()),
            Some(PeerBehaviour::Unreachable) | None => {
                Err(PeerFailure::Unreachable(format!("no route to {}", peer.id)))
            }
        }
    }
}
