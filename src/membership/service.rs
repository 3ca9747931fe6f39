use super::directory::ClusterMembership;
use super::types::{GossipMessage, Node, NodeId, NodeState};

use anyhow::Result;
use dashmap::DashMap;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

/// Timing knobs of the gossip protocol.
#[derive(Debug, Clone)]
pub struct GossipTimings {
    pub gossip_interval: Duration,
    pub failure_check_interval: Duration,
    pub suspect_after: Duration,
    pub dead_after: Duration,
}

impl Default for GossipTimings {
    fn default() -> Self {
        Self {
            gossip_interval: Duration::from_millis(500),
            failure_check_interval: Duration::from_secs(2),
            suspect_after: Duration::from_secs(5),
            dead_after: Duration::from_secs(10),
        }
    }
}

/// SWIM-like gossip membership over UDP.
pub struct MembershipService {
    pub local_node: Node,
    pub members: Arc<DashMap<NodeId, Node>>,
    socket: Arc<UdpSocket>,
    incarnation: AtomicU64,
    timings: GossipTimings,
}

impl MembershipService {
    /// Binds the gossip socket and announces this node to the seeds.
    ///
    /// `http_port_offset` is added to the bound gossip port to obtain the
    /// port cluster commands are served on.
    pub async fn new(
        bind_addr: SocketAddr,
        seed_nodes: Vec<SocketAddr>,
        http_port_offset: u16,
        timings: GossipTimings,
    ) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(bind_addr).await?;
        let gossip_addr = socket.local_addr()?;
        let http_addr = SocketAddr::new(
            gossip_addr.ip(),
            gossip_addr.port().wrapping_add(http_port_offset),
        );

        let local_node = Node::alive(NodeId::new(), gossip_addr, http_addr);
        let members = Arc::new(DashMap::new());
        members.insert(local_node.id.clone(), local_node.clone());

        if !seed_nodes.is_empty() {
            tracing::info!("Joining cluster via {} seed node(s)", seed_nodes.len());
            let encoded = bincode::serialize(&GossipMessage::Join {
                node: local_node.clone(),
            })?;
            for seed in &seed_nodes {
                socket.send_to(&encoded, seed).await?;
                tracing::info!("Sent join request to {}", seed);
            }
        }

        Ok(Arc::new(Self {
            local_node,
            members,
            socket: Arc::new(socket),
            incarnation: AtomicU64::new(1),
            timings,
        }))
    }

    /// Spawns the gossip, receive and failure-detection loops.
    pub async fn start(self: Arc<Self>) {
        tracing::info!("Starting membership service on {}", self.local_node.gossip_addr);

        let service = self.clone();
        tokio::spawn(async move { service.gossip_loop().await });

        let service = self.clone();
        tokio::spawn(async move { service.receive_loop().await });

        let service = self.clone();
        tokio::spawn(async move { service.failure_detection_loop().await });
    }

    pub fn get_alive_members(&self) -> Vec<Node> {
        self.members
            .iter()
            .filter(|entry| entry.value().state == NodeState::Alive)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get_member(&self, id: &NodeId) -> Option<Node> {
        self.members.get(id).map(|entry| entry.value().clone())
    }

    async fn gossip_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.timings.gossip_interval);

        loop {
            interval.tick().await;

            let targets: Vec<Node> = self
                .get_alive_members()
                .into_iter()
                .filter(|node| node.id != self.local_node.id)
                .collect();
            if targets.is_empty() {
                continue;
            }

            let target = &targets[rand::thread_rng().gen_range(0..targets.len())];
            let msg = GossipMessage::Ping {
                from: self.local_node.id.clone(),
                incarnation: self.incarnation.load(Ordering::SeqCst),
            };

            if let Err(e) = self.send(&msg, target.gossip_addr).await {
                tracing::warn!("Failed to ping {}: {}", target.id, e);
            }
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; 65536];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => match bincode::deserialize::<GossipMessage>(&buf[..len]) {
                    Ok(msg) => {
                        if let Err(e) = self.handle_message(msg, src).await {
                            tracing::error!("Error handling gossip from {}: {}", src, e);
                        }
                    }
                    Err(e) => tracing::warn!("Undecodable gossip from {}: {}", src, e),
                },
                Err(e) => {
                    tracing::error!("Failed to receive UDP packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    pub(crate) async fn handle_message(&self, msg: GossipMessage, src: SocketAddr) -> Result<()> {
        match msg {
            GossipMessage::Ping { from, incarnation } => {
                self.touch(&from, incarnation);

                let reply = GossipMessage::Ack {
                    from: self.local_node.id.clone(),
                    incarnation: self.incarnation.load(Ordering::SeqCst),
                    members: self.members.iter().map(|e| e.value().clone()).collect(),
                };
                self.send(&reply, src).await?;
            }
            GossipMessage::Ack {
                from,
                incarnation,
                members,
            } => {
                self.touch(&from, incarnation);
                for member in members {
                    self.merge_member(member);
                }
            }
            GossipMessage::Join { mut node } => {
                tracing::info!("Node {} joining cluster at {}", node.id, node.gossip_addr);
                node.last_seen = Some(Instant::now());
                self.members.insert(node.id.clone(), node);
                tracing::info!("Cluster size now: {}", self.members.len());
            }
            GossipMessage::Suspect {
                node_id,
                incarnation,
            } => {
                if node_id == self.local_node.id {
                    self.refute_suspicion().await;
                } else {
                    self.apply_state(&node_id, NodeState::Suspect, incarnation);
                }
            }
            GossipMessage::Alive {
                node_id,
                incarnation,
            } => {
                self.apply_state(&node_id, NodeState::Alive, incarnation);
            }
        }

        Ok(())
    }

    /// Marks a known member as recently heard from.
    fn touch(&self, id: &NodeId, incarnation: u64) {
        if let Some(mut member) = self.members.get_mut(id) {
            member.last_seen = Some(Instant::now());
            if incarnation > member.incarnation {
                member.incarnation = incarnation;
                member.state = NodeState::Alive;
            }
        }
    }

    fn merge_member(&self, incoming: Node) {
        if incoming.id == self.local_node.id {
            return;
        }

        match self.members.get_mut(&incoming.id) {
            Some(mut existing) => {
                let newer = incoming.incarnation > existing.incarnation;
                let refutes = incoming.incarnation == existing.incarnation
                    && incoming.state == NodeState::Alive
                    && existing.state == NodeState::Suspect;

                if newer || refutes {
                    tracing::debug!(
                        "Member {} -> {:?} (inc {} -> {})",
                        incoming.id,
                        incoming.state,
                        existing.incarnation,
                        incoming.incarnation
                    );
                    existing.state = incoming.state;
                    existing.incarnation = incoming.incarnation;
                    existing.last_seen = Some(Instant::now());
                }
            }
            None => {
                tracing::info!("Discovered member {} at {}", incoming.id, incoming.http_addr);
                let mut node = incoming;
                node.last_seen = Some(Instant::now());
                self.members.insert(node.id.clone(), node);
            }
        }
    }

    /// Applies a Suspect/Alive claim about another node if it is not stale.
    fn apply_state(&self, id: &NodeId, state: NodeState, incarnation: u64) {
        let Some(mut existing) = self.members.get_mut(id) else {
            tracing::debug!("{:?} claim for unknown node {}", state, id);
            return;
        };

        let accept = incarnation > existing.incarnation
            || (incarnation == existing.incarnation
                && state == NodeState::Alive
                && existing.state == NodeState::Suspect);

        if accept {
            tracing::info!("Node {} is now {:?} (inc={})", id, state, incarnation);
            existing.state = state;
            existing.incarnation = incarnation;
            existing.last_seen = Some(Instant::now());
        }
    }

    async fn refute_suspicion(&self) {
        let incarnation = self.incarnation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("Refuting suspicion with incarnation {}", incarnation);

        if let Some(mut me) = self.members.get_mut(&self.local_node.id) {
            me.incarnation = incarnation;
            me.state = NodeState::Alive;
        }

        self.broadcast(GossipMessage::Alive {
            node_id: self.local_node.id.clone(),
            incarnation,
        })
        .await;
    }

    async fn failure_detection_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.timings.failure_check_interval);

        loop {
            interval.tick().await;
            let now = Instant::now();
            let mut suspicions = Vec::new();

            for mut entry in self.members.iter_mut() {
                let member = entry.value_mut();
                if member.id == self.local_node.id {
                    continue;
                }

                let Some(last_seen) = member.last_seen else {
                    member.last_seen = Some(now);
                    continue;
                };
                let silent_for = now.duration_since(last_seen);

                match member.state {
                    NodeState::Alive if silent_for > self.timings.suspect_after => {
                        tracing::warn!("Node {} suspected (silent for {:?})", member.id, silent_for);
                        member.state = NodeState::Suspect;
                        suspicions.push(GossipMessage::Suspect {
                            node_id: member.id.clone(),
                            incarnation: member.incarnation,
                        });
                    }
                    NodeState::Suspect if silent_for > self.timings.dead_after => {
                        tracing::warn!("Node {} declared dead (silent for {:?})", member.id, silent_for);
                        member.state = NodeState::Dead;
                    }
                    _ => {}
                }
            }

            for msg in suspicions {
                self.broadcast(msg).await;
            }
        }
    }

    async fn send(&self, msg: &GossipMessage, to: SocketAddr) -> Result<()> {
        let encoded = bincode::serialize(msg)?;
        self.socket.send_to(&encoded, to).await?;
        Ok(())
    }

    async fn broadcast(&self, msg: GossipMessage) {
        for peer in self.get_alive_members() {
            if peer.id == self.local_node.id {
                continue;
            }
            if let Err(e) = self.send(&msg, peer.gossip_addr).await {
                tracing::warn!("Failed to broadcast to {}: {}", peer.id, e);
            }
        }
    }
}

impl ClusterMembership for MembershipService {
    fn local_node(&self) -> &Node {
        &self.local_node
    }

    fn live_members(&self) -> Vec<Node> {
        self.get_alive_members()
    }
}
