use super::types::{Node, NodeId, NodeState};

/// Source of the live peer set a cluster command is fanned out to.
pub trait ClusterMembership: Send + Sync {
    fn local_node(&self) -> &Node;

    /// Every member currently considered alive, the local node included.
    fn live_members(&self) -> Vec<Node>;

    fn local_id(&self) -> &NodeId {
        &self.local_node().id
    }
}

/// Fixed member list. Used for single-node deployments and in tests.
pub struct StaticMembership {
    local: Node,
    peers: Vec<Node>,
}

impl StaticMembership {
    pub fn new(local: Node, peers: Vec<Node>) -> Self {
        Self { local, peers }
    }

    pub fn single(local: Node) -> Self {
        Self::new(local, Vec::new())
    }
}

impl ClusterMembership for StaticMembership {
    fn local_node(&self) -> &Node {
        &self.local
    }

    fn live_members(&self) -> Vec<Node> {
        let mut members = Vec::with_capacity(self.peers.len() + 1);
        members.push(self.local.clone());
        members.extend(
            self.peers
                .iter()
                .filter(|peer| peer.id != self.local.id && peer.state == NodeState::Alive)
                .cloned(),
        );
        members
    }
}
