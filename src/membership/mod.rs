//! Membership & Discovery Module
//!
//! Tells the dispatcher which nodes are currently alive. Cluster commands are
//! fanned out to exactly that set.
//!
//! ## Core Mechanisms
//! - **Gossip Protocol**: Nodes exchange Ping/Ack messages over UDP and merge member lists.
//! - **Failure Detection**: Silent nodes go Alive -> Suspect -> Dead on timeouts.
//! - **Incarnation Numbers**: A node refutes a false suspicion by bumping its incarnation.
//! - **Static Directory**: A fixed member list for single-node runs and tests.

pub mod directory;
pub mod service;
pub mod types;
