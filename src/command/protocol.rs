//! Network Protocol Definitions
//!
//! Versioned envelopes exchanged between the dispatching node and its peers.
//! Every field is a string, boolean, optional string or list of strings, so
//! any codec can carry them. The default transport uses JSON over HTTP.

use super::types::{CommandRequest, NodeReply};
use crate::membership::types::NodeId;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u16 = 1;

/// Internal endpoint every node serves cluster commands on.
pub const ENDPOINT_INTERNAL_COMMAND: &str = "/internal/command";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub version: u16,
    pub cluster_id: String,
    pub command: CommandRequest,
}

impl CommandEnvelope {
    pub fn new(cluster_id: impl Into<String>, command: CommandRequest) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            cluster_id: cluster_id.into(),
            command,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub version: u16,
    /// The node that produced the reply.
    pub node_id: NodeId,
    pub reply: NodeReply,
}

/// Body returned with a non-success status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
