use super::executor::NodeExecutor;
use super::protocol::{CommandEnvelope, ErrorResponse, PROTOCOL_VERSION, ReplyEnvelope};
use crate::error::PeerFailure;
use crate::membership::types::NodeId;

use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

/// This node's side of the command protocol.
///
/// Shared by the HTTP handler and by the in-process shortcut the transport
/// takes when a node addresses itself, so both paths reject and answer alike.
pub struct CommandEndpoint {
    pub node_id: NodeId,
    pub cluster_id: String,
    pub executor: NodeExecutor,
}

impl CommandEndpoint {
    pub fn new(node_id: NodeId, cluster_id: impl Into<String>, executor: NodeExecutor) -> Self {
        Self {
            node_id,
            cluster_id: cluster_id.into(),
            executor,
        }
    }

    pub fn answer(&self, envelope: &CommandEnvelope) -> Result<ReplyEnvelope, PeerFailure> {
        if envelope.version != PROTOCOL_VERSION {
            return Err(PeerFailure::Protocol(format!(
                "unsupported protocol version {} (expected {})",
                envelope.version, PROTOCOL_VERSION
            )));
        }
        if envelope.cluster_id != self.cluster_id {
            return Err(PeerFailure::Protocol(format!(
                "command for cluster '{}' received by cluster '{}'",
                envelope.cluster_id, self.cluster_id
            )));
        }

        tracing::debug!("Executing {} on node {}", envelope.command, self.node_id);

        let reply = self
            .executor
            .execute(&envelope.command)
            .map_err(|e| PeerFailure::Rejected(e.to_string()))?;

        Ok(ReplyEnvelope {
            version: PROTOCOL_VERSION,
            node_id: self.node_id.clone(),
            reply,
        })
    }
}

pub async fn handle_internal_command(
    Extension(endpoint): Extension<Arc<CommandEndpoint>>,
    Json(envelope): Json<CommandEnvelope>,
) -> Result<Json<ReplyEnvelope>, (StatusCode, Json<ErrorResponse>)> {
    match endpoint.answer(&envelope) {
        Ok(reply) => Ok(Json(reply)),
        Err(failure) => {
            tracing::warn!("Refused {}: {}", envelope.command, failure);
            let status = match failure {
                PeerFailure::Protocol(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: failure.to_string(),
                }),
            ))
        }
    }
}
