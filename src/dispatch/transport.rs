use crate::command::handlers::CommandEndpoint;
use crate::command::protocol::{
    CommandEnvelope, ENDPOINT_INTERNAL_COMMAND, ErrorResponse, ReplyEnvelope,
};
use crate::error::PeerFailure;
use crate::membership::types::Node;

use std::future::Future;
use std::sync::Arc;

/// One request/response exchange with one peer.
///
/// Implementations must not retry; the dispatcher bounds the call in time.
pub trait PeerTransport: Send + Sync + 'static {
    fn exchange(
        &self,
        peer: &Node,
        envelope: &CommandEnvelope,
    ) -> impl Future<Output = Result<ReplyEnvelope, PeerFailure>> + Send;
}

/// JSON over HTTP, the way nodes talk to each other elsewhere in the cluster.
///
/// Commands addressed to the local node skip the network and go straight to
/// the local `CommandEndpoint`.
pub struct HttpTransport {
    client: reqwest::Client,
    local: Arc<CommandEndpoint>,
}

impl HttpTransport {
    pub fn new(local: Arc<CommandEndpoint>) -> Self {
        Self {
            client: reqwest::Client::new(),
            local,
        }
    }
}

impl PeerTransport for HttpTransport {
    async fn exchange(
        &self,
        peer: &Node,
        envelope: &CommandEnvelope,
    ) -> Result<ReplyEnvelope, PeerFailure> {
        if peer.id == self.local.node_id {
            return self.local.answer(envelope);
        }

        let url = format!("http://{}{}", peer.http_addr, ENDPOINT_INTERNAL_COMMAND);
        let response = self
            .client
            .post(&url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| PeerFailure::Unreachable(format!("{}: {}", peer.http_addr, e)))?;

        let status = response.status();
        if !status.is_success() {
            let reason = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            return Err(PeerFailure::Rejected(reason));
        }

        response
            .json::<ReplyEnvelope>()
            .await
            .map_err(|e| PeerFailure::Protocol(format!("undecodable reply: {}", e)))
    }
}
