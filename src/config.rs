//! Node configuration.
//!
//! Command-line flags for the `crawl-node` binary and the dispatch settings
//! derived from them.

use crate::workers::types::WorkerIdentity;

use clap::Parser;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CLUSTER_ID: &str = "default";
pub const DEFAULT_PEER_TIMEOUT_MS: u64 = 2000;

#[derive(Parser, Debug, Clone)]
#[command(name = "crawl-node")]
#[command(about = "Crawler cluster node with scatter-gather worker control", long_about = None)]
pub struct NodeConfig {
    /// Gossip address to bind (e.g. 127.0.0.1:5000)
    #[arg(long)]
    pub bind: SocketAddr,

    /// Seed node gossip address; repeat for several seeds
    #[arg(long = "seed")]
    pub seeds: Vec<SocketAddr>,

    /// Logical cluster name; nodes refuse commands for other clusters
    #[arg(long, default_value = DEFAULT_CLUSTER_ID)]
    pub cluster_id: String,

    /// How long to wait for each peer before marking it silent
    #[arg(long, default_value_t = DEFAULT_PEER_TIMEOUT_MS)]
    pub peer_timeout_ms: u64,

    /// HTTP port = gossip port + offset
    #[arg(long, default_value_t = 1000)]
    pub http_port_offset: u16,

    /// Worker to start on this node, as kind/name=P1,P2
    #[arg(long = "worker")]
    pub workers: Vec<WorkerSpec>,
}

impl NodeConfig {
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            cluster_id: self.cluster_id.clone(),
            peer_timeout: Duration::from_millis(self.peer_timeout_ms),
        }
    }
}

/// Settings of one scatter-gather round.
///
/// Silent peers are reported, never retried. Retry policy belongs to the
/// caller.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub cluster_id: String,
    pub peer_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cluster_id: DEFAULT_CLUSTER_ID.to_string(),
            peer_timeout: Duration::from_millis(DEFAULT_PEER_TIMEOUT_MS),
        }
    }
}

/// A worker declared on the command line: `kind/name=P1,P2`.
/// The partition list is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub identity: WorkerIdentity,
    pub partitions: Vec<String>,
}

impl FromStr for WorkerSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (identity, partitions) = match s.split_once('=') {
            Some((identity, partitions)) => (identity, partitions),
            None => (s, ""),
        };

        let (kind, name) = identity
            .split_once('/')
            .ok_or_else(|| format!("expected kind/name, got '{}'", identity))?;
        if kind.is_empty() || name.is_empty() {
            return Err(format!("kind and name must be non-empty in '{}'", identity));
        }

        let partitions = partitions
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            identity: WorkerIdentity::new(kind, name),
            partitions,
        })
    }
}
