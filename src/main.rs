use axum::{Extension, Router, routing::post};
use clap::Parser;
use crawl_control::command::executor::NodeExecutor;
use crawl_control::command::handlers::{CommandEndpoint, handle_internal_command};
use crawl_control::command::protocol::ENDPOINT_INTERNAL_COMMAND;
use crawl_control::config::{NodeConfig, WorkerSpec};
use crawl_control::dispatch::dispatcher::Dispatcher;
use crawl_control::dispatch::transport::HttpTransport;
use crawl_control::gateway::handlers::admin_routes;
use crawl_control::membership::directory::ClusterMembership;
use crawl_control::membership::service::{GossipTimings, MembershipService};
use crawl_control::workers::registry::LocalInstanceRegistry;
use crawl_control::workers::types::{WorkerHandle, WorkerIdentity};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = NodeConfig::parse();

    tracing::info!("Starting node on {} (cluster '{}')", config.bind, config.cluster_id);
    if config.seeds.is_empty() {
        tracing::info!("Starting as seed node (founder)");
    } else {
        tracing::info!("Seed nodes: {:?}", config.seeds);
    }

    // 1. Membership (UDP gossip):
    let membership = MembershipService::new(
        config.bind,
        config.seeds.clone(),
        config.http_port_offset,
        GossipTimings::default(),
    )
    .await?;
    tracing::info!("Node ID: {}", membership.local_node.id);

    // 2. Local worker registry:
    let registry = LocalInstanceRegistry::new();
    for spec in &config.workers {
        registry.register(Arc::new(LoggingWorker::from_spec(spec)))?;
    }

    // 3. Command endpoint + dispatcher:
    let endpoint = Arc::new(CommandEndpoint::new(
        membership.local_node.id.clone(),
        config.cluster_id.clone(),
        NodeExecutor::new(registry.clone()),
    ));
    let dispatcher = Dispatcher::new(
        membership.clone(),
        Arc::new(HttpTransport::new(endpoint.clone())),
        config.dispatch_config(),
    );

    // 4. HTTP router:
    let app = Router::new()
        .route(ENDPOINT_INTERNAL_COMMAND, post(handle_internal_command))
        .layer(Extension(endpoint))
        .merge(admin_routes(dispatcher));

    // 5. Spawn membership service:
    membership.clone().start().await;

    // 6. Spawn stats reporter:
    let stats_membership = membership.clone();
    let stats_registry = registry.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            let alive = stats_membership.live_members();
            tracing::info!(
                "Cluster stats: {} alive node(s), {} local worker(s)",
                alive.len(),
                stats_registry.len()
            );
            for node in alive {
                tracing::debug!("  - {} gossip={} http={}", node.id, node.gossip_addr, node.http_addr);
            }
        }
    });

    // 7. Start HTTP server:
    let http_addr = membership.local_node.http_addr;
    tracing::info!("HTTP server listening on {}", http_addr);

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Stand-in worker for nodes started from the command line. It only logs
/// what it is asked to do.
struct LoggingWorker {
    identity: WorkerIdentity,
    partitions: Vec<String>,
}

impl LoggingWorker {
    fn from_spec(spec: &WorkerSpec) -> Self {
        Self {
            identity: spec.identity.clone(),
            partitions: spec.partitions.clone(),
        }
    }
}

impl WorkerHandle for LoggingWorker {
    fn identity(&self) -> WorkerIdentity {
        self.identity.clone()
    }

    fn request_stop(&self) {
        tracing::info!("[{}] stop requested", self.identity);
    }

    fn request_restart(&self) {
        tracing::info!("[{}] restart requested", self.identity);
    }

    fn owns_partition(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.partitions.iter().any(|p| p == key))
    }

    fn schedule_full_reindex(&self, partition: Option<&str>) -> anyhow::Result<Vec<String>> {
        let scheduled = match partition {
            Some(key) => vec![key.to_string()],
            None => self.partitions.clone(),
        };
        tracing::info!("[{}] full re-index queued for {:?}", self.identity, scheduled);
        Ok(scheduled)
    }
}
