//! Node-local command execution.
//!
//! Runs exactly one command against this node's registry. Worker callbacks
//! that fail surface as `ExecutionError`; the caller turns that into "this node
//! did not answer" rather than a negative answer.

use super::types::{CommandRequest, LifecycleOp, NodeReply};
use crate::error::ExecutionError;
use crate::workers::registry::{LocalInstanceRegistry, WorkerRef};

use std::sync::Arc;

pub struct NodeExecutor {
    registry: Arc<LocalInstanceRegistry>,
}

impl NodeExecutor {
    pub fn new(registry: Arc<LocalInstanceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<LocalInstanceRegistry> {
        &self.registry
    }

    pub fn execute(&self, command: &CommandRequest) -> Result<NodeReply, ExecutionError> {
        match command {
            CommandRequest::ListWorkers => Ok(self.list_workers()),
            CommandRequest::Lifecycle { op, target } => Ok(self.lifecycle(*op, target)),
            CommandRequest::FullUpdate {
                target,
                partition_key,
            } => {
                // An empty key addresses every partition, same as no key.
                let key = partition_key.as_deref().filter(|key| !key.is_empty());
                self.full_update(target, key)
            }
        }
    }

    fn list_workers(&self) -> NodeReply {
        let names = self
            .registry
            .list_all()
            .into_iter()
            .map(|identity| identity.name)
            .collect();

        NodeReply::Workers { names }
    }

    fn lifecycle(&self, op: LifecycleOp, target: &str) -> NodeReply {
        let Some(worker) = self.registry.find_by_name(target) else {
            tracing::debug!("{} '{}': not running here", op, target);
            return NodeReply::Lifecycle {
                target_found: false,
            };
        };

        let identity = worker.identity();
        match op {
            LifecycleOp::Stop => {
                tracing::info!("Stopping worker {}", identity);
                worker.request_stop();
                // Shutdown is in flight; a new instance may start right away,
                // so only the entry for this handle is dropped.
                self.registry.unregister_handle(&identity, &worker);
            }
            LifecycleOp::Restart => {
                tracing::info!("Restarting worker {}", identity);
                worker.request_restart();
            }
        }

        NodeReply::Lifecycle { target_found: true }
    }

    fn full_update(
        &self,
        target: &str,
        partition_key: Option<&str>,
    ) -> Result<NodeReply, ExecutionError> {
        let Some(worker) = self.registry.find_by_name(target) else {
            return Ok(NodeReply::FullUpdate {
                target_found: false,
                partition_found: false,
                scheduled_partitions: Vec::new(),
            });
        };

        match partition_key {
            Some(key) => {
                let owned = worker
                    .owns_partition(key)
                    .map_err(|source| worker_failure(&worker, source))?;

                if !owned {
                    tracing::info!("Worker {} does not own partition '{}'", worker.identity(), key);
                    return Ok(NodeReply::FullUpdate {
                        target_found: true,
                        partition_found: false,
                        scheduled_partitions: Vec::new(),
                    });
                }

                let scheduled = schedule(&worker, Some(key))?;
                Ok(NodeReply::FullUpdate {
                    target_found: true,
                    partition_found: true,
                    scheduled_partitions: scheduled,
                })
            }
            None => {
                let scheduled = schedule(&worker, None)?;
                Ok(NodeReply::FullUpdate {
                    target_found: true,
                    partition_found: true,
                    scheduled_partitions: scheduled,
                })
            }
        }
    }
}

fn schedule(worker: &WorkerRef, partition: Option<&str>) -> Result<Vec<String>, ExecutionError> {
    let scheduled = worker
        .schedule_full_reindex(partition)
        .map_err(|source| worker_failure(worker, source))?;

    tracing::info!(
        "Scheduled full re-index for {}: {:?}",
        worker.identity(),
        scheduled
    );
    Ok(scheduled)
}

fn worker_failure(worker: &WorkerRef, source: anyhow::Error) -> ExecutionError {
    let identity = worker.identity();
    tracing::error!("Worker {} failed during full update: {}", identity, source);
    ExecutionError::Worker {
        name: identity.name,
        source,
    }
}
