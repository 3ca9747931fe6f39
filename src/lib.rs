//! Crawler Cluster Control Plane
//!
//! Library crate behind the `crawl-node` binary. An operator command is fanned
//! out to every live node, each node answers from its own worker registry, and
//! the answers are folded into one cluster-wide result.
//!
//! ## Architecture Modules
//! - **`workers`**: Worker identity, the worker capability trait and the per-node
//!   `LocalInstanceRegistry`.
//! - **`command`**: The three commands (list, stop/restart, full re-index), their
//!   node-local execution and the internal wire envelopes.
//! - **`dispatch`**: Scatter-gather over the live member set and the per-command
//!   aggregation rules.
//! - **`membership`**: Who is alive. UDP gossip (SWIM-like) or a static list.
//! - **`gateway`**: Thin admin HTTP routes with outcome-to-status mapping.
//! - **`config`** / **`error`**: CLI configuration and the error taxonomy.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod membership;
pub mod workers;

#[cfg(test)]
mod test_support;
