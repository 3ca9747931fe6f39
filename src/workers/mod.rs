//! Local Worker Registry Module
//!
//! Keeps track of the indexing/crawling workers currently running inside this
//! node process. Cluster commands never touch another node's registry: they
//! reach it through the command protocol and the `NodeExecutor` running there.
//!
//! ## Submodules
//! - **`types`**: Worker identity and the capability surface a running worker exposes.
//! - **`registry`**: The per-node table of running workers.

pub mod registry;
pub mod types;
