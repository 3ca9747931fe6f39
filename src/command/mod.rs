//! Cluster Command Module
//!
//! The three operator commands (list workers, stop/restart a worker, force a
//! full re-index) and their node-local execution.
//!
//! ## Flow on a single node
//! 1. A `CommandEnvelope` arrives on `/internal/command` (or is handed over
//!    in-process when the node is talking to itself).
//! 2. `CommandEndpoint` checks version and cluster id.
//! 3. `NodeExecutor` runs the command against the `LocalInstanceRegistry`
//!    and produces a `NodeReply`. It never contacts other nodes.
//!
//! ## Submodules
//! - **`types`**: Command variants and per-command reply shapes.
//! - **`executor`**: Node-local execution semantics.
//! - **`protocol`**: Versioned wire envelopes and endpoint constants.
//! - **`handlers`**: The internal HTTP endpoint.

pub mod executor;
pub mod handlers;
pub mod protocol;
pub mod types;
