//! Scatter-Gather Dispatch Module
//!
//! Turns one operator command into one cluster-wide answer.
//!
//! ## Architecture Overview
//! 1. **Scatter**: `Dispatcher` spawns one task per live member, each running a
//!    single request/response exchange through a `PeerTransport`, bounded by the
//!    configured per-peer timeout.
//! 2. **Gather**: results are collected in arrival order until every peer has
//!    either answered or been marked silent. There is no early return.
//! 3. **Fold**: `aggregator` collapses the raw `ClusterResult` into the shape the
//!    command calls for (union, single-hit resolution, partition concatenation).
//!
//! A silent peer is never counted as a negative answer.
//!
//! ## Submodules
//! - **`types`**: Raw per-peer results and the aggregated outcomes.
//! - **`transport`**: The exchange seam and its HTTP implementation.
//! - **`dispatcher`**: Fan-out/fan-in.
//! - **`aggregator`**: Per-command folding rules.

pub mod aggregator;
pub mod dispatcher;
pub mod transport;
pub mod types;

#[cfg(test)]
mod tests;
