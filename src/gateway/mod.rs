//! Operator Gateway Module
//!
//! Minimal admin routes that build the three cluster commands, dispatch them
//! and render the aggregated outcome. The interesting part is the status
//! mapping: "worker unknown" is a not-found, "partition not owned" is a bad
//! request, and a cluster where nobody answered is unavailable.

pub mod handlers;
