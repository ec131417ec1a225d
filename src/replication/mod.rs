//! Replication Module
//!
//! Keeps the replication nodes' mirrors in step with each peer's partition and
//! rebuilds local state after a restart.
//!
//! ## Architecture Overview
//! 1. **Propagation**: after the owner applies a PUT or DELETE, the mutation is queued
//!    as a `ReplicationJob`. A fixed pool of workers fans it out to every replication
//!    node. The write has already succeeded; propagation is at-most-once and may
//!    silently lose updates for nodes that are down.
//! 2. **Recovery**: on startup the peer pulls its own partition back from a mirror
//!    and, if it is a replication node, repopulates its mirror store.
//!
//! ## Submodules
//! - **`coordinator`**: the worker pool and delivery outcomes.
//! - **`bootstrap`**: the startup recovery procedures.
//! - **`types`**: jobs, outcomes, counters and recovery reports.

pub mod bootstrap;
pub mod coordinator;
pub mod types;
