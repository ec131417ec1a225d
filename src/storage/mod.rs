//! Partitioned Storage Module
//!
//! Implements the local side of the hash table.
//!
//! ## Core Concepts
//! - **Routing**: `HashRouter` picks exactly one owner per key from the static network map.
//! - **Partition**: `PartitionStore` holds the pairs this peer owns.
//! - **Mirrors**: `MirrorStore` holds copies of other peers' partitions, per owner.
//! - **Dispatch**: `PeerService` decodes peer requests and applies them to the stores.

pub mod handlers;
pub mod memory;
pub mod partitioner;
pub mod protocol;

#[cfg(test)]
mod tests;
