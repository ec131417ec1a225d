//! Static Network Topology
//!
//! Describes who takes part in the hash table and who keeps mirrors.
//!
//! ## Core Concepts
//! - **NetworkMap**: ordered peer list; a key's owner is chosen by its 1-based index.
//! - **ReplicationSet**: peers that shadow the partitions of others.
//! - **Configuration**: both are read once from a properties file and never change
//!   while the process runs. There is no discovery and no failure detection; an
//!   unreachable peer is only noticed when a connection to it is refused.

pub mod config;
pub mod types;
