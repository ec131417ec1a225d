//! Peer-to-Peer Hash Table Library
//!
//! This library crate defines the modules a single peer of the hash table is
//! built from. It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The key space is split over a static list of peers; a designated subset of
//! them also keeps mirrors of everyone else's data.
//!
//! - **`network`**: The static cluster description. Parses the `NODES` /
//!   `REPLICATION_NODES` configuration into a `NetworkMap` and a `ReplicationSet`.
//! - **`storage`**: The local state layer. Key routing (`HashRouter`), the owned
//!   partition and the mirrors, the peer wire protocol and its dispatcher.
//! - **`replication`**: Asynchronous propagation of partition mutations to the
//!   replication nodes, and startup recovery from them.
//! - **`client`**: Outbound requests. Routed reads and writes with a fallback to
//!   the mirrors when an owner is down.
//! - **`node`**: Wiring of all of the above into one runnable peer with its HTTP routes.

pub mod client;
pub mod network;
pub mod node;
pub mod replication;
pub mod storage;
