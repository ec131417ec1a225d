//! Outbound Client Module
//!
//! - **`transport`**: one HTTP request/response exchange with a peer, with
//!   connection failures kept apart from protocol failures.
//! - **`peer_client`**: routed get/put/delete with replica fallback on reads.

pub mod peer_client;
pub mod transport;
