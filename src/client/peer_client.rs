//! Peer Client
//!
//! The read/write entry point of a peer. Routes each key to its owner, talks to
//! the owner directly (or to the local stores when the owner is this peer), and
//! on reads falls back to the replication nodes when the owner cannot be reached.
//!
//! A reachable owner answering "not found" is authoritative: no fallback happens.

use super::transport::{PeerTransport, TransportError};
use crate::network::types::ReplicationSet;
use crate::replication::coordinator::ReplicationCoordinator;
use crate::storage::memory::{MirrorStore, PartitionStore};
use crate::storage::partitioner::HashRouter;
use crate::storage::protocol::{Operation, Request, ResponseCode};

use std::net::SocketAddr;
use std::sync::Arc;

pub const MAX_KEY_BYTES: usize = 24;
pub const MAX_VALUE_BYTES: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("owner {addr} of the key is unreachable")]
    OwnerUnreachable {
        addr: SocketAddr,
        #[source]
        source: TransportError,
    },
    #[error(transparent)]
    Protocol(TransportError),
    #[error("peer {addr} answered {code:?}: {message}")]
    Rejected {
        addr: SocketAddr,
        code: ResponseCode,
        message: String,
    },
}

/// Result of a write that reached the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// Key already present and the write was not forced. Retry with `force_put`.
    Collision,
}

pub struct PeerClient {
    self_addr: SocketAddr,
    router: Arc<HashRouter>,
    replication_set: Arc<ReplicationSet>,
    partition: Arc<PartitionStore>,
    mirror: Arc<MirrorStore>,
    replication: Arc<ReplicationCoordinator>,
    transport: Arc<PeerTransport>,
}

impl PeerClient {
    pub fn new(
        self_addr: SocketAddr,
        router: Arc<HashRouter>,
        replication_set: Arc<ReplicationSet>,
        partition: Arc<PartitionStore>,
        mirror: Arc<MirrorStore>,
        replication: Arc<ReplicationCoordinator>,
        transport: Arc<PeerTransport>,
    ) -> Self {
        Self {
            self_addr,
            router,
            replication_set,
            partition,
            mirror,
            replication,
            transport,
        }
    }

    pub fn router(&self) -> &HashRouter {
        &self.router
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let key = validate_key(key)?;
        let owner = self.router.owner(key);

        if owner == self.self_addr {
            return Ok(self.partition.get(key));
        }

        let request = Request::new(
            self.self_addr,
            Operation::Get {
                key: key.to_string(),
            },
        );

        match self.transport.send(owner, &request).await {
            Ok(response) => match response.code {
                ResponseCode::Ok => Ok(response.data),
                ResponseCode::NotFound => Ok(None),
                code => Err(ClientError::Rejected {
                    addr: owner,
                    code,
                    message: response.data.unwrap_or_default(),
                }),
            },
            Err(e) if e.is_unreachable() => {
                tracing::warn!("Owner {} unreachable, searching replicas for '{}'", owner, key);
                Ok(self.search_replica(key).await)
            }
            Err(e) => Err(ClientError::Protocol(e)),
        }
    }

    /// Asks each replication node in turn for a mirrored copy of `key`.
    pub async fn search_replica(&self, key: &str) -> Option<String> {
        let request = Request::new(
            self.self_addr,
            Operation::ReplicaGet {
                key: key.to_string(),
            },
        );

        for node in self.replication_set.iter() {
            if node == self.self_addr {
                if let Some(value) = self.mirror.get_mirror(key) {
                    tracing::debug!("Found '{}' in local mirror", key);
                    return Some(value);
                }
                continue;
            }

            match self.transport.send(node, &request).await {
                Ok(response) if response.is_ok() => {
                    if let Some(value) = response.data {
                        tracing::debug!("Found '{}' on replication node {}", key, node);
                        return Some(value);
                    }
                }
                Ok(_) => {
                    tracing::debug!("Replication node {} has no copy of '{}'", node, key);
                }
                Err(e) => {
                    tracing::debug!("Replica search skipped {}: {}", node, e);
                }
            }
        }

        None
    }

    /// Stores a new pair. An existing key is left alone and reported as a `Collision`.
    pub async fn put(&self, key: &str, value: &str) -> Result<PutOutcome, ClientError> {
        self.put_with(key, value, false).await
    }

    /// Stores a pair, replacing any existing value.
    pub async fn force_put(&self, key: &str, value: &str) -> Result<PutOutcome, ClientError> {
        self.put_with(key, value, true).await
    }

    async fn put_with(&self, key: &str, value: &str, force: bool) -> Result<PutOutcome, ClientError> {
        let key = validate_key(key)?;
        let value = validate_value(value)?;
        let owner = self.router.owner(key);

        if owner == self.self_addr {
            if !self.partition.put(key.to_string(), value.to_string(), force) {
                return Ok(PutOutcome::Collision);
            }
            self.replication
                .propagate_put(key.to_string(), value.to_string());
            return Ok(PutOutcome::Stored);
        }

        let (key, value) = (key.to_string(), value.to_string());
        let op = if force {
            Operation::PutForce { key, value }
        } else {
            Operation::Put { key, value }
        };

        let response = self
            .transport
            .send(owner, &Request::new(self.self_addr, op))
            .await
            .map_err(|e| owner_error(owner, e))?;

        match response.code {
            ResponseCode::Ok => Ok(PutOutcome::Stored),
            ResponseCode::Conflict => Ok(PutOutcome::Collision),
            code => Err(ClientError::Rejected {
                addr: owner,
                code,
                message: response.data.unwrap_or_default(),
            }),
        }
    }

    /// Removes `key` from its owner's partition. Deleting an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<(), ClientError> {
        let key = validate_key(key)?;
        let owner = self.router.owner(key);

        if owner == self.self_addr {
            self.partition.remove(key);
            self.replication.propagate_delete(key.to_string());
            return Ok(());
        }

        let request = Request::new(
            self.self_addr,
            Operation::Delete {
                key: key.to_string(),
            },
        );
        let response = self
            .transport
            .send(owner, &request)
            .await
            .map_err(|e| owner_error(owner, e))?;

        match response.code {
            ResponseCode::Ok => Ok(()),
            code => Err(ClientError::Rejected {
                addr: owner,
                code,
                message: response.data.unwrap_or_default(),
            }),
        }
    }
}

fn owner_error(owner: SocketAddr, error: TransportError) -> ClientError {
    if error.is_unreachable() {
        ClientError::OwnerUnreachable {
            addr: owner,
            source: error,
        }
    } else {
        ClientError::Protocol(error)
    }
}

/// Trims and checks a key: non-empty and at most `MAX_KEY_BYTES`.
pub fn validate_key(key: &str) -> Result<&str, ClientError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ClientError::InvalidKey("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(ClientError::InvalidKey(format!(
            "key is {} bytes, limit is {}",
            key.len(),
            MAX_KEY_BYTES
        )));
    }
    Ok(key)
}

/// Trims and checks a value: non-empty and at most `MAX_VALUE_BYTES`.
pub fn validate_value(value: &str) -> Result<&str, ClientError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ClientError::InvalidValue("value is empty".to_string()));
    }
    if value.len() > MAX_VALUE_BYTES {
        return Err(ClientError::InvalidValue(format!(
            "value is {} bytes, limit is {}",
            value.len(),
            MAX_VALUE_BYTES
        )));
    }
    Ok(value)
}
