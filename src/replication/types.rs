use crate::storage::protocol::Operation;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// One successful partition mutation waiting to be mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationJob {
    Put { key: String, value: String },
    Delete { key: String },
}

impl ReplicationJob {
    pub fn key(&self) -> &str {
        match self {
            ReplicationJob::Put { key, .. } | ReplicationJob::Delete { key } => key,
        }
    }

    /// The `R_`-prefixed operation sent to a remote replication node.
    pub fn to_operation(&self) -> Operation {
        match self {
            ReplicationJob::Put { key, value } => Operation::ReplicaPut {
                key: key.clone(),
                value: value.clone(),
            },
            ReplicationJob::Delete { key } => Operation::ReplicaDelete { key: key.clone() },
        }
    }
}

/// What happened to one job at one replication node.
///
/// Nothing is retried and nothing reaches the client that caused the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    /// Remote replication node acknowledged with 200.
    Delivered,
    /// The replication node is this peer; applied to the local mirror.
    AppliedLocally,
    /// Connection refused or timed out.
    Unreachable,
    /// The node answered with something other than 200, or garbage.
    ProtocolError,
}

/// Per-node counters over every delivery attempt.
#[derive(Debug, Default)]
pub struct ReplicationStats {
    enqueued: AtomicU64,
    completed: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    applied_locally: AtomicU64,
    unreachable: AtomicU64,
    protocol_errors: AtomicU64,
}

impl ReplicationStats {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// A job that never reached a worker queue.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self, outcome: DeliveryOutcome) {
        let counter = match outcome {
            DeliveryOutcome::Delivered => &self.delivered,
            DeliveryOutcome::AppliedLocally => &self.applied_locally,
            DeliveryOutcome::Unreachable => &self.unreachable,
            DeliveryOutcome::ProtocolError => &self.protocol_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReplicationStatsSnapshot {
        ReplicationStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            applied_locally: self.applied_locally.load(Ordering::Relaxed),
            unreachable: self.unreachable.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationStatsSnapshot {
    /// Jobs accepted from the write path.
    pub enqueued: u64,
    /// Jobs whose fan-out has finished, whatever the per-node outcomes.
    pub completed: u64,
    /// Jobs discarded because their worker queue was full.
    pub dropped: u64,
    pub delivered: u64,
    pub applied_locally: u64,
    pub unreachable: u64,
    pub protocol_errors: u64,
}

/// How the mirror store was rebuilt at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorRecovery {
    /// This peer is not a replication node; nothing to rebuild.
    NotReplicationNode,
    /// Adopted the full mirror store of another replication node.
    FromReplica(SocketAddr),
    /// Sole replication node: rebuilt from every peer's own partition.
    RebuiltFromPeers { answered: usize },
    /// No other replication node answered; starting with an empty mirror.
    Unavailable,
}

/// Result of the one-shot startup recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Replication node that returned this peer's partition, if any did.
    pub partition_source: Option<SocketAddr>,
    pub partition_entries: usize,
    pub mirror: MirrorRecovery,
    pub mirror_owners: usize,
}
