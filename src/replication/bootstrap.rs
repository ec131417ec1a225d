//! Bootstrap Recovery
//!
//! Runs once at startup, before the peer serves anyone:
//! 1. **Own partition**: ask the other replication nodes, in order, for the mirror
//!    they hold of this peer (`GET_HASHTABLE`) and merge the first 200 answer.
//! 2. **Mirrors** (replication nodes only):
//!    - with other replication nodes around, adopt the first full mirror store
//!      returned by `GET_REPLICA`;
//!    - as the sole replication node, rebuild from every peer's own partition
//!      (`GET_R_HASHTABLE`).
//!
//! Peers that do not answer are skipped once. If nobody answers the peer starts
//! empty; that data loss is accepted.

use super::coordinator::ReplicationCoordinator;
use super::types::{MirrorRecovery, RecoveryReport};
use crate::storage::memory::MirrorTable;
use crate::storage::protocol::{Operation, Request, ResponseCode, TablePayload};

use std::net::SocketAddr;

impl ReplicationCoordinator {
    pub async fn recover(&self) -> RecoveryReport {
        let context = &self.context;
        tracing::info!("Starting bootstrap recovery for {}", context.self_addr);

        let (partition_source, partition_entries) = self.recover_partition().await;

        let mirror = if !context.replication.contains(&context.self_addr) {
            MirrorRecovery::NotReplicationNode
        } else if context.replication.len() > 1 {
            self.recover_mirror_from_replica().await
        } else {
            self.rebuild_mirror_from_peers().await
        };

        let report = RecoveryReport {
            partition_source,
            partition_entries,
            mirror,
            mirror_owners: context.mirror.owner_count(),
        };

        tracing::info!(
            "Recovery finished: {} partition entries from {:?}, mirror {:?} ({} owners)",
            report.partition_entries,
            report.partition_source,
            report.mirror,
            report.mirror_owners
        );

        report
    }

    async fn recover_partition(&self) -> (Option<SocketAddr>, usize) {
        let context = &self.context;
        let request = Request::new(context.self_addr, Operation::GetMirrorOf);

        for target in context.replication.others(context.self_addr) {
            match context.transport.send(target, &request).await {
                Ok(response) => match (response.code, response.table) {
                    (ResponseCode::Ok, Some(TablePayload::Partition(table))) => {
                        let restored = context.partition.merge(table);
                        tracing::info!("Restored {} entries of own partition from {}", restored, target);
                        return (Some(target), restored);
                    }
                    (ResponseCode::NotFound, _) => {
                        tracing::debug!("{} holds no mirror of {}", target, context.self_addr);
                    }
                    (code, _) => {
                        tracing::warn!("Unexpected {:?} to GET_HASHTABLE from {}", code, target);
                    }
                },
                Err(e) => {
                    tracing::warn!("Partition recovery skipped {}: {}", target, e);
                }
            }
        }

        tracing::info!("No replication node returned a partition, starting empty");
        (None, 0)
    }

    async fn recover_mirror_from_replica(&self) -> MirrorRecovery {
        let context = &self.context;
        let request = Request::new(context.self_addr, Operation::GetReplica);

        for target in context.replication.others(context.self_addr) {
            match context.transport.send(target, &request).await {
                Ok(response) => match (response.code, response.table) {
                    (ResponseCode::Ok, Some(TablePayload::Mirror(table))) => {
                        tracing::info!(
                            "Adopting mirror store of {} ({} owners)",
                            target,
                            table.len()
                        );
                        context.mirror.replace(table);
                        return MirrorRecovery::FromReplica(target);
                    }
                    (code, _) => {
                        tracing::warn!("Unexpected {:?} to GET_REPLICA from {}", code, target);
                    }
                },
                Err(e) => {
                    tracing::warn!("Mirror recovery skipped {}: {}", target, e);
                }
            }
        }

        MirrorRecovery::Unavailable
    }

    async fn rebuild_mirror_from_peers(&self) -> MirrorRecovery {
        let context = &self.context;
        let request = Request::new(context.self_addr, Operation::GetPartition);
        let mut rebuilt = MirrorTable::new();
        let mut answered = 0;

        for (index, peer) in context.network.iter() {
            if peer == context.self_addr {
                let own = context.partition.snapshot();
                if !own.is_empty() {
                    rebuilt.insert(peer, own);
                }
                continue;
            }

            match context.transport.send(peer, &request).await {
                Ok(response) => match (response.code, response.table) {
                    (ResponseCode::Ok, Some(TablePayload::Partition(table))) => {
                        answered += 1;
                        tracing::debug!("Peer {} {} sent {} entries", index, peer, table.len());
                        if !table.is_empty() {
                            rebuilt.insert(peer, table);
                        }
                    }
                    (code, _) => {
                        tracing::warn!("Unexpected {:?} to GET_R_HASHTABLE from {}", code, peer);
                    }
                },
                Err(e) => {
                    tracing::warn!("Mirror rebuild skipped peer {}: {}", index, e);
                }
            }
        }

        tracing::info!(
            "Rebuilt mirror store from {} peer(s), {} owners",
            answered,
            rebuilt.len()
        );
        context.mirror.replace(rebuilt);

        MirrorRecovery::RebuiltFromPeers { answered }
    }
}
