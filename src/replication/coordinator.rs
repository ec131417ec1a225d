//! Propagation Worker Pool
//!
//! Mirrors every successful partition mutation onto the replication nodes.
//!
//! ## Responsibilities
//! - **Fan-out**: each job is sent to every replication node in turn: over the wire
//!   as `R_PUT`/`R_DELETE`, or straight into the local mirror when the node is this peer.
//! - **Ordering**: jobs are sharded to workers by key hash, so writes to one key
//!   reach a given replication node in the order they were made.
//! - **Best effort**: enqueueing never blocks the write path. Failures are counted
//!   and logged per target, never retried, never reported to the writer.
//! - **Bounded**: each worker queue holds at most `queue_capacity` jobs. A job
//!   arriving at a full queue is dropped and counted, like any other lost update.

use super::types::*;
use crate::client::transport::{PeerTransport, TransportError};
use crate::network::types::{NetworkMap, ReplicationSet};
use crate::storage::memory::{MirrorStore, PartitionStore};
use crate::storage::partitioner::HashRouter;
use crate::storage::protocol::Request;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc};

/// Everything the workers and the recovery pass share.
pub(super) struct ReplicationContext {
    pub(super) self_addr: SocketAddr,
    pub(super) network: Arc<NetworkMap>,
    pub(super) replication: Arc<ReplicationSet>,
    pub(super) partition: Arc<PartitionStore>,
    pub(super) mirror: Arc<MirrorStore>,
    pub(super) transport: Arc<PeerTransport>,
    stats: ReplicationStats,
    pending: AtomicUsize,
    idle: Notify,
}

impl ReplicationContext {
    /// Delivers one job to every replication node, in configured order.
    async fn deliver(&self, job: &ReplicationJob) -> Vec<(SocketAddr, DeliveryOutcome)> {
        let mut outcomes = Vec::with_capacity(self.replication.len());

        for target in self.replication.iter() {
            let outcome = if target == self.self_addr {
                self.apply_locally(job);
                DeliveryOutcome::AppliedLocally
            } else {
                self.deliver_remote(target, job).await
            };

            self.stats.record(outcome);
            outcomes.push((target, outcome));
        }

        outcomes
    }

    fn apply_locally(&self, job: &ReplicationJob) {
        match job {
            ReplicationJob::Put { key, value } => {
                self.mirror
                    .put_mirror(self.self_addr, key.clone(), value.clone());
            }
            ReplicationJob::Delete { key } => {
                self.mirror.remove_mirror(&self.self_addr, key);
            }
        }
    }

    async fn deliver_remote(&self, target: SocketAddr, job: &ReplicationJob) -> DeliveryOutcome {
        let request = Request::new(self.self_addr, job.to_operation());

        match self.transport.send(target, &request).await {
            Ok(response) if response.is_ok() => {
                tracing::debug!(
                    "Replicated {} '{}' to {}",
                    request.op.tag(),
                    job.key(),
                    target
                );
                DeliveryOutcome::Delivered
            }
            Ok(response) => {
                tracing::warn!(
                    "Replication node {} rejected {} '{}': {:?}",
                    target,
                    request.op.tag(),
                    job.key(),
                    response.code
                );
                DeliveryOutcome::ProtocolError
            }
            Err(e @ TransportError::Unreachable { .. }) => {
                tracing::warn!("Replication of '{}' skipped: {}", job.key(), e);
                DeliveryOutcome::Unreachable
            }
            Err(e) => {
                tracing::warn!("Replication of '{}' failed: {}", job.key(), e);
                DeliveryOutcome::ProtocolError
            }
        }
    }

    fn finish_job(&self) {
        self.stats.record_completed();
        self.release_job();
    }

    fn release_job(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Fire-and-forget replication plus the startup recovery pass (see `bootstrap`).
pub struct ReplicationCoordinator {
    pub(super) context: Arc<ReplicationContext>,
    workers: Vec<mpsc::Sender<ReplicationJob>>,
    /// Handed to the worker tasks by `start`.
    receivers: Mutex<Vec<mpsc::Receiver<ReplicationJob>>>,
}

impl ReplicationCoordinator {
    pub fn new(
        self_addr: SocketAddr,
        network: Arc<NetworkMap>,
        replication: Arc<ReplicationSet>,
        partition: Arc<PartitionStore>,
        mirror: Arc<MirrorStore>,
        transport: Arc<PeerTransport>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Arc<Self> {
        let worker_count = worker_count.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (workers, receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::channel::<ReplicationJob>(queue_capacity))
            .unzip();

        Arc::new(Self {
            context: Arc::new(ReplicationContext {
                self_addr,
                network,
                replication,
                partition,
                mirror,
                transport,
                stats: ReplicationStats::default(),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
            workers,
            receivers: Mutex::new(receivers),
        })
    }

    /// Spawns the workers. Jobs enqueued earlier are kept and drained once they run.
    /// Calling it twice is a no-op.
    pub fn start(&self) {
        let receivers = match self.receivers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => {
                tracing::error!("Replication worker queue lock poisoned");
                return;
            }
        };

        if receivers.is_empty() {
            tracing::debug!("Replication workers already running");
            return;
        }

        let worker_count = receivers.len();
        for (worker_id, jobs) in receivers.into_iter().enumerate() {
            let context = self.context.clone();
            tokio::spawn(async move {
                worker_loop(context, worker_id, jobs).await;
            });
        }

        tracing::info!(
            "Replication started with {} workers for {} replication node(s)",
            worker_count,
            self.context.replication.len()
        );
    }

    pub fn propagate_put(&self, key: String, value: String) {
        self.enqueue(ReplicationJob::Put { key, value });
    }

    pub fn propagate_delete(&self, key: String) {
        self.enqueue(ReplicationJob::Delete { key });
    }

    fn enqueue(&self, job: ReplicationJob) {
        if self.context.replication.is_empty() {
            return;
        }

        let shard = HashRouter::string_hash(job.key()).unsigned_abs() as usize % self.workers.len();

        self.context.pending.fetch_add(1, Ordering::SeqCst);
        self.context.stats.record_enqueued();

        match self.workers[shard].try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                tracing::warn!("Replication queue {} is full, dropping job for '{}'", shard, job.key());
                self.context.stats.record_dropped();
                self.context.release_job();
            }
            Err(TrySendError::Closed(job)) => {
                tracing::error!("Replication worker {} is gone, dropping job for '{}'", shard, job.key());
                self.context.stats.record_dropped();
                self.context.release_job();
            }
        }
    }

    /// Runs one job's fan-out on the caller's task and reports every target's outcome.
    pub async fn deliver_now(&self, job: &ReplicationJob) -> Vec<(SocketAddr, DeliveryOutcome)> {
        self.context.deliver(job).await
    }

    /// Resolves once every job enqueued so far has been fanned out.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.context.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.context.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn pending(&self) -> usize {
        self.context.pending.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ReplicationStatsSnapshot {
        self.context.stats.snapshot()
    }

    pub fn self_addr(&self) -> SocketAddr {
        self.context.self_addr
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

async fn worker_loop(
    context: Arc<ReplicationContext>,
    worker_id: usize,
    mut jobs: mpsc::Receiver<ReplicationJob>,
) {
    tracing::debug!("Replication worker {} started", worker_id);

    while let Some(job) = jobs.recv().await {
        let outcomes = context.deliver(&job).await;
        tracing::trace!("Worker {} finished '{}': {:?}", worker_id, job.key(), outcomes);
        context.finish_job();
    }

    tracing::debug!("Replication worker {} stopped", worker_id);
}
