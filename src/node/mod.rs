//! Peer Node
//!
//! Assembles one peer out of its parts and runs it.
//!
//! ## Lifecycle
//! 1. `DhtNode::new` builds the stores, the transport, the replication
//!    coordinator, the peer service and the client from a `NetworkConfig`.
//! 2. `start` spawns the replication workers.
//! 3. `recover` pulls state back from the other peers (see `replication::bootstrap`).
//! 4. `serve` answers peer requests on `/dht` and client requests on the public routes.
//!
//! `run` performs 2-4 in order and binds the listener only once recovery is done.

pub mod handlers;

use crate::client::peer_client::PeerClient;
use crate::client::transport::PeerTransport;
use crate::network::config::NetworkConfig;
use crate::replication::coordinator::ReplicationCoordinator;
use crate::replication::types::{RecoveryReport, ReplicationStatsSnapshot};
use crate::storage::handlers::{PeerService, handle_peer_request};
use crate::storage::memory::{MirrorStore, PartitionStore};
use crate::storage::partitioner::HashRouter;
use crate::storage::protocol::{
    ENDPOINT_DELETE, ENDPOINT_GET, ENDPOINT_PEER, ENDPOINT_PUT, ENDPOINT_STATS,
};
use handlers::{handle_delete, handle_get, handle_put, handle_stats};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Point-in-time view of a peer, served on `/stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStats {
    pub self_addr: SocketAddr,
    pub partition_entries: usize,
    pub mirror_owners: usize,
    pub mirror_entries: usize,
    pub pending_replication: usize,
    pub replication: ReplicationStatsSnapshot,
}

pub struct DhtNode {
    self_addr: SocketAddr,
    router: Arc<HashRouter>,
    partition: Arc<PartitionStore>,
    mirror: Arc<MirrorStore>,
    replication: Arc<ReplicationCoordinator>,
    service: Arc<PeerService>,
    client: Arc<PeerClient>,
}

impl DhtNode {
    pub fn new(config: NetworkConfig) -> Result<Arc<Self>> {
        let self_addr = config.local_addr()?;
        let transport = Arc::new(
            PeerTransport::new(config.request_timeout)
                .context("Failed to build peer HTTP client")?,
        );

        let router = Arc::new(HashRouter::new(config.network.clone()));
        let partition = Arc::new(PartitionStore::new());
        let mirror = Arc::new(MirrorStore::new());

        let replication = ReplicationCoordinator::new(
            self_addr,
            config.network.clone(),
            config.replication.clone(),
            partition.clone(),
            mirror.clone(),
            transport.clone(),
            config.replication_workers,
            config.replication_queue_capacity,
        );

        let service = Arc::new(PeerService::new(
            self_addr,
            partition.clone(),
            mirror.clone(),
            replication.clone(),
        ));

        let client = Arc::new(PeerClient::new(
            self_addr,
            router.clone(),
            config.replication.clone(),
            partition.clone(),
            mirror.clone(),
            replication.clone(),
            transport,
        ));

        match config.network.index_of(&self_addr) {
            Some(index) => tracing::info!(
                "Peer {} {} in a network of {}, replication node: {}",
                index,
                self_addr,
                config.network.len(),
                config.is_replication_node()
            ),
            None => tracing::info!(
                "Mirror-only replication node {} for a network of {}",
                self_addr,
                config.network.len()
            ),
        }

        Ok(Arc::new(Self {
            self_addr,
            router,
            partition,
            mirror,
            replication,
            service,
            client,
        }))
    }

    /// Spawns the replication workers. Must run inside a tokio runtime.
    pub fn start(&self) {
        self.replication.start();
    }

    pub async fn recover(&self) -> RecoveryReport {
        self.replication.recover().await
    }

    /// HTTP routes of this peer: the peer endpoint plus the client-facing API.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route(ENDPOINT_PEER, post(handle_peer_request))
            .route(ENDPOINT_PUT, post(handle_put))
            .route(&format!("{}/:key", ENDPOINT_GET), get(handle_get))
            .route(&format!("{}/:key", ENDPOINT_DELETE), post(handle_delete))
            .route(ENDPOINT_STATS, get(handle_stats))
            .layer(Extension(self.service.clone()))
            .layer(Extension(self.clone()))
    }

    /// Serves on an already bound listener until the task is dropped.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending::<()>())
            .await
    }

    /// Serves until `shutdown` resolves, then waits for queued replication jobs.
    pub async fn serve_with_shutdown<F>(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Peer server failed")?;

        tracing::info!(
            "Listener closed, flushing {} replication job(s)",
            self.replication.pending()
        );
        self.replication.wait_idle().await;
        Ok(())
    }

    /// Starts the workers, recovers, binds the configured address and serves until Ctrl+C.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        self.start();
        let report = self.recover().await;
        tracing::debug!("Recovery report: {:?}", report);

        let listener = TcpListener::bind(self.self_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.self_addr))?;

        tracing::info!("Peer listening on {}", self.self_addr);
        tracing::info!("Press Ctrl+C to shutdown");

        self.serve_with_shutdown(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        })
        .await
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            self_addr: self.self_addr,
            partition_entries: self.partition.len(),
            mirror_owners: self.mirror.owner_count(),
            mirror_entries: self.mirror.entry_count(),
            pending_replication: self.replication.pending(),
            replication: self.replication.stats(),
        }
    }

    pub fn self_addr(&self) -> SocketAddr {
        self.self_addr
    }

    pub fn hash_router(&self) -> &HashRouter {
        &self.router
    }

    pub fn partition(&self) -> &PartitionStore {
        &self.partition
    }

    pub fn mirror(&self) -> &MirrorStore {
        &self.mirror
    }

    pub fn replication(&self) -> &ReplicationCoordinator {
        &self.replication
    }

    pub fn client(&self) -> &PeerClient {
        &self.client
    }
}
