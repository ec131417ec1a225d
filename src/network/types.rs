use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

/// 1-based position of a peer in the `NetworkMap`.
///
/// This is what the router hands out: index `1` is the first entry of the
/// configured `NODES` list, index `N` the last.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerIndex(pub usize);

impl fmt::Display for PeerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The static set of peers sharing the key space.
///
/// Loaded once at startup and never mutated afterwards. Every peer must hold
/// an identical map, otherwise routing stops being consistent across the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMap {
    peers: Vec<SocketAddr>,
}

impl NetworkMap {
    pub fn new(peers: Vec<SocketAddr>) -> Result<Self> {
        if peers.is_empty() {
            return Err(anyhow::anyhow!("Network map needs at least one peer"));
        }

        let mut seen = HashSet::new();
        for peer in &peers {
            if !seen.insert(*peer) {
                return Err(anyhow::anyhow!("Duplicate peer address in network map: {}", peer));
            }
        }

        Ok(Self { peers })
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Always false for a constructed map; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn address(&self, index: PeerIndex) -> Option<SocketAddr> {
        index
            .0
            .checked_sub(1)
            .and_then(|slot| self.peers.get(slot))
            .copied()
    }

    pub fn index_of(&self, addr: &SocketAddr) -> Option<PeerIndex> {
        self.peers
            .iter()
            .position(|peer| peer == addr)
            .map(|slot| PeerIndex(slot + 1))
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.peers.contains(addr)
    }

    pub fn addresses(&self) -> &[SocketAddr] {
        &self.peers
    }

    pub fn iter(&self) -> impl Iterator<Item = (PeerIndex, SocketAddr)> + '_ {
        self.peers
            .iter()
            .enumerate()
            .map(|(slot, addr)| (PeerIndex(slot + 1), *addr))
    }
}

/// Peers designated to hold mirrors of other peers' partitions.
///
/// Keeps the configured order (duplicates dropped) so that "first replication
/// node that answers" is deterministic. May be empty, and may list addresses
/// that are not part of the `NetworkMap` (mirror-only nodes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationSet {
    nodes: Vec<SocketAddr>,
}

impl ReplicationSet {
    pub fn new(nodes: Vec<SocketAddr>) -> Self {
        let mut seen = HashSet::new();
        let nodes = nodes.into_iter().filter(|addr| seen.insert(*addr)).collect();
        Self { nodes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.nodes.contains(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.nodes.iter().copied()
    }

    /// Replication nodes other than `local`.
    pub fn others(&self, local: SocketAddr) -> impl Iterator<Item = SocketAddr> + '_ {
        self.nodes.iter().copied().filter(move |addr| *addr != local)
    }
}
