//! Network Configuration
//!
//! Reads the properties-style file every peer is started with:
//!
//! ```text
//! # peers sharing the key space, in routing order
//! NODES = 10.0.0.1, 10.0.0.2, 10.0.0.3:20001
//! # peers holding mirrors (may be empty)
//! REPLICATION_NODES = 10.0.0.3
//! PEER_PORT = 20000
//! SELF = 10.0.0.1
//! ```
//!
//! Entries without an explicit port use `PEER_PORT`. The file must be identical
//! on every peer apart from `SELF`, which can also be supplied on the command line.
//! A replication node that is not in `NODES` runs as a mirror-only peer: it owns
//! no keys but holds mirrors and answers replica reads.

use super::types::{NetworkMap, ReplicationSet};

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const KEY_NODES: &str = "NODES";
pub const KEY_REPLICATION_NODES: &str = "REPLICATION_NODES";
pub const KEY_PEER_PORT: &str = "PEER_PORT";
pub const KEY_SELF: &str = "SELF";
pub const KEY_REQUEST_TIMEOUT_MS: &str = "REQUEST_TIMEOUT_MS";
pub const KEY_REPLICATION_WORKERS: &str = "REPLICATION_WORKERS";
pub const KEY_REPLICATION_QUEUE_CAPACITY: &str = "REPLICATION_QUEUE_CAPACITY";

pub const DEFAULT_PEER_PORT: u16 = 20000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_REPLICATION_WORKERS: usize = 4;
pub const DEFAULT_REPLICATION_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub network: Arc<NetworkMap>,
    pub replication: Arc<ReplicationSet>,
    /// Address this process serves on. Must be a member of `network` or `replication`.
    pub self_addr: Option<SocketAddr>,
    /// Port given to address entries that do not name one.
    pub peer_port: u16,
    pub request_timeout: Duration,
    pub replication_workers: usize,
    /// Jobs each replication worker may have queued before new ones are dropped.
    pub replication_queue_capacity: usize,
}

impl NetworkConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read network config {}", path.display()))?;

        Self::parse(&contents).with_context(|| format!("Invalid network config {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let properties = parse_properties(contents)?;

        let peer_port = match properties.get(KEY_PEER_PORT) {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("{} is not a valid port: {}", KEY_PEER_PORT, raw))?,
            None => DEFAULT_PEER_PORT,
        };

        let nodes = properties
            .get(KEY_NODES)
            .ok_or_else(|| anyhow::anyhow!("{} is missing", KEY_NODES))?;
        let network = NetworkMap::new(parse_address_list(nodes, peer_port)?)?;

        let replication = match properties.get(KEY_REPLICATION_NODES) {
            Some(raw) => ReplicationSet::new(parse_address_list(raw, peer_port)?),
            None => ReplicationSet::empty(),
        };

        let request_timeout = match properties.get(KEY_REQUEST_TIMEOUT_MS) {
            Some(raw) => Duration::from_millis(raw.parse::<u64>().with_context(|| {
                format!("{} is not a number: {}", KEY_REQUEST_TIMEOUT_MS, raw)
            })?),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let replication_workers = match properties.get(KEY_REPLICATION_WORKERS) {
            Some(raw) => raw.parse::<usize>().with_context(|| {
                format!("{} is not a number: {}", KEY_REPLICATION_WORKERS, raw)
            })?,
            None => DEFAULT_REPLICATION_WORKERS,
        };
        if replication_workers == 0 {
            return Err(anyhow::anyhow!("{} must be at least 1", KEY_REPLICATION_WORKERS));
        }

        let replication_queue_capacity = match properties.get(KEY_REPLICATION_QUEUE_CAPACITY) {
            Some(raw) => raw.parse::<usize>().with_context(|| {
                format!("{} is not a number: {}", KEY_REPLICATION_QUEUE_CAPACITY, raw)
            })?,
            None => DEFAULT_REPLICATION_QUEUE_CAPACITY,
        };
        if replication_queue_capacity == 0 {
            return Err(anyhow::anyhow!(
                "{} must be at least 1",
                KEY_REPLICATION_QUEUE_CAPACITY
            ));
        }

        let config = Self {
            network: Arc::new(network),
            replication: Arc::new(replication),
            self_addr: None,
            peer_port,
            request_timeout,
            replication_workers,
            replication_queue_capacity,
        };

        match properties.get(KEY_SELF) {
            Some(raw) => config.with_self(parse_peer_addr(raw, peer_port)?),
            None => Ok(config),
        }
    }

    /// Sets the local address, rejecting one listed in neither `NODES` nor
    /// `REPLICATION_NODES`.
    pub fn with_self(mut self, addr: SocketAddr) -> Result<Self> {
        if !self.network.contains(&addr) && !self.replication.contains(&addr) {
            return Err(anyhow::anyhow!(
                "Local address {} is not listed in {} or {}",
                addr,
                KEY_NODES,
                KEY_REPLICATION_NODES
            ));
        }
        self.self_addr = Some(addr);
        Ok(self)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.self_addr.ok_or_else(|| {
            anyhow::anyhow!("Local address unknown: set {} or pass --self", KEY_SELF)
        })
    }

    /// Whether the local peer is a replication node outside `NODES`, owning no keys.
    pub fn is_mirror_only(&self) -> bool {
        self.self_addr
            .map(|addr| !self.network.contains(&addr) && self.replication.contains(&addr))
            .unwrap_or(false)
    }

    /// Whether the local peer is expected to hold mirrors.
    pub fn is_replication_node(&self) -> bool {
        self.self_addr
            .map(|addr| self.replication.contains(&addr))
            .unwrap_or(false)
    }
}

fn parse_properties(contents: &str) -> Result<HashMap<String, String>> {
    let mut properties = HashMap::new();

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Line {}: expected KEY=VALUE", line_no + 1))?;
        let key = key.trim();

        match key {
            KEY_NODES
            | KEY_REPLICATION_NODES
            | KEY_PEER_PORT
            | KEY_SELF
            | KEY_REQUEST_TIMEOUT_MS
            | KEY_REPLICATION_WORKERS
            | KEY_REPLICATION_QUEUE_CAPACITY => {}
            other => tracing::warn!("Ignoring unknown config key {}", other),
        }

        properties.insert(key.to_string(), value.trim().to_string());
    }

    Ok(properties)
}

fn parse_address_list(raw: &str, default_port: u16) -> Result<Vec<SocketAddr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| parse_peer_addr(entry, default_port))
        .collect()
}

/// Accepts `ip:port` or a bare `ip`, which gets `default_port`.
pub fn parse_peer_addr(entry: &str, default_port: u16) -> Result<SocketAddr> {
    let entry = entry.trim();
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let ip: IpAddr = entry
        .parse()
        .with_context(|| format!("Not a peer address: {}", entry))?;
    Ok(SocketAddr::new(ip, default_port))
}
