use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::net::SocketAddr;

/// Plain key -> value snapshot of one peer's partition.
pub type PartitionTable = HashMap<String, String>;

/// Owner address -> snapshot of that owner's partition.
pub type MirrorTable = HashMap<SocketAddr, PartitionTable>;

/// The key/value pairs this peer owns.
///
/// Every operation is atomic per key; callers never take an outer lock.
/// Nothing spans more than one key.
#[derive(Default)]
pub struct PartitionStore {
    entries: DashMap<String, String>,
}

impl PartitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts when `key` is absent, or replaces it when `overwrite` is set.
    /// Returns `false`, leaving the stored value untouched, on a collision.
    pub fn put(&self, key: String, value: String, overwrite: bool) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut existing) => {
                if overwrite {
                    existing.insert(value);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|value| value.value().clone())
    }

    /// Idempotent.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn snapshot(&self) -> PartitionTable {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Bulk upsert used by recovery. Returns how many entries were applied.
    pub fn merge(&self, table: PartitionTable) -> usize {
        let count = table.len();
        for (key, value) in table {
            self.put(key, value, true);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shadow copies of other peers' partitions, keyed by the owner's address.
///
/// Only replication writes and recovery touch it; local client operations never do.
#[derive(Default)]
pub struct MirrorStore {
    owners: DashMap<SocketAddr, DashMap<String, String>>,
}

impl MirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replication writes always win.
    pub fn put_mirror(&self, owner: SocketAddr, key: String, value: String) {
        self.owners.entry(owner).or_default().insert(key, value);
    }

    /// Linear scan over every mirrored owner.
    ///
    /// If two owners hold the same key the first one met in the map's iteration
    /// order wins; that order is unspecified.
    pub fn get_mirror(&self, key: &str) -> Option<String> {
        self.owners
            .iter()
            .find_map(|owner| owner.value().get(key).map(|value| value.value().clone()))
    }

    pub fn get_mirror_of(&self, owner: &SocketAddr, key: &str) -> Option<String> {
        self.owners
            .get(owner)
            .and_then(|table| table.get(key).map(|value| value.value().clone()))
    }

    pub fn remove_mirror(&self, owner: &SocketAddr, key: &str) {
        if let Some(table) = self.owners.get(owner) {
            table.remove(key);
        }
    }

    /// Snapshot of what this node holds for `owner`, if anything.
    pub fn table_of(&self, owner: &SocketAddr) -> Option<PartitionTable> {
        self.owners.get(owner).map(|table| {
            table
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect()
        })
    }

    pub fn snapshot(&self) -> MirrorTable {
        self.owners
            .iter()
            .map(|owner| {
                let table = owner
                    .value()
                    .iter()
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect();
                (*owner.key(), table)
            })
            .collect()
    }

    /// Wholesale replacement used by bootstrap recovery.
    pub fn replace(&self, table: MirrorTable) {
        self.owners.clear();
        for (owner, entries) in table {
            self.owners.insert(owner, entries.into_iter().collect());
        }
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    pub fn entry_count(&self) -> usize {
        self.owners.iter().map(|owner| owner.value().len()).sum()
    }
}
