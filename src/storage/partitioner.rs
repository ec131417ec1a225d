use crate::network::types::{NetworkMap, PeerIndex};
use std::net::SocketAddr;
use std::sync::Arc;

/// Maps keys to the peer that owns them.
///
/// `route(key) = |hash(key)| mod N + 1` over the `NetworkMap`. Changing `N`
/// re-partitions the whole key space and nothing migrates existing entries;
/// membership is static for the lifetime of a cluster.
pub struct HashRouter {
    network: Arc<NetworkMap>,
}

impl HashRouter {
    pub fn new(network: Arc<NetworkMap>) -> Self {
        Self { network }
    }

    /// Polynomial string hash (`h = 31 * h + unit` over UTF-16 code units,
    /// wrapping at 32 bits). Stable across processes and platforms, so every
    /// peer agrees on ownership.
    pub fn string_hash(key: &str) -> i32 {
        key.encode_utf16()
            .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
    }

    pub fn route(&self, key: &str) -> PeerIndex {
        let peers = self.network.len() as i64;
        let hash = (Self::string_hash(key) as i64).abs();
        PeerIndex((hash % peers) as usize + 1)
    }

    /// Address of the owning peer.
    pub fn owner(&self, key: &str) -> SocketAddr {
        let PeerIndex(index) = self.route(key);
        self.network.addresses()[index - 1]
    }

    pub fn is_owner(&self, key: &str, addr: SocketAddr) -> bool {
        self.owner(key) == addr
    }

    pub fn peer_count(&self) -> usize {
        self.network.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_deterministic() {
        let network = NetworkMap::new(vec![
            "127.0.0.1:5000".parse().unwrap(),
            "127.0.0.1:5001".parse().unwrap(),
        ])
        .unwrap();

        let router = HashRouter::new(Arc::new(network));

        let p1 = router.route("book_100");
        let p2 = router.route("book_100");
        assert_eq!(p1, p2);
        assert!(p1.0 >= 1 && p1.0 <= 2);
    }
}
