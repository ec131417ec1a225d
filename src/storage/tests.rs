//! Storage Module Tests
//!
//! Validates key routing and the local stores.
//!
//! ## Test Scopes
//! - **HashRouter**: Stable string hash, owner selection within `1..=N`.
//! - **PartitionStore / MirrorStore**: Conflict policy, idempotent deletes, per-owner mirrors.
//! - **Protocol**: The JSON shape of the peer envelope.
//! - **PeerService**: Dispatch of every operation against the local stores.
//!
//! *Note: Multi-peer behaviour (forwarding, replication, recovery) is tested in `tests/cluster.rs`.*

#[cfg(test)]
mod tests {
    use crate::client::transport::PeerTransport;
    use crate::network::types::{NetworkMap, PeerIndex, ReplicationSet};
    use crate::replication::coordinator::ReplicationCoordinator;
    use crate::storage::handlers::PeerService;
    use crate::storage::memory::{MirrorStore, MirrorTable, PartitionStore, PartitionTable};
    use crate::storage::partitioner::HashRouter;
    use crate::storage::protocol::*;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn three_peer_router() -> HashRouter {
        let network = NetworkMap::new(vec![
            addr("127.0.0.1:20001"),
            addr("127.0.0.1:20002"),
            addr("127.0.0.1:20003"),
        ])
        .unwrap();
        HashRouter::new(Arc::new(network))
    }

    // ============================================================
    // ROUTER TESTS
    // ============================================================

    #[test]
    fn test_string_hash_known_values() {
        assert_eq!(HashRouter::string_hash(""), 0);
        assert_eq!(HashRouter::string_hash("k1"), 3366);
        assert_eq!(HashRouter::string_hash("hello"), 99162322);
        // Classic collision of the 31-polynomial hash
        assert_eq!(HashRouter::string_hash("Aa"), HashRouter::string_hash("BB"));
    }

    #[test]
    fn test_string_hash_wraps_to_min_value() {
        assert_eq!(HashRouter::string_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_route_known_owners() {
        let router = three_peer_router();

        // 3366 % 3 == 0
        assert_eq!(router.route("k1"), PeerIndex(1));
        assert_eq!(router.owner("k1"), addr("127.0.0.1:20001"));
        // 99162322 % 3 == 1
        assert_eq!(router.route("hello"), PeerIndex(2));
        // |i32::MIN| = 2147483648, % 3 == 2
        assert_eq!(router.route("polygenelubricants"), PeerIndex(3));
    }

    #[test]
    fn test_route_is_within_range() {
        let router = three_peer_router();

        for i in 0..1000 {
            let key = format!("key_{}", i);
            let PeerIndex(index) = router.route(&key);
            assert!(
                (1..=router.peer_count()).contains(&index),
                "Index {} out of range for '{}'",
                index,
                key
            );
            assert_eq!(router.route(&key), PeerIndex(index), "Routing must be stable");
        }
    }

    #[test]
    fn test_route_uses_every_peer() {
        let router = three_peer_router();
        let mut counts = std::collections::HashMap::new();

        for i in 0..3000 {
            *counts.entry(router.route(&format!("book_{}", i))).or_insert(0) += 1;
        }

        assert_eq!(counts.len(), 3, "All three peers should own some keys");
    }

    #[test]
    fn test_single_peer_owns_everything() {
        let router = HashRouter::new(Arc::new(NetworkMap::new(vec![addr("127.0.0.1:1")]).unwrap()));
        for key in ["a", "k1", "hello", "polygenelubricants"] {
            assert!(router.is_owner(key, addr("127.0.0.1:1")));
        }
    }

    // ============================================================
    // PARTITION STORE TESTS
    // ============================================================

    #[test]
    fn test_partition_put_get() {
        let store = PartitionStore::new();
        assert!(store.put("k".to_string(), "v".to_string(), false));
        assert_eq!(store.get("k"), Some("v".to_string()));
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_partition_put_collision_keeps_value() {
        let store = PartitionStore::new();
        store.put("k".to_string(), "v1".to_string(), false);

        assert!(!store.put("k".to_string(), "v2".to_string(), false));
        assert_eq!(store.get("k"), Some("v1".to_string()));

        assert!(store.put("k".to_string(), "v2".to_string(), true));
        assert_eq!(store.get("k"), Some("v2".to_string()));
    }

    #[test]
    fn test_partition_remove_is_idempotent() {
        let store = PartitionStore::new();
        store.put("k".to_string(), "v".to_string(), false);

        store.remove("k");
        store.remove("k");
        assert!(!store.contains("k"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_partition_snapshot_and_merge() {
        let store = PartitionStore::new();
        store.put("a".to_string(), "1".to_string(), false);

        let mut incoming = PartitionTable::new();
        incoming.insert("a".to_string(), "9".to_string());
        incoming.insert("b".to_string(), "2".to_string());

        assert_eq!(store.merge(incoming), 2);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.get("a"), Some(&"9".to_string()));
        assert_eq!(snapshot.get("b"), Some(&"2".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_partition_concurrent_puts_single_winner() {
        let store = Arc::new(PartitionStore::new());
        let mut handles = vec![];

        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.put("contested".to_string(), format!("v{}", i), false)
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1, "Exactly one non-forced put may win");
        assert_eq!(store.len(), 1);
    }

    // ============================================================
    // MIRROR STORE TESTS
    // ============================================================

    #[test]
    fn test_mirror_keeps_owners_apart() {
        let mirror = MirrorStore::new();
        let a = addr("127.0.0.1:20001");
        let b = addr("127.0.0.1:20002");

        mirror.put_mirror(a, "k".to_string(), "from_a".to_string());
        mirror.put_mirror(b, "j".to_string(), "from_b".to_string());

        assert_eq!(mirror.get_mirror_of(&a, "k"), Some("from_a".to_string()));
        assert_eq!(mirror.get_mirror_of(&b, "k"), None);
        assert_eq!(mirror.get_mirror("j"), Some("from_b".to_string()));
        assert_eq!(mirror.owner_count(), 2);
        assert_eq!(mirror.entry_count(), 2);
    }

    #[test]
    fn test_mirror_put_overwrites_unconditionally() {
        let mirror = MirrorStore::new();
        let a = addr("127.0.0.1:20001");

        mirror.put_mirror(a, "k".to_string(), "v1".to_string());
        mirror.put_mirror(a, "k".to_string(), "v2".to_string());
        assert_eq!(mirror.get_mirror("k"), Some("v2".to_string()));
    }

    #[test]
    fn test_mirror_remove_and_table_of() {
        let mirror = MirrorStore::new();
        let a = addr("127.0.0.1:20001");

        // Removing from an unknown owner is a no-op
        mirror.remove_mirror(&a, "k");
        assert_eq!(mirror.table_of(&a), None);

        mirror.put_mirror(a, "k".to_string(), "v".to_string());
        mirror.put_mirror(a, "j".to_string(), "w".to_string());
        mirror.remove_mirror(&a, "k");

        let table = mirror.table_of(&a).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("j"), Some(&"w".to_string()));
    }

    #[test]
    fn test_mirror_replace_discards_previous_state() {
        let mirror = MirrorStore::new();
        let a = addr("127.0.0.1:20001");
        let b = addr("127.0.0.1:20002");
        mirror.put_mirror(a, "stale".to_string(), "x".to_string());

        let mut table = MirrorTable::new();
        table.insert(b, PartitionTable::from([("k".to_string(), "v".to_string())]));
        mirror.replace(table.clone());

        assert_eq!(mirror.get_mirror("stale"), None);
        assert_eq!(mirror.snapshot(), table);
    }

    // ============================================================
    // PROTOCOL TESTS
    // ============================================================

    #[test]
    fn test_request_json_shape() {
        let request = Request::new(
            addr("127.0.0.1:20001"),
            Operation::Put {
                key: "k1".to_string(),
                value: "v1".to_string(),
            },
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "origin": "127.0.0.1:20001",
                "op": { "type": "PUT", "data": { "key": "k1", "value": "v1" } }
            })
        );

        let table_request: Request =
            serde_json::from_str(r#"{"origin":"127.0.0.1:20001","op":{"type":"GET_REPLICA"}}"#)
                .unwrap();
        assert_eq!(table_request.op, Operation::GetReplica);
    }

    #[test]
    fn test_response_codes_are_numeric() {
        let json = serde_json::to_value(Response::conflict("exists")).unwrap();
        assert_eq!(json, serde_json::json!({ "code": 300, "data": "exists" }));

        let decoded: Response = serde_json::from_str(r#"{"code":404}"#).unwrap();
        assert_eq!(decoded.code, ResponseCode::NotFound);
        assert!(serde_json::from_str::<Response>(r#"{"code":500}"#).is_err());
    }

    #[test]
    fn test_mirror_payload_keys_by_address() {
        let mut table = MirrorTable::new();
        table.insert(
            addr("127.0.0.1:20001"),
            PartitionTable::from([("k".to_string(), "v".to_string())]),
        );

        let response = Response::ok_with_table(TablePayload::Mirror(table.clone()));
        let encoded = serde_json::to_string(&response).unwrap();
        let decoded: Response = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.table, Some(TablePayload::Mirror(table)));
    }

    // ============================================================
    // PEER SERVICE TESTS
    // ============================================================

    fn standalone_service(self_addr: SocketAddr) -> (PeerService, Arc<PartitionStore>, Arc<MirrorStore>) {
        let network = Arc::new(NetworkMap::new(vec![self_addr]).unwrap());
        let partition = Arc::new(PartitionStore::new());
        let mirror = Arc::new(MirrorStore::new());
        let transport = Arc::new(PeerTransport::new(Duration::from_millis(200)).unwrap());

        let replication = ReplicationCoordinator::new(
            self_addr,
            network,
            Arc::new(ReplicationSet::empty()),
            partition.clone(),
            mirror.clone(),
            transport,
            1,
            16,
        );

        let service = PeerService::new(self_addr, partition.clone(), mirror.clone(), replication);
        (service, partition, mirror)
    }

    #[tokio::test]
    async fn test_dispatch_put_conflict_and_force() {
        let me = addr("127.0.0.1:20001");
        let (service, partition, _) = standalone_service(me);

        let put = |value: &str| Operation::Put {
            key: "k1".to_string(),
            value: value.to_string(),
        };

        assert_eq!(service.dispatch(Request::new(me, put("v1"))).code, ResponseCode::Ok);
        assert_eq!(service.dispatch(Request::new(me, put("v2"))).code, ResponseCode::Conflict);
        assert_eq!(partition.get("k1"), Some("v1".to_string()));

        let forced = Operation::PutForce {
            key: "k1".to_string(),
            value: "v2".to_string(),
        };
        assert!(service.dispatch(Request::new(me, forced)).is_ok());
        assert_eq!(partition.get("k1"), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_dispatch_get_and_delete() {
        let me = addr("127.0.0.1:20001");
        let (service, partition, _) = standalone_service(me);
        partition.put("k1".to_string(), "v1".to_string(), false);

        let get = || Operation::Get {
            key: "k1".to_string(),
        };
        let found = service.dispatch(Request::new(me, get()));
        assert_eq!(found.code, ResponseCode::Ok);
        assert_eq!(found.data, Some("v1".to_string()));

        let delete = || Operation::Delete {
            key: "k1".to_string(),
        };
        assert!(service.dispatch(Request::new(me, delete())).is_ok());
        assert!(service.dispatch(Request::new(me, delete())).is_ok());
        assert_eq!(service.dispatch(Request::new(me, get())).code, ResponseCode::NotFound);
    }

    #[tokio::test]
    async fn test_dispatch_replica_ops_use_origin() {
        let me = addr("127.0.0.1:20003");
        let owner = addr("127.0.0.1:20001");
        let (service, partition, mirror) = standalone_service(me);

        let r_put = Operation::ReplicaPut {
            key: "k1".to_string(),
            value: "v1".to_string(),
        };
        assert!(service.dispatch(Request::new(owner, r_put)).is_ok());
        assert_eq!(mirror.get_mirror_of(&owner, "k1"), Some("v1".to_string()));
        assert!(partition.is_empty(), "Mirrors never touch the partition");

        let r_get = service.dispatch(Request::new(
            me,
            Operation::ReplicaGet {
                key: "k1".to_string(),
            },
        ));
        assert_eq!(r_get.data, Some("v1".to_string()));

        let r_del = Operation::ReplicaDelete {
            key: "k1".to_string(),
        };
        assert!(service.dispatch(Request::new(owner, r_del)).is_ok());
        assert_eq!(mirror.get_mirror("k1"), None);
    }

    #[tokio::test]
    async fn test_dispatch_table_requests() {
        let me = addr("127.0.0.1:20003");
        let owner = addr("127.0.0.1:20001");
        let stranger = addr("127.0.0.1:20002");
        let (service, partition, mirror) = standalone_service(me);

        partition.put("own".to_string(), "x".to_string(), false);
        mirror.put_mirror(owner, "k1".to_string(), "v1".to_string());

        let mine = service.dispatch(Request::new(owner, Operation::GetMirrorOf));
        assert_eq!(
            mine.table,
            Some(TablePayload::Partition(PartitionTable::from([(
                "k1".to_string(),
                "v1".to_string()
            )])))
        );

        let none = service.dispatch(Request::new(stranger, Operation::GetMirrorOf));
        assert_eq!(none.code, ResponseCode::NotFound);

        let own = service.dispatch(Request::new(stranger, Operation::GetPartition));
        assert_eq!(own.table, Some(TablePayload::Partition(partition.snapshot())));

        let all = service.dispatch(Request::new(stranger, Operation::GetReplica));
        assert_eq!(all.table, Some(TablePayload::Mirror(mirror.snapshot())));
    }
}
