use axum::{Json, extract::Extension, extract::rejection::JsonRejection, http::StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;

use super::memory::{MirrorStore, PartitionStore};
use super::protocol::{Operation, Request, Response, ResponseCode, TablePayload};
use crate::replication::coordinator::ReplicationCoordinator;

/// Applies peer requests to the local stores.
///
/// Owner-side PUT/DELETE queue their replication job before returning, but
/// never wait for it.
pub struct PeerService {
    self_addr: SocketAddr,
    partition: Arc<PartitionStore>,
    mirror: Arc<MirrorStore>,
    replication: Arc<ReplicationCoordinator>,
}

impl PeerService {
    pub fn new(
        self_addr: SocketAddr,
        partition: Arc<PartitionStore>,
        mirror: Arc<MirrorStore>,
        replication: Arc<ReplicationCoordinator>,
    ) -> Self {
        Self {
            self_addr,
            partition,
            mirror,
            replication,
        }
    }

    pub fn dispatch(&self, request: Request) -> Response {
        let Request { origin, op } = request;
        tracing::debug!("{} serving {} from {}", self.self_addr, op.tag(), origin);

        match op {
            Operation::Put { key, value } => self.put(key, value, false),
            Operation::PutForce { key, value } => self.put(key, value, true),
            Operation::Get { key } => match self.partition.get(&key) {
                Some(value) => Response::ok_with_data(value),
                None => Response::not_found("VALUE with this KEY does not exist."),
            },
            Operation::Delete { key } => {
                self.partition.remove(&key);
                self.replication.propagate_delete(key);
                Response::ok()
            }
            Operation::ReplicaPut { key, value } => {
                self.mirror.put_mirror(origin, key, value);
                Response::ok()
            }
            Operation::ReplicaGet { key } => match self.mirror.get_mirror(&key) {
                Some(value) => Response::ok_with_data(value),
                None => Response::not_found("VALUE with this KEY does not exist."),
            },
            Operation::ReplicaDelete { key } => {
                self.mirror.remove_mirror(&origin, &key);
                Response::ok()
            }
            Operation::GetMirrorOf => match self.mirror.table_of(&origin) {
                Some(table) => Response::ok_with_table(TablePayload::Partition(table)),
                None => Response::not_found(format!("No mirror held for {}", origin)),
            },
            Operation::GetPartition => {
                Response::ok_with_table(TablePayload::Partition(self.partition.snapshot()))
            }
            Operation::GetReplica => {
                Response::ok_with_table(TablePayload::Mirror(self.mirror.snapshot()))
            }
        }
    }

    fn put(&self, key: String, value: String, overwrite: bool) -> Response {
        if self.partition.put(key.clone(), value.clone(), overwrite) {
            self.replication.propagate_put(key, value);
            Response::ok_with_data("(Key,Value) pair added successfully.")
        } else {
            tracing::debug!("PUT '{}' rejected, key already exists", key);
            Response::conflict("Value with this KEY already exist.")
        }
    }
}

pub fn http_status(code: ResponseCode) -> StatusCode {
    match code {
        ResponseCode::Ok => StatusCode::OK,
        ResponseCode::Conflict => StatusCode::CONFLICT,
        ResponseCode::NotFound => StatusCode::NOT_FOUND,
        ResponseCode::Failed => StatusCode::BAD_REQUEST,
    }
}

pub async fn handle_peer_request(
    Extension(service): Extension<Arc<PeerService>>,
    payload: Result<Json<Request>, JsonRejection>,
) -> (StatusCode, Json<Response>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(e) => {
            tracing::error!("Failed to decode peer request: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(Response::failed(format!("Malformed request: {}", e))),
            );
        }
    };

    let response = service.dispatch(request);
    (http_status(response.code), Json(response))
}
