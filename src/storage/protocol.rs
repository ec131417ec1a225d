//! Peer Wire Protocol
//!
//! Defines the request/response envelope exchanged between peers and the
//! client-facing DTOs.
//!
//! One exchange per connection: the sender POSTs a JSON `Request` to
//! [`ENDPOINT_PEER`] and reads back exactly one JSON `Response`.

use super::memory::{MirrorTable, PartitionTable};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

// --- API Endpoints ---

/// Peer-to-peer endpoint. Every `Operation` travels through it.
pub const ENDPOINT_PEER: &str = "/dht";
/// Public endpoint for client write requests.
pub const ENDPOINT_PUT: &str = "/put";
/// Public endpoint for client read requests.
pub const ENDPOINT_GET: &str = "/get";
/// Public endpoint for client delete requests.
pub const ENDPOINT_DELETE: &str = "/delete";
/// Local store sizes and propagation counters.
pub const ENDPOINT_STATS: &str = "/stats";

// --- Peer envelope ---

/// A typed request from one peer to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    /// Configured address of the sending peer. Replication requests and
    /// `GET_HASHTABLE` are answered on behalf of this identity.
    pub origin: SocketAddr,
    pub op: Operation,
}

impl Request {
    pub fn new(origin: SocketAddr, op: Operation) -> Self {
        Self { origin, op }
    }
}

/// The closed set of operations a peer serves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum Operation {
    /// Store in the owner's partition; fails with `Conflict` if present.
    #[serde(rename = "PUT")]
    Put { key: String, value: String },
    /// Store in the owner's partition, replacing any existing value.
    #[serde(rename = "PUT_FORCE")]
    PutForce { key: String, value: String },
    #[serde(rename = "GET")]
    Get { key: String },
    #[serde(rename = "DELETE")]
    Delete { key: String },
    /// Mirror one entry of the origin's partition.
    #[serde(rename = "R_PUT")]
    ReplicaPut { key: String, value: String },
    /// Look a key up across every mirrored partition.
    #[serde(rename = "R_GET")]
    ReplicaGet { key: String },
    #[serde(rename = "R_DELETE")]
    ReplicaDelete { key: String },
    /// "Send me the mirror you hold of my partition."
    #[serde(rename = "GET_HASHTABLE")]
    GetMirrorOf,
    /// "Send me your own partition."
    #[serde(rename = "GET_R_HASHTABLE")]
    GetPartition,
    /// "Send me every mirror you hold."
    #[serde(rename = "GET_REPLICA")]
    GetReplica,
}

impl Operation {
    /// Wire tag, for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            Operation::Put { .. } => "PUT",
            Operation::PutForce { .. } => "PUT_FORCE",
            Operation::Get { .. } => "GET",
            Operation::Delete { .. } => "DELETE",
            Operation::ReplicaPut { .. } => "R_PUT",
            Operation::ReplicaGet { .. } => "R_GET",
            Operation::ReplicaDelete { .. } => "R_DELETE",
            Operation::GetMirrorOf => "GET_HASHTABLE",
            Operation::GetPartition => "GET_R_HASHTABLE",
            Operation::GetReplica => "GET_REPLICA",
        }
    }
}

/// Status carried in every response, encoded as its numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum ResponseCode {
    Ok,
    Conflict,
    NotFound,
    Failed,
}

impl From<ResponseCode> for u16 {
    fn from(code: ResponseCode) -> u16 {
        match code {
            ResponseCode::Ok => 200,
            ResponseCode::Conflict => 300,
            ResponseCode::NotFound => 404,
            ResponseCode::Failed => 400,
        }
    }
}

impl TryFrom<u16> for ResponseCode {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            200 => Ok(ResponseCode::Ok),
            300 => Ok(ResponseCode::Conflict),
            404 => Ok(ResponseCode::NotFound),
            400 => Ok(ResponseCode::Failed),
            other => Err(format!("unknown response code {}", other)),
        }
    }
}

/// Bulk payload for the table-transfer operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "entries")]
pub enum TablePayload {
    Partition(PartitionTable),
    Mirror(MirrorTable),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub code: ResponseCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TablePayload>,
}

impl Response {
    fn with_code(code: ResponseCode, data: Option<String>) -> Self {
        Self {
            code,
            data,
            table: None,
        }
    }

    pub fn ok() -> Self {
        Self::with_code(ResponseCode::Ok, None)
    }

    pub fn ok_with_data(data: impl Into<String>) -> Self {
        Self::with_code(ResponseCode::Ok, Some(data.into()))
    }

    pub fn ok_with_table(table: TablePayload) -> Self {
        Self {
            code: ResponseCode::Ok,
            data: None,
            table: Some(table),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_code(ResponseCode::Conflict, Some(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_code(ResponseCode::NotFound, Some(message.into()))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::with_code(ResponseCode::Failed, Some(message.into()))
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok
    }
}

// --- Client-facing DTOs ---

/// Standard client request for writing data.
#[derive(Debug, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
    /// Replace an existing value instead of reporting a collision.
    #[serde(default)]
    pub force: bool,
}

/// Acknowledgment for write and delete operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct PutResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Standard response for data retrieval. `None` means the key does not exist.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetResponse {
    pub value: Option<String>,
}
