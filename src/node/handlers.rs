use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
};
use std::sync::Arc;

use super::{DhtNode, NodeStats};
use crate::client::peer_client::{ClientError, PutOutcome};
use crate::storage::protocol::{GetResponse, PutRequest, PutResponse};

fn client_error_status(error: &ClientError) -> StatusCode {
    match error {
        ClientError::InvalidKey(_) | ClientError::InvalidValue(_) => StatusCode::BAD_REQUEST,
        ClientError::OwnerUnreachable { .. }
        | ClientError::Protocol(_)
        | ClientError::Rejected { .. } => StatusCode::BAD_GATEWAY,
    }
}

pub async fn handle_put(
    Extension(node): Extension<Arc<DhtNode>>,
    Json(req): Json<PutRequest>,
) -> (StatusCode, Json<PutResponse>) {
    let result = if req.force {
        node.client().force_put(&req.key, &req.value).await
    } else {
        node.client().put(&req.key, &req.value).await
    };

    match result {
        Ok(PutOutcome::Stored) => (
            StatusCode::OK,
            Json(PutResponse {
                success: true,
                message: None,
            }),
        ),
        Ok(PutOutcome::Collision) => (
            StatusCode::CONFLICT,
            Json(PutResponse {
                success: false,
                message: Some("Key already exists, resend with force to overwrite".to_string()),
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to put '{}': {}", req.key, e);
            (
                client_error_status(&e),
                Json(PutResponse {
                    success: false,
                    message: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_get(
    Extension(node): Extension<Arc<DhtNode>>,
    Path(key): Path<String>,
) -> (StatusCode, Json<GetResponse>) {
    match node.client().get(&key).await {
        Ok(Some(value)) => (StatusCode::OK, Json(GetResponse { value: Some(value) })),
        Ok(None) => (StatusCode::NOT_FOUND, Json(GetResponse { value: None })),
        Err(e) => {
            tracing::error!("Failed to get '{}': {}", key, e);
            (client_error_status(&e), Json(GetResponse { value: None }))
        }
    }
}

pub async fn handle_delete(
    Extension(node): Extension<Arc<DhtNode>>,
    Path(key): Path<String>,
) -> (StatusCode, Json<PutResponse>) {
    match node.client().delete(&key).await {
        Ok(()) => (
            StatusCode::OK,
            Json(PutResponse {
                success: true,
                message: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to delete '{}': {}", key, e);
            (
                client_error_status(&e),
                Json(PutResponse {
                    success: false,
                    message: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_stats(Extension(node): Extension<Arc<DhtNode>>) -> Json<NodeStats> {
    Json(node.stats())
}
