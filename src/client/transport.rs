use crate::storage::protocol::{ENDPOINT_PEER, Request, Response};

use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection refused or timed out. The only signal of a dead peer.
    #[error("peer {addr} is unreachable: {source}")]
    Unreachable {
        addr: SocketAddr,
        #[source]
        source: reqwest::Error,
    },
    /// The peer answered, but not with a decodable `Response`.
    #[error("protocol error from {addr}: {reason}")]
    Protocol { addr: SocketAddr, reason: String },
}

impl TransportError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, TransportError::Unreachable { .. })
    }
}

/// Outbound half of the peer protocol: one request, one response, one connection.
pub struct PeerTransport {
    http_client: reqwest::Client,
}

impl PeerTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            // no idle connections: every exchange opens and closes its own
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self { http_client })
    }

    pub async fn send(&self, addr: SocketAddr, request: &Request) -> Result<Response, TransportError> {
        let url = format!("http://{}{}", addr, ENDPOINT_PEER);

        let response = self
            .http_client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| classify(addr, e))?;

        let status = response.status();
        response.json::<Response>().await.map_err(|e| {
            if e.is_timeout() {
                classify(addr, e)
            } else {
                TransportError::Protocol {
                    addr,
                    reason: format!("undecodable {} response: {}", status, e),
                }
            }
        })
    }
}

fn classify(addr: SocketAddr, error: reqwest::Error) -> TransportError {
    if error.is_connect() || error.is_timeout() || error.is_request() {
        TransportError::Unreachable {
            addr,
            source: error,
        }
    } else {
        TransportError::Protocol {
            addr,
            reason: error.to_string(),
        }
    }
}
