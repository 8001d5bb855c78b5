//! Transport collaborator.
//!
//! The executor performs exactly one round trip per call through this seam;
//! swapping the implementation is how tests drive the protocol without a
//! network.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

/// Error type for the transport layer, distinct from protocol-level errors
/// carried inside a well-formed response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),
}

/// Sends a serialized request to a discovery endpoint and returns the raw
/// response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        endpoint: &Url,
        soap_action: &str,
        body: Vec<u8>,
    ) -> Result<String, TransportError>;
}

/// HTTPS transport over reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with a connection timeout suitable for discovery.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }

    /// Wraps a caller-configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &Url,
        soap_action: &str,
        body: Vec<u8>,
    ) -> Result<String, TransportError> {
        let response = self
            .client
            .post(endpoint.clone())
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{soap_action}\""))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::error!("discovery request to {} failed with status {}", endpoint, status);
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}
