//! Content-addressed publishing.
//!
//! The combined level lookup publishes its derived string to an external
//! content-addressable store and returns the resulting address.

use async_trait::async_trait;
use quotagate_core::config::PublishConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Address of published content (an IPFS CID for the IPFS publisher).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publishing errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("content publishing is disabled")]
    Disabled,

    #[error("publish request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response from content store: {0}")]
    InvalidResponse(String),
}

/// Store that turns content into an address.
#[async_trait]
pub trait ContentPublisher: Send + Sync {
    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Publish `content` and return its address.
    async fn publish(&self, content: &str) -> Result<ContentAddress, PublishError>;
}

/// Publisher used when no content store is configured.
pub struct DisabledPublisher;

#[async_trait]
impl ContentPublisher for DisabledPublisher {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn publish(&self, _content: &str) -> Result<ContentAddress, PublishError> {
        Err(PublishError::Disabled)
    }
}

/// Publisher backed by an IPFS node's HTTP RPC API.
pub struct IpfsPublisher {
    client: reqwest::Client,
    add_url: String,
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

impl IpfsPublisher {
    /// Create a publisher for the RPC API at `api_url` (e.g. `http://localhost:5002`).
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            add_url: format!("{}/api/v0/add", api_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ContentPublisher for IpfsPublisher {
    fn name(&self) -> &'static str {
        "ipfs"
    }

    async fn publish(&self, content: &str) -> Result<ContentAddress, PublishError> {
        let part = reqwest::multipart::Part::text(content.to_string()).file_name("content");
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.add_url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        let body: AddResponse = response.json().await?;
        if body.hash.is_empty() {
            return Err(PublishError::InvalidResponse(
                "missing Hash in add response".to_string(),
            ));
        }
        tracing::debug!(cid = %body.hash, "Published content");
        Ok(ContentAddress(body.hash))
    }
}

/// Create a publisher from configuration.
pub fn from_config(config: &PublishConfig) -> Result<Arc<dyn ContentPublisher>, PublishError> {
    match config {
        PublishConfig::Disabled => Ok(Arc::new(DisabledPublisher) as Arc<dyn ContentPublisher>),
        PublishConfig::Ipfs {
            api_url,
            timeout_secs,
        } => {
            let publisher = IpfsPublisher::new(api_url, Duration::from_secs(*timeout_secs))?;
            tracing::info!(api_url = %api_url, "IPFS publishing enabled");
            Ok(Arc::new(publisher) as Arc<dyn ContentPublisher>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_publisher() {
        let publisher = from_config(&PublishConfig::Disabled).unwrap();
        assert_eq!(publisher.name(), "disabled");
        assert!(matches!(
            publisher.publish("5100").await,
            Err(PublishError::Disabled)
        ));
    }

    #[test]
    fn test_add_url_normalized() {
        let publisher = IpfsPublisher::new("http://localhost:5002/", Duration::from_secs(1)).unwrap();
        assert_eq!(publisher.add_url, "http://localhost:5002/api/v0/add");
    }
}
