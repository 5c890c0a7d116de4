//! HTTP source fetching

use crate::error::ExtractError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// One blocking fetch of a source document
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Value, ExtractError>;
}

/// `reqwest`-backed fetcher with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Value, ExtractError> {
        let network = |message: String| ExtractError::Network {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(network(format!("HTTP status {}", response.status())));
        }

        let body = response.bytes().await.map_err(|e| network(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| ExtractError::Malformed {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
