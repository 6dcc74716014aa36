use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::info;

use crate::config::SourceConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} answered with HTTP {status}")]
    Http { url: String, status: StatusCode },

    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Http {
                url: url.to_string(),
                status,
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Retrieves the raw listing page from the configured source.
pub struct PageFetcher {
    client: Client,
    url: String,
}

impl PageFetcher {
    pub fn new(source: &SourceConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(source.timeout_secs))
            .user_agent(source.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            url: source.base_url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<Bytes, FetchError> {
        info!("Fetching listing page: {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: self.url.clone(),
                status,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&self.url, e))?;

        info!("Fetched {} bytes from {}", bytes.len(), self.url);
        Ok(bytes)
    }
}
