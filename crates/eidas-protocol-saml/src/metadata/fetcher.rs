//! Remote metadata retrieval.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{EidasErrorKey, SamlError, SamlResult};

/// Retrieves raw metadata documents.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fetches the document published at `url`.
    async fn fetch(&self, url: &str) -> SamlResult<String>;
}

/// HTTP(S) fetcher with a bounded timeout.
#[derive(Debug, Clone)]
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
}

impl HttpMetadataFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> SamlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SamlError::configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, url: &str) -> SamlResult<String> {
        let no_metadata = |message: String| {
            SamlError::metadata(EidasErrorKey::SamlEngineNoMetadata, message)
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| no_metadata(format!("cannot fetch {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(no_metadata(format!("{url} answered {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| no_metadata(format!("cannot read {url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_host_is_no_metadata() {
        let fetcher = HttpMetadataFetcher::new(Duration::from_millis(500)).unwrap();
        let err = fetcher
            .fetch("http://127.0.0.1:9/metadata")
            .await
            .unwrap_err();
        assert_eq!(err.key(), EidasErrorKey::SamlEngineNoMetadata);
    }
}
