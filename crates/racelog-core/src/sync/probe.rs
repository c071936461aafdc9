//! Connectivity probing.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;

use crate::error::{Error, Result};
use crate::util::is_http_url;

/// Answers "can we reach the remote service right now?"
///
/// Being offline is a normal condition, so implementations return `false`
/// instead of failing.
pub trait ConnectivityProbe: Send + Sync + 'static {
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;
}

/// Probe that issues a bounded GET against a well-known endpoint
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into().trim().to_string();
        if !is_http_url(&url) {
            return Err(Error::Config(format!(
                "probe URL must include http:// or https://: {url}"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build probe client: {error}")))?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ConnectivityProbe for HttpProbe {
    async fn is_reachable(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(
                    "Connectivity probe {} returned HTTP {}",
                    self.url,
                    response.status().as_u16()
                );
                false
            }
            Err(error) => {
                tracing::debug!("Connectivity probe {} failed: {}", self.url, error);
                false
            }
        }
    }
}

/// Probe for local-only mode: never reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl ConnectivityProbe for Offline {
    async fn is_reachable(&self) -> bool {
        false
    }
}
