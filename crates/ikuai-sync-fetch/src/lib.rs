// # HTTP List Fetcher
//
// Downloads plain-text lists (one address, network or domain per line)
// for the sync engine.
//
// ## Line Handling
//
// - Surrounding whitespace is trimmed
// - Empty lines and `#` comment lines are dropped
// - Everything else is passed through verbatim; validation and dedup are
//   owned by the engine's row set
//
// The fetcher never retries. A URL that fails is reported to the engine,
// which logs it and moves on to the next URL of the job.

use async_trait::async_trait;
use ikuai_sync_core::config::HttpConfig;
use ikuai_sync_core::traits::ListFetcher;
use ikuai_sync_core::{Error, Result};

/// Fetches lists over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpListFetcher {
    /// HTTP client, shared by all runs
    client: reqwest::Client,
}

impl HttpListFetcher {
    /// Create a fetcher honoring the timeout and TLS settings
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ListFetcher for HttpListFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(url, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::fetch(
                url,
                format!("HTTP error: {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::fetch(url, format!("Failed to read response: {}", e)))?;

        let rows = split_lines(&body);
        tracing::debug!("Fetched {} rows from {}", rows.len(), url);
        Ok(rows)
    }

    fn fetcher_name(&self) -> &'static str {
        "http"
    }
}

/// Split a list body into rows
///
/// ```
/// use ikuai_sync_fetch::split_lines;
///
/// let rows = split_lines("# cn\r\n1.0.1.0/24\n\n  1.0.2.0/23  \n");
/// assert_eq!(rows, vec!["1.0.1.0/24", "1.0.2.0/23"]);
/// ```
pub fn split_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
