// # List Fetcher Trait
//
// Defines the interface for downloading a remote allow/deny list.
//
// ## Implementations
//
// - HTTP(S): `ikuai-sync-fetch` crate
//
// ## Usage
//
// ```rust,ignore
// use ikuai_sync_core::ListFetcher;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let fetcher = /* ListFetcher implementation */;
//
//     let rows = fetcher.fetch("https://example.com/cn.txt").await?;
//     println!("fetched {} rows", rows.len());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for list fetcher implementations
///
/// A fetcher turns one URL into the list of rows it serves. Rows are
/// trimmed and never empty; validating their content is left to the
/// orchestrator.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform one HTTP(S) request per call
/// - ✅ Split and trim the response body
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed URL is skipped by the orchestrator)
/// - ❌ Cache results between runs (each run fetches fresh lists)
/// - ❌ Talk to the router
#[async_trait]
pub trait ListFetcher: Send + Sync {
    /// Fetch the rows served at `url`
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Trimmed, non-empty lines
    /// - `Err(Error)`: If the request failed or timed out
    async fn fetch(&self, url: &str) -> Result<Vec<String>, crate::Error>;

    /// Get the fetcher name (for logging/debugging)
    fn fetcher_name(&self) -> &'static str {
        "unknown"
    }
}
