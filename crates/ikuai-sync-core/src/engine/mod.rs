//! Sync engine
//!
//! The SyncEngine runs one job at a time through the reconciliation
//! protocol:
//! - Fetching every source URL via ListFetcher
//! - Normalizing and deduplicating the rows
//! - Replacing the matching remote entries via DeviceSession
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ ListFetcher │─── rows per URL ────┐
//! └─────────────┘                     │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │  SyncEngine  │── normalize + dedup ──▶ RowSet
//!                            └──────────────┘
//!                                     │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │DeviceSession │ show → delete → add × chunks
//!                            └──────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Fetch each URL; a failed URL is logged and skipped
//! 2. Nothing fetched (or nothing valid) → stop, device untouched
//! 3. Log in (fresh session per run)
//! 4. Show current entries, select the IDs to replace
//! 5. Delete them in one call (skipped when there are none)
//! 6. Add the rows in chunks; the first failing chunk aborts the run
//!
//! Runs are not rolled back: a failure during the add phase leaves the
//! chunks already added in place.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::job::SyncJob;
use crate::rows::{RowSet, chunk_count, chunks};
use crate::traits::{DeviceClient, ListFetcher, NewEntry, RemoteEntry};

/// Summary of a run that replaced remote entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Rows fetched across all URLs, before normalization
    pub fetched_rows: usize,
    /// URLs that failed to fetch
    pub failed_urls: usize,
    /// Unique normalized rows sent to the device
    pub unique_rows: usize,
    /// Remote entries deleted before adding
    pub deleted: usize,
    /// Add requests issued
    pub chunks: usize,
    /// Wall time of the run
    pub duration: Duration,
}

/// Result of a successful job run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote entries were replaced
    Synced(SyncReport),

    /// Nothing usable was fetched; the device was not touched
    Skipped {
        /// Rows fetched across all URLs, before normalization
        fetched_rows: usize,
        /// URLs that failed to fetch
        failed_urls: usize,
    },
}

/// Core sync engine
///
/// The engine holds no per-run state: every call to [`SyncEngine::run`]
/// builds its own row set and opens its own device session, so runs of
/// different jobs can proceed concurrently.
///
/// ## Overlapping runs
///
/// Two concurrent runs of the same job are not serialized. Their
/// delete/add phases may interleave and leave the target temporarily
/// inconsistent; the next complete run repairs it.
#[derive(Clone)]
pub struct SyncEngine {
    /// Source list fetcher
    fetcher: Arc<dyn ListFetcher>,

    /// Router client
    device: Arc<dyn DeviceClient>,

    /// Maximum entries per add request
    chunk_size: usize,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Parameters
    ///
    /// - `fetcher`: List fetcher implementation
    /// - `device`: Device client implementation
    /// - `config`: Engine configuration
    pub fn new(
        fetcher: Arc<dyn ListFetcher>,
        device: Arc<dyn DeviceClient>,
        config: &EngineConfig,
    ) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::config("Chunk size must be > 0"));
        }

        Ok(Self {
            fetcher,
            device,
            chunk_size: config.chunk_size,
        })
    }

    /// Maximum entries per add request
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Run one job to completion
    ///
    /// # Returns
    ///
    /// - `Ok(SyncOutcome)`: The run finished, possibly without touching the device
    /// - `Err(Error::Job)`: The run failed; the error names the failing phase
    pub async fn run(&self, job: &SyncJob) -> Result<SyncOutcome> {
        let started = Instant::now();
        let tag = job.tag();
        let kind = job.kind();

        let (rows, fetched_rows, failed_urls) = self.fetch_rows(&tag, job).await;
        info!("[{}] fetch total rows: {}", tag, fetched_rows);

        if fetched_rows == 0 {
            info!("[{}] nothing fetched, leaving device untouched", tag);
            return Ok(SyncOutcome::Skipped {
                fetched_rows,
                failed_urls,
            });
        }

        if rows.is_empty() {
            warn!(
                "[{}] none of {} fetched rows is a valid {} entry, leaving device untouched",
                tag, fetched_rows, kind
            );
            return Ok(SyncOutcome::Skipped {
                fetched_rows,
                failed_urls,
            });
        }

        let entries = rows.into_vec();
        let unique_rows = entries.len();

        let session = self
            .device
            .login()
            .await
            .map_err(|e| e.in_job(&tag, "login"))?;

        let remote = session
            .show(kind)
            .await
            .map_err(|e| e.in_job(&tag, "show"))?;

        let ids = deletion_ids(job, &remote);
        if ids.is_empty() {
            debug!("[{}] no existing {} entries to replace", tag, kind);
        } else {
            debug!("[{}] deleting {} existing {} entries", tag, ids.len(), kind);
            session
                .delete(kind, &ids)
                .await
                .map_err(|e| e.in_job(&tag, "delete"))?;
        }

        let total_chunks = chunk_count(unique_rows, self.chunk_size);
        for (index, chunk) in chunks(&entries, self.chunk_size).enumerate() {
            session
                .add(kind, new_entry(job, chunk))
                .await
                .map_err(|e| e.in_job(&tag, "add"))?;
            debug!(
                "[{}] added chunk {}/{} ({} rows)",
                tag,
                index + 1,
                total_chunks,
                chunk.len()
            );
        }

        let duration = started.elapsed();
        info!(
            "[{}] synced {} unique rows in {} chunk(s), replaced {} entries, duration: {:?}",
            tag,
            unique_rows,
            total_chunks,
            ids.len(),
            duration
        );

        Ok(SyncOutcome::Synced(SyncReport {
            fetched_rows,
            failed_urls,
            unique_rows,
            deleted: ids.len(),
            chunks: total_chunks,
            duration,
        }))
    }

    /// Fetch every URL of the job into one row set
    ///
    /// Returns the set, the raw row count and the number of failed URLs.
    async fn fetch_rows(&self, tag: &str, job: &SyncJob) -> (RowSet, usize, usize) {
        let mut rows = RowSet::new(job.kind());
        let mut fetched = 0;
        let mut failed = 0;

        for url in job.urls() {
            match self.fetcher.fetch(url).await {
                Ok(lines) => {
                    info!("[{}] fetch {} success, rows: {}", tag, url, lines.len());
                    fetched += lines.len();
                    rows.extend(lines);
                }
                Err(e) => {
                    warn!("[{}] fetch {} failed: {}", tag, url, e);
                    failed += 1;
                }
            }
        }

        (rows, fetched, failed)
    }
}

/// Select the remote entries a run of `job` replaces
///
/// - IP groups: every entry whose group name equals the job's name
/// - Custom ISPs: every entry, regardless of name
/// - Stream domains: every entry whose comment equals the job's effective
///   comment and whose interface set equals the job's; entries without an
///   `interface` field are kept
pub fn deletion_ids(job: &SyncJob, remote: &[RemoteEntry]) -> Vec<i64> {
    match job {
        SyncJob::IpGroup(group) => remote
            .iter()
            .filter(|entry| entry.name == group.name)
            .map(|entry| entry.id)
            .collect(),
        SyncJob::CustomIsp(_) => remote.iter().map(|entry| entry.id).collect(),
        SyncJob::StreamDomain(stream) => {
            let comment = job.effective_comment();
            let interfaces: BTreeSet<&str> = stream.interfaces.iter().map(String::as_str).collect();
            remote
                .iter()
                .filter(|entry| entry.comment == comment)
                .filter(|entry| entry.interfaces().as_ref() == Some(&interfaces))
                .map(|entry| entry.id)
                .collect()
        }
    }
}

/// Build the add request for one chunk of `job`
fn new_entry<'a>(job: &'a SyncJob, members: &'a [String]) -> NewEntry<'a> {
    match job {
        SyncJob::CustomIsp(isp) => NewEntry {
            name: &isp.name,
            members,
            comment: job.effective_comment(),
            interfaces: &[],
            src_addr: "",
        },
        SyncJob::IpGroup(group) => NewEntry {
            name: &group.name,
            members,
            comment: job.effective_comment(),
            interfaces: &[],
            src_addr: "",
        },
        SyncJob::StreamDomain(stream) => NewEntry {
            name: "",
            members,
            comment: job.effective_comment(),
            interfaces: &stream.interfaces,
            src_addr: &stream.src_addr,
        },
    }
}
