//! Test doubles and common utilities for pipeline contract tests
//!
//! This module provides recording test doubles that verify which calls the
//! engine makes without talking to a real router or list server.

#![allow(dead_code)]

use ikuai_sync_core::config::EngineConfig;
use ikuai_sync_core::error::{Error, Result};
use ikuai_sync_core::job::{CustomIspJob, IpGroupJob, ResourceKind, StreamDomainJob, SyncJob};
use ikuai_sync_core::traits::{DeviceClient, DeviceSession, ListFetcher, NewEntry, RemoteEntry};
use ikuai_sync_core::SyncEngine;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A fetcher serving canned responses per URL
///
/// URLs without a canned response fail.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, std::result::Result<Vec<String>, String>>>>,
    fetch_call_count: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `rows` at `url`
    pub fn with_rows(self, url: &str, rows: &[&str]) -> Self {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            Ok(rows.iter().map(|r| r.to_string()).collect()),
        );
        self
    }

    /// Serve `rows` at `url` (owned rows)
    pub fn with_owned_rows(self, url: &str, rows: Vec<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(rows));
        self
    }

    /// Fail every fetch of `url`
    pub fn with_failure(self, url: &str, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(message.to_string()));
        self
    }

    /// Get the number of times fetch() was called
    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ListFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<String>> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().get(url) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(message)) => Err(Error::fetch(url, message.clone())),
            None => Err(Error::fetch(url, "connection refused")),
        }
    }

    fn fetcher_name(&self) -> &'static str {
        "mock"
    }
}

/// A call observed by the mock device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Login,
    Show(ResourceKind),
    Delete(ResourceKind, Vec<i64>),
    Add {
        kind: ResourceKind,
        name: String,
        members: Vec<String>,
        comment: String,
        interfaces: Vec<String>,
        src_addr: String,
    },
}

/// A router double recording every call
#[derive(Clone, Default)]
pub struct MockDevice {
    calls: Arc<Mutex<Vec<DeviceCall>>>,
    remote: Arc<Mutex<Vec<RemoteEntry>>>,
    fail_login: bool,
    fail_add_at: Option<usize>,
    add_call_count: Arc<AtomicUsize>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries returned by show()
    pub fn with_remote(self, entries: Vec<RemoteEntry>) -> Self {
        *self.remote.lock().unwrap() = entries;
        self
    }

    /// Reject every login
    pub fn failing_login(mut self) -> Self {
        self.fail_login = true;
        self
    }

    /// Fail the add call with the given zero-based position
    pub fn failing_add_at(mut self, position: usize) -> Self {
        self.fail_add_at = Some(position);
        self
    }

    /// All calls observed so far, in order
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of delete calls
    pub fn delete_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, DeviceCall::Delete(..)))
            .count()
    }

    /// Number of add calls (successful or not)
    pub fn add_count(&self) -> usize {
        self.add_call_count.load(Ordering::SeqCst)
    }

    /// Members of every add call, in order
    pub fn added_members(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::Add { members, .. } => Some(members),
                _ => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl DeviceClient for MockDevice {
    async fn login(&self) -> Result<Box<dyn DeviceSession>> {
        self.calls.lock().unwrap().push(DeviceCall::Login);
        if self.fail_login {
            return Err(Error::auth("invalid username or password"));
        }
        Ok(Box::new(self.clone()))
    }

    fn device_name(&self) -> &'static str {
        "mock"
    }
}

#[async_trait::async_trait]
impl DeviceSession for MockDevice {
    async fn show(&self, kind: ResourceKind) -> Result<Vec<RemoteEntry>> {
        self.calls.lock().unwrap().push(DeviceCall::Show(kind));
        Ok(self.remote.lock().unwrap().clone())
    }

    async fn delete(&self, kind: ResourceKind, ids: &[i64]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(DeviceCall::Delete(kind, ids.to_vec()));
        Ok(())
    }

    async fn add(&self, kind: ResourceKind, entry: NewEntry<'_>) -> Result<()> {
        let position = self.add_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_add_at == Some(position) {
            return Err(Error::device("add", kind, 30001, "payload rejected"));
        }
        self.calls.lock().unwrap().push(DeviceCall::Add {
            kind,
            name: entry.name.to_string(),
            members: entry.members.to_vec(),
            comment: entry.comment.to_string(),
            interfaces: entry.interfaces.to_vec(),
            src_addr: entry.src_addr.to_string(),
        });
        Ok(())
    }
}

/// Build an engine over the given doubles
pub fn engine(fetcher: &MockFetcher, device: &MockDevice, chunk_size: usize) -> SyncEngine {
    SyncEngine::new(
        Arc::new(fetcher.clone()),
        Arc::new(device.clone()),
        &EngineConfig { chunk_size },
    )
    .expect("engine construction succeeds")
}

pub fn ip_group_job(name: &str, urls: &[&str]) -> SyncJob {
    SyncJob::IpGroup(IpGroupJob {
        index: "1".to_string(),
        schedule: "0 * * * *".to_string(),
        name: name.to_string(),
        urls: urls.iter().map(|u| u.to_string()).collect(),
        comment: String::new(),
    })
}

pub fn custom_isp_job(name: &str, urls: &[&str]) -> SyncJob {
    SyncJob::CustomIsp(CustomIspJob {
        index: "1".to_string(),
        schedule: "0 * * * *".to_string(),
        name: name.to_string(),
        urls: urls.iter().map(|u| u.to_string()).collect(),
        comment: "isp list".to_string(),
    })
}

pub fn stream_domain_job(interfaces: &[&str], urls: &[&str], comment: &str) -> SyncJob {
    SyncJob::StreamDomain(StreamDomainJob {
        index: "1".to_string(),
        schedule: "0 * * * *".to_string(),
        interfaces: interfaces.iter().map(|i| i.to_string()).collect(),
        urls: urls.iter().map(|u| u.to_string()).collect(),
        src_addr: String::new(),
        comment: comment.to_string(),
    })
}

/// `n` distinct IPv4 addresses
pub fn addresses(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff))
        .collect()
}
