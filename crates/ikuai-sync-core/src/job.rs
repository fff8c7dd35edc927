//! Job model
//!
//! A job binds one resource kind on the router to a schedule, a target and
//! a set of source URLs. Jobs are built by the parser in [`crate::config`]
//! and are immutable afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comment attached to created entries when a job configures none
pub const DEFAULT_COMMENT: &str = "ikuai-sync";

/// Category of remote configuration on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Custom ISP route table
    CustomIsp,
    /// IP group
    IpGroup,
    /// Stream-routing domain rule
    StreamDomain,
}

impl ResourceKind {
    /// Name of the device function handling this kind (`func_name`)
    pub fn func_name(&self) -> &'static str {
        match self {
            ResourceKind::CustomIsp => "custom_isp",
            ResourceKind::IpGroup => "ipgroup",
            ResourceKind::StreamDomain => "stream_domain",
        }
    }

    /// Short label used in log tags
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::CustomIsp => "custom_isp",
            ResourceKind::IpGroup => "ip_group",
            ResourceKind::StreamDomain => "stream_domain",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.func_name())
    }
}

/// Custom ISP job: `cron|name|url1,url2,...|comment?`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomIspJob {
    /// Index taken from the configuration key
    pub index: String,
    /// Cron expression
    pub schedule: String,
    /// Custom ISP name on the device
    pub name: String,
    /// Source list URLs
    pub urls: Vec<String>,
    /// Comment as configured (may be empty)
    pub comment: String,
}

/// IP group job: `cron|name|url1,url2,...|comment?`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpGroupJob {
    /// Index taken from the configuration key
    pub index: String,
    /// Cron expression
    pub schedule: String,
    /// IP group name on the device
    pub name: String,
    /// Source list URLs
    pub urls: Vec<String>,
    /// Comment as configured (may be empty)
    pub comment: String,
}

/// Stream domain job: `cron|iface1,iface2,...|url1,url2,...|srcAddr?|comment?`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDomainJob {
    /// Index taken from the configuration key
    pub index: String,
    /// Cron expression
    pub schedule: String,
    /// Outbound interfaces the rule routes to
    pub interfaces: Vec<String>,
    /// Source list URLs
    pub urls: Vec<String>,
    /// Source address restriction (may be empty)
    pub src_addr: String,
    /// Comment as configured (may be empty)
    pub comment: String,
}

/// A configured synchronization job of any kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncJob {
    /// Custom ISP job
    CustomIsp(CustomIspJob),
    /// IP group job
    IpGroup(IpGroupJob),
    /// Stream domain job
    StreamDomain(StreamDomainJob),
}

impl SyncJob {
    /// Resource kind this job maintains
    pub fn kind(&self) -> ResourceKind {
        match self {
            SyncJob::CustomIsp(_) => ResourceKind::CustomIsp,
            SyncJob::IpGroup(_) => ResourceKind::IpGroup,
            SyncJob::StreamDomain(_) => ResourceKind::StreamDomain,
        }
    }

    /// Index the job was configured under
    pub fn index(&self) -> &str {
        match self {
            SyncJob::CustomIsp(job) => &job.index,
            SyncJob::IpGroup(job) => &job.index,
            SyncJob::StreamDomain(job) => &job.index,
        }
    }

    /// Cron expression, passed to the scheduler unmodified
    pub fn schedule(&self) -> &str {
        match self {
            SyncJob::CustomIsp(job) => &job.schedule,
            SyncJob::IpGroup(job) => &job.schedule,
            SyncJob::StreamDomain(job) => &job.schedule,
        }
    }

    /// Source list URLs
    pub fn urls(&self) -> &[String] {
        match self {
            SyncJob::CustomIsp(job) => &job.urls,
            SyncJob::IpGroup(job) => &job.urls,
            SyncJob::StreamDomain(job) => &job.urls,
        }
    }

    /// Comment attached to created entries, falling back to [`DEFAULT_COMMENT`]
    pub fn effective_comment(&self) -> &str {
        let comment = match self {
            SyncJob::CustomIsp(job) => &job.comment,
            SyncJob::IpGroup(job) => &job.comment,
            SyncJob::StreamDomain(job) => &job.comment,
        };
        if comment.is_empty() {
            DEFAULT_COMMENT
        } else {
            comment
        }
    }

    /// Human-readable target: group/ISP name, or the interface list
    pub fn target(&self) -> String {
        match self {
            SyncJob::CustomIsp(job) => job.name.clone(),
            SyncJob::IpGroup(job) => job.name.clone(),
            SyncJob::StreamDomain(job) => job.interfaces.join(","),
        }
    }

    /// Log tag, e.g. `ip_group#1:geo`
    pub fn tag(&self) -> String {
        format!("{}#{}:{}", self.kind().label(), self.index(), self.target())
    }
}
