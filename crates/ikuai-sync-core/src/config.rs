//! Configuration types for the sync system
//!
//! This module defines the process-level settings and the job parser that
//! turns indexed, pipe-delimited environment entries into typed jobs.
//!
//! ## Job entries
//!
//! ```text
//! IKUAI_CRON_CUSTOM_ISP_<n>    = cron|name|url1,url2,...|comment?
//! IKUAI_CRON_STREAM_DOMAIN_<n> = cron|iface1,iface2,...|url1,url2,...|srcAddr?|comment?
//! IKUAI_CRON_IP_GROUP_<n>      = cron|name|url1,url2,...|comment?
//! ```
//!
//! Malformed entries are dropped without an error so one bad job never
//! keeps the others from loading.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::job::{CustomIspJob, IpGroupJob, StreamDomainJob, SyncJob};

/// Default router address
pub const DEFAULT_DEVICE_ADDR: &str = "http://192.168.1.1";

/// Default per-call HTTP timeout in milliseconds
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

/// Default timezone for cron evaluation
pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

/// Maximum number of entries sent in one add request
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Minimum number of `|`-separated fields in a job entry
const MIN_JOB_FIELDS: usize = 3;

static JOB_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^IKUAI_CRON_(CUSTOM_ISP|STREAM_DOMAIN|IP_GROUP)_(\d+)$")
        .expect("job key pattern is valid")
});

/// Main sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Router connection settings
    pub device: DeviceConfig,

    /// HTTP client settings shared by the fetcher and the device client
    #[serde(default)]
    pub http: HttpConfig,

    /// Orchestrator settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Configured jobs
    #[serde(default)]
    pub jobs: JobSet,
}

impl SyncConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.device.validate()?;

        if self.http.timeout_ms == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }

        if self.engine.chunk_size == 0 {
            return Err(crate::Error::config("Chunk size must be > 0"));
        }

        self.scheduler.timezone()?;

        Ok(())
    }
}

/// Router connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Base URL of the router web interface
    pub addr: String,
    /// Login user
    pub username: String,
    /// Login password
    /// ⚠️ NEVER log this value
    pub password: String,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("addr", &self.addr)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl DeviceConfig {
    /// Validate the device settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.addr.is_empty() {
            return Err(crate::Error::config("Router address cannot be empty"));
        }
        if !self.addr.starts_with("http://") && !self.addr.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Router address must use HTTP or HTTPS scheme. Got: {}",
                self.addr
            )));
        }
        if self.username.is_empty() {
            return Err(crate::Error::config("Router username cannot be empty"));
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_DEVICE_ADDR.to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Overall timeout of a single request, in milliseconds
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,

    /// Accept invalid TLS certificates
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

impl HttpConfig {
    /// Request timeout as a [`std::time::Duration`]
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_http_timeout_ms(),
            insecure_skip_verify: false,
        }
    }
}

fn default_http_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum entries per add request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// IANA timezone cron expressions are evaluated in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Skip the immediate run at startup and wait for the first cron tick
    #[serde(default)]
    pub skip_start: bool,
}

impl SchedulerConfig {
    /// Parse the configured timezone
    pub fn timezone(&self) -> Result<chrono_tz::Tz, crate::Error> {
        self.timezone
            .parse()
            .map_err(|_| crate::Error::config(format!("Unknown timezone: {}", self.timezone)))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            skip_start: false,
        }
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

/// All jobs found in the configuration, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSet {
    /// Custom ISP jobs
    pub custom_isp: Vec<CustomIspJob>,
    /// Stream domain jobs
    pub stream_domain: Vec<StreamDomainJob>,
    /// IP group jobs
    pub ip_group: Vec<IpGroupJob>,
}

impl JobSet {
    /// Parse jobs out of configuration key/value pairs
    ///
    /// Keys must match `IKUAI_CRON_<KIND>_<digits>` exactly. For each kind
    /// the first valid entry for a given index wins. Entries with fewer than
    /// three fields, an empty name/interface list, or no URL are dropped.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut custom_isp = BTreeMap::new();
        let mut stream_domain = BTreeMap::new();
        let mut ip_group = BTreeMap::new();

        for (key, value) in vars {
            let Some(captures) = JOB_KEY.captures(key.as_ref()) else {
                continue;
            };
            let index = captures[2].to_string();
            let value = value.as_ref();

            match &captures[1] {
                "CUSTOM_ISP" => {
                    if custom_isp.contains_key(&index) {
                        continue;
                    }
                    if let Some(job) = parse_custom_isp(&index, value) {
                        custom_isp.insert(index, job);
                    }
                }
                "STREAM_DOMAIN" => {
                    if stream_domain.contains_key(&index) {
                        continue;
                    }
                    if let Some(job) = parse_stream_domain(&index, value) {
                        stream_domain.insert(index, job);
                    }
                }
                "IP_GROUP" => {
                    if ip_group.contains_key(&index) {
                        continue;
                    }
                    if let Some(job) = parse_ip_group(&index, value) {
                        ip_group.insert(index, job);
                    }
                }
                _ => {}
            }
        }

        Self {
            custom_isp: custom_isp.into_values().collect(),
            stream_domain: stream_domain.into_values().collect(),
            ip_group: ip_group.into_values().collect(),
        }
    }

    /// Total number of jobs
    pub fn len(&self) -> usize {
        self.custom_isp.len() + self.stream_domain.len() + self.ip_group.len()
    }

    /// Whether no job was configured
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a list of jobs of any kind
    pub fn into_jobs(self) -> Vec<SyncJob> {
        let mut jobs = Vec::with_capacity(self.len());
        jobs.extend(self.custom_isp.into_iter().map(SyncJob::CustomIsp));
        jobs.extend(self.stream_domain.into_iter().map(SyncJob::StreamDomain));
        jobs.extend(self.ip_group.into_iter().map(SyncJob::IpGroup));
        jobs
    }
}

/// Split an entry into its fields, or `None` if it has too few
fn split_fields(value: &str) -> Option<Vec<&str>> {
    let fields: Vec<&str> = value.split('|').map(str::trim).collect();
    if fields.len() < MIN_JOB_FIELDS {
        return None;
    }
    Some(fields)
}

/// Split a comma-separated list, dropping empty items
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn optional_field(fields: &[&str], position: usize) -> String {
    fields.get(position).map(|s| s.to_string()).unwrap_or_default()
}

fn parse_custom_isp(index: &str, value: &str) -> Option<CustomIspJob> {
    let fields = split_fields(value)?;
    let name = fields[1].to_string();
    let urls = split_list(fields[2]);
    if name.is_empty() || urls.is_empty() {
        return None;
    }

    Some(CustomIspJob {
        index: index.to_string(),
        schedule: fields[0].to_string(),
        name,
        urls,
        comment: optional_field(&fields, 3),
    })
}

fn parse_ip_group(index: &str, value: &str) -> Option<IpGroupJob> {
    let fields = split_fields(value)?;
    let name = fields[1].to_string();
    let urls = split_list(fields[2]);
    if name.is_empty() || urls.is_empty() {
        return None;
    }

    Some(IpGroupJob {
        index: index.to_string(),
        schedule: fields[0].to_string(),
        name,
        urls,
        comment: optional_field(&fields, 3),
    })
}

fn parse_stream_domain(index: &str, value: &str) -> Option<StreamDomainJob> {
    let fields = split_fields(value)?;
    let interfaces = split_list(fields[1]);
    let urls = split_list(fields[2]);
    if interfaces.is_empty() || urls.is_empty() {
        return None;
    }

    Some(StreamDomainJob {
        index: index.to_string(),
        schedule: fields[0].to_string(),
        interfaces,
        urls,
        src_addr: optional_field(&fields, 3),
        comment: optional_field(&fields, 4),
    })
}
