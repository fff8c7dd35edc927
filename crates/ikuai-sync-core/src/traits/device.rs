// # Device Traits
//
// Defines the interface for reading and replacing entries on the router.
//
// ## Implementations
//
// - iKuai web API: `ikuai-sync-device` crate
//
// ## Usage
//
// ```rust,ignore
// use ikuai_sync_core::{DeviceClient, ResourceKind};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* DeviceClient implementation */;
//
//     // One authenticated session per job run
//     let session = client.login().await?;
//     let groups = session.show(ResourceKind::IpGroup).await?;
//     println!("{} ip groups on the device", groups.len());
//
//     Ok(())
// }
// ```

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::job::ResourceKind;

/// An entry currently stored on the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Device-assigned ID
    pub id: i64,
    /// Group or ISP name (empty for kinds without a name)
    pub name: String,
    /// Entry comment
    pub comment: String,
    /// Remaining kind-specific fields as returned by the device
    pub extra: serde_json::Value,
}

impl RemoteEntry {
    /// Create an entry without extra fields
    pub fn new(id: i64, name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            comment: comment.into(),
            extra: serde_json::Value::Null,
        }
    }

    /// Attach the kind-specific fields
    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }

    /// Interfaces of a stream domain rule, from its comma-separated
    /// `interface` field
    ///
    /// Returns `None` when the device did not report the field.
    pub fn interfaces(&self) -> Option<BTreeSet<&str>> {
        let field = self.extra.get("interface")?.as_str()?;
        Some(
            field
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect(),
        )
    }
}

/// One add request: a batch of members plus the fields the kind needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewEntry<'a> {
    /// Group or ISP name (unused by stream domain rules)
    pub name: &'a str,
    /// Addresses or domains, at most one chunk
    pub members: &'a [String],
    /// Comment attached to the entry
    pub comment: &'a str,
    /// Outbound interfaces (stream domain rules only)
    pub interfaces: &'a [String],
    /// Source address restriction (stream domain rules only)
    pub src_addr: &'a str,
}

/// An authenticated session on the device
///
/// Sessions are created per job run and never shared between runs.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform API calls against the device it was opened for
/// - ✅ Translate device result codes into errors
///
/// ## Forbidden Capabilities
/// - ❌ Retry failed calls (every device error is fatal for the run)
/// - ❌ Decide which entries to delete (owned by `SyncEngine`)
/// - ❌ Split batches (chunking is owned by `SyncEngine`)
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// List all entries of `kind`
    async fn show(&self, kind: ResourceKind) -> Result<Vec<RemoteEntry>, crate::Error>;

    /// Delete entries of `kind` by ID
    ///
    /// Callers never pass an empty ID list.
    async fn delete(&self, kind: ResourceKind, ids: &[i64]) -> Result<(), crate::Error>;

    /// Add one batch of members
    async fn add(&self, kind: ResourceKind, entry: NewEntry<'_>) -> Result<(), crate::Error>;
}

/// Trait for device client implementations
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Log in and open a fresh session
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DeviceSession>)`: Authenticated session
    /// - `Err(Error::Authentication)`: If the device rejected the credentials
    async fn login(&self) -> Result<Box<dyn DeviceSession>, crate::Error>;

    /// Get the device name (for logging/debugging)
    fn device_name(&self) -> &'static str;
}
