// # iKuai Device Client
//
// This crate talks to the iKuai router web API on behalf of the sync engine.
//
// ## Protocol
//
// - Login: `POST {addr}/Action/login`, the session is returned as a cookie
// - Calls: `POST {addr}/Action/call` with `{"func_name", "action", "param"}`
// - Every response carries a numeric `Result`: `10000` means a successful
//   login, `30000` a successful call. Anything else is an error and the
//   router's `ErrMsg` is passed through.
//
// ## Trust Level: Untrusted (Device)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS calls to the configured router only
// - ✅ Parse router-specific responses
//
// **Forbidden Capabilities**:
// - ❌ Retry failed calls (a failed call fails the run)
// - ❌ Choose which entries to delete (owned by SyncEngine)
// - ❌ Split or merge batches (owned by SyncEngine)
//
// ## Security Requirements
//
// - The password NEVER appears in logs or Debug output
// - A fresh cookie jar is used per login, sessions are never shared

use async_trait::async_trait;
use base64::Engine as _;
use ikuai_sync_core::config::{DeviceConfig, HttpConfig};
use ikuai_sync_core::traits::{DeviceClient, DeviceSession, NewEntry, RemoteEntry};
use ikuai_sync_core::{Error, ResourceKind, Result};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::Duration;

/// Login endpoint, relative to the router address
const LOGIN_PATH: &str = "/Action/login";

/// Call endpoint, relative to the router address
const CALL_PATH: &str = "/Action/call";

/// `Result` of a successful login
pub const LOGIN_SUCCESS: i64 = 10000;

/// `Result` of a successful call
pub const CALL_SUCCESS: i64 = 30000;

/// Prefix mixed into the base64 form of the password
const PASS_SALT: &str = "salt_11";

/// iKuai router client
///
/// Holds connection settings only. Each [`DeviceClient::login`] builds a new
/// HTTP client with its own cookie jar, so concurrent runs never share a
/// session.
pub struct IkuaiClient {
    /// Router base URL without trailing slash
    addr: String,

    /// Login user
    username: String,

    /// Login password
    /// ⚠️ NEVER log this value
    password: String,

    /// Overall timeout of each request
    timeout: Duration,

    /// Accept invalid TLS certificates
    insecure_skip_verify: bool,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for IkuaiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IkuaiClient")
            .field("addr", &self.addr)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("timeout", &self.timeout)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .finish()
    }
}

impl IkuaiClient {
    /// Create a client from validated settings
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the address is not an HTTP(S) URL or the
    /// username is empty.
    pub fn new(device: &DeviceConfig, http: &HttpConfig) -> Result<Self> {
        device.validate()?;

        Ok(Self {
            addr: device.addr.trim_end_matches('/').to_string(),
            username: device.username.clone(),
            password: device.password.clone(),
            timeout: http.timeout(),
            insecure_skip_verify: http.insecure_skip_verify,
        })
    }

    /// Router base URL
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.insecure_skip_verify)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
    }
}

/// Body of the login request
///
/// The router expects the password twice: as an MD5 hex digest and as the
/// base64 encoding of the salted plain text.
pub fn login_body(username: &str, password: &str) -> Value {
    json!({
        "username": username,
        "passwd": format!("{:x}", md5::compute(password.as_bytes())),
        "pass": base64::engine::general_purpose::STANDARD
            .encode(format!("{}{}", PASS_SALT, password)),
        "remember_password": "",
    })
}

/// Envelope of every router response
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Result")]
    result: i64,

    #[serde(rename = "ErrMsg", default)]
    err_msg: String,

    #[serde(rename = "Data", default)]
    data: Value,
}

#[async_trait]
impl DeviceClient for IkuaiClient {
    async fn login(&self) -> Result<Box<dyn DeviceSession>> {
        let client = self.http_client()?;
        let url = format!("{}{}", self.addr, LOGIN_PATH);

        tracing::debug!("Logging in to {} as {}", self.addr, self.username);

        let response = client
            .post(&url)
            .json(&login_body(&self.username, &self.password))
            .send()
            .await
            .map_err(|e| Error::http(format!("Login request failed: {}", e)))?;

        let envelope = read_envelope(response).await?;
        if envelope.result != LOGIN_SUCCESS {
            return Err(Error::auth(format!(
                "Login rejected (result {}): {}",
                envelope.result, envelope.err_msg
            )));
        }

        Ok(Box::new(IkuaiSession {
            client,
            call_url: format!("{}{}", self.addr, CALL_PATH),
        }))
    }

    fn device_name(&self) -> &'static str {
        "ikuai"
    }
}

/// An authenticated router session
pub struct IkuaiSession {
    client: reqwest::Client,
    call_url: String,
}

impl IkuaiSession {
    /// Issue one call and check its result code
    async fn call(&self, kind: ResourceKind, action: &str, param: Value) -> Result<Value> {
        let body = json!({
            "func_name": kind.func_name(),
            "action": action,
            "param": param,
        });

        let response = self
            .client
            .post(&self.call_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} {} request failed: {}", kind, action, e)))?;

        let envelope = read_envelope(response).await?;
        if envelope.result != CALL_SUCCESS {
            return Err(Error::device(action, kind, envelope.result, envelope.err_msg));
        }

        Ok(envelope.data)
    }
}

#[async_trait]
impl DeviceSession for IkuaiSession {
    async fn show(&self, kind: ResourceKind) -> Result<Vec<RemoteEntry>> {
        let data = self.call(kind, "show", json!({ "TYPE": "data" })).await?;
        let entries = parse_entries(kind, &data)?;
        tracing::debug!("show {}: {} entries", kind, entries.len());
        Ok(entries)
    }

    async fn delete(&self, kind: ResourceKind, ids: &[i64]) -> Result<()> {
        let id = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        tracing::debug!("del {}: id={}", kind, id);
        self.call(kind, "del", json!({ "id": id })).await?;
        Ok(())
    }

    async fn add(&self, kind: ResourceKind, entry: NewEntry<'_>) -> Result<()> {
        tracing::debug!("add {}: {} members", kind, entry.members.len());
        self.call(kind, "add", add_param(kind, &entry)).await?;
        Ok(())
    }
}

async fn read_envelope(response: reqwest::Response) -> Result<Envelope> {
    let status = response.status();
    if !status.is_success() {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(Error::http(format!("Router returned {}: {}", status, text)));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::http(format!("Failed to read router response: {}", e)))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Parameters of an add call for `kind`
pub fn add_param(kind: ResourceKind, entry: &NewEntry<'_>) -> Value {
    let members = entry.members.join(",");
    match kind {
        ResourceKind::IpGroup => json!({
            "group_name": entry.name,
            "addr_pool": members,
            "comment": entry.comment,
            "type": "1",
            "NewRow": "true",
        }),
        ResourceKind::CustomIsp => json!({
            "name": entry.name,
            "ipgroup": members,
            "comment": entry.comment,
        }),
        ResourceKind::StreamDomain => json!({
            "interface": entry.interfaces.join(","),
            "src_addr": entry.src_addr,
            "domain": members,
            "comment": entry.comment,
            "week": "1234567",
            "time": "00:00-23:59",
            "enabled": "yes",
        }),
    }
}

/// Parse the `Data.data` rows of a show response
///
/// A missing row list means an empty table.
pub fn parse_entries(kind: ResourceKind, data: &Value) -> Result<Vec<RemoteEntry>> {
    let Some(rows) = data.get("data") else {
        return Ok(Vec::new());
    };
    let rows = rows.as_array().ok_or_else(|| invalid_show(kind, "data is not an array"))?;

    rows.iter().map(|row| parse_entry(kind, row)).collect()
}

fn parse_entry(kind: ResourceKind, row: &Value) -> Result<RemoteEntry> {
    let mut fields: Map<String, Value> = row
        .as_object()
        .cloned()
        .ok_or_else(|| invalid_show(kind, "row is not an object"))?;

    // Some firmware versions render IDs as strings
    let id = match fields.remove("id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid_show(kind, "row without integer id"))?;

    let name_key = match kind {
        ResourceKind::IpGroup => "group_name",
        ResourceKind::CustomIsp | ResourceKind::StreamDomain => "name",
    };
    let name = take_string(&mut fields, name_key);
    let comment = take_string(&mut fields, "comment");

    Ok(RemoteEntry {
        id,
        name,
        comment,
        extra: Value::Object(fields),
    })
}

/// A show response the device accepted but that cannot be read
fn invalid_show(kind: ResourceKind, reason: &str) -> Error {
    Error::http(format!("Invalid show response for {}: {}", kind, reason))
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> String {
    match fields.remove(key) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
