//! Row normalization
//!
//! Fetched lines are validated and rewritten into a canonical form before
//! deduplication. Invalid lines are discarded by returning `None`; they are
//! never reported as errors.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::job::ResourceKind;

/// Maximum total length of a domain name (RFC 1035)
const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single domain label (RFC 1035)
const MAX_LABEL_LEN: usize = 63;

/// Normalize a raw row for the given resource kind
///
/// IP groups and custom ISPs take IPv4 addresses or CIDR ranges, stream
/// domain rules take domain names.
pub fn normalize(kind: ResourceKind, raw: &str) -> Option<String> {
    match kind {
        ResourceKind::CustomIsp | ResourceKind::IpGroup => normalize_ipv4(raw),
        ResourceKind::StreamDomain => normalize_domain(raw),
    }
}

/// Normalize an IPv4 address or IPv4 CIDR range
///
/// ```
/// use ikuai_sync_core::normalize::normalize_ipv4;
///
/// assert_eq!(normalize_ipv4(" 10.0.0.0/8 ").as_deref(), Some("10.0.0.0/8"));
/// assert_eq!(normalize_ipv4("999.1.1.1"), None);
/// ```
pub fn normalize_ipv4(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.contains('/') {
        raw.parse::<Ipv4Net>().ok().map(|net| net.to_string())
    } else {
        raw.parse::<Ipv4Addr>().ok().map(|addr| addr.to_string())
    }
}

/// Normalize a domain name
///
/// The result is lower-cased with a single trailing dot removed. Labels
/// must be alphanumeric or hyphen, must not start or end with a hyphen and
/// at least two labels are required.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let domain = raw.strip_suffix('.').unwrap_or(raw).to_ascii_lowercase();

    if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
        return None;
    }

    let mut labels = 0usize;
    for label in domain.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return None;
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return None;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return None;
        }
        labels += 1;
    }

    if labels < 2 {
        return None;
    }

    Some(domain)
}
