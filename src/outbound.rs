// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Outbound URL validator.
//!
//! Gates every outbound HTTP request the backend makes:
//! - https scheme only
//! - hostname must be exactly present in the allowlist (case-insensitive,
//!   no wildcard or suffix matching)
//! - the hostname is re-resolved at call time and every returned address
//!   must be globally routable
//!
//! Every failure mode rejects; there is no partial trust. A hostname
//! resolving to nine public addresses and one loopback is rejected.

use crate::config::OutboundConfig;
use crate::resolver::ResolveHost;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Reasons an outbound URL is rejected.
#[derive(Debug, Error, Clone)]
pub enum OutboundRejection {
    #[error("URL failed to parse: {url}")]
    UnparseableUrl { url: String },

    #[error("Insecure scheme {scheme:?}: only https is permitted")]
    InsecureScheme { scheme: String },

    #[error("URL has no hostname")]
    MissingHost,

    #[error("Host {host} is not on the outbound allowlist")]
    HostNotAllowed { host: String },

    #[error("DNS resolution failed for {host}")]
    ResolutionFailed { host: String },

    #[error("DNS resolution for {host} returned no addresses")]
    EmptyResolution { host: String },

    #[error("Host {host} resolves to non-public address {addr}")]
    DisallowedAddress { host: String, addr: IpAddr },
}

impl OutboundRejection {
    /// Stable label for metrics.
    pub fn reason_label(&self) -> &'static str {
        match self {
            Self::UnparseableUrl { .. } => "unparseable_url",
            Self::InsecureScheme { .. } => "insecure_scheme",
            Self::MissingHost => "missing_host",
            Self::HostNotAllowed { .. } => "host_not_allowed",
            Self::ResolutionFailed { .. } => "resolution_failed",
            Self::EmptyResolution { .. } => "empty_resolution",
            Self::DisallowedAddress { .. } => "disallowed_address",
        }
    }
}

/// Validator for outbound request destinations.
pub struct OutboundGuard {
    allowed_hosts: HashSet<String>,
    resolver: Arc<dyn ResolveHost>,
}

impl OutboundGuard {
    /// Create a guard from configuration and a resolver.
    pub fn new(config: &OutboundConfig, resolver: Arc<dyn ResolveHost>) -> Self {
        let allowed_hosts = config
            .allowed_hosts
            .iter()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self {
            allowed_hosts,
            resolver,
        }
    }

    /// Check whether `url` is a safe outbound destination.
    ///
    /// The allowlist test runs before resolution: a hostname that is not
    /// allowlisted is rejected without a DNS query.
    pub async fn check(&self, url: &str) -> Result<(), OutboundRejection> {
        let parsed = Url::parse(url).map_err(|_| OutboundRejection::UnparseableUrl {
            url: url.to_string(),
        })?;

        if parsed.scheme() != "https" {
            debug!(url = %url, scheme = %parsed.scheme(), "Rejected non-https scheme");
            return Err(OutboundRejection::InsecureScheme {
                scheme: parsed.scheme().to_string(),
            });
        }

        let host = match parsed.host_str() {
            Some(h) if !h.is_empty() => h.to_lowercase(),
            _ => return Err(OutboundRejection::MissingHost),
        };

        // Exact membership only. "api.github.com.evil.example" must not
        // pass on a suffix match.
        if !self.allowed_hosts.contains(&host) {
            debug!(host = %host, "Host not on outbound allowlist");
            return Err(OutboundRejection::HostNotAllowed { host });
        }

        let addrs = self
            .resolver
            .resolve(&host)
            .await
            .map_err(|e| {
                debug!(host = %host, error = %e, "DNS resolution failed");
                OutboundRejection::ResolutionFailed { host: host.clone() }
            })?;

        if addrs.is_empty() {
            return Err(OutboundRejection::EmptyResolution { host });
        }

        for addr in addrs {
            if !is_public_address(addr) {
                debug!(host = %host, addr = %addr, "Host resolves to non-public address");
                return Err(OutboundRejection::DisallowedAddress { host, addr });
            }
        }

        Ok(())
    }

    /// Boolean form of [`check`](Self::check); fails closed.
    pub async fn is_public_outbound_url(&self, url: &str) -> bool {
        self.check(url).await.is_ok()
    }
}

/// Whether an address is globally routable unicast.
///
/// Non-public means private (including CGNAT shared space), loopback,
/// link-local, multicast, broadcast, reserved, or unspecified, for both
/// address families.
pub fn is_public_address(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => is_public_v6(v6),
    }
}

fn is_public_v4(addr: Ipv4Addr) -> bool {
    let octets = addr.octets();
    !(addr.is_unspecified()
        || addr.is_loopback()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_broadcast()
        || addr.is_multicast()
        // Shared address space / CGNAT, 100.64.0.0/10 (RFC 6598)
        || (octets[0] == 100 && (octets[1] & 0b1100_0000) == 64)
        // Reserved, 240.0.0.0/4 (RFC 1112)
        || (octets[0] & 0xF0) == 240)
}

fn is_public_v6(addr: Ipv6Addr) -> bool {
    // A v4-mapped address is exactly as trustworthy as the v4 it wraps.
    if let Some(v4) = addr.to_ipv4_mapped() {
        return is_public_v4(v4);
    }

    let segments = addr.segments();
    !(addr.is_unspecified()
        || addr.is_loopback()
        || addr.is_multicast()
        // Unique local, fc00::/7 (RFC 4193)
        || (segments[0] & 0xFE00) == 0xFC00
        // Link local, fe80::/10 (RFC 4291)
        || (segments[0] & 0xFFC0) == 0xFE80
        // Deprecated site-local, fec0::/10 (RFC 3879)
        || (segments[0] & 0xFFC0) == 0xFEC0)
}
