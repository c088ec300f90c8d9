// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! DNS resolution seam for the outbound URL validator.
//!
//! Resolution happens at validation time, never from a cached address
//! list, so rebinding a hostname between checks buys an attacker
//! nothing. The trait exists so tests can answer with fixed addresses
//! instead of touching the network.

use async_trait::async_trait;
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// Resolves a hostname to the full set of its current addresses.
#[async_trait]
pub trait ResolveHost: Send + Sync {
    /// Resolve `host` to every address it currently maps to.
    ///
    /// An error or an empty answer must be treated by callers as a
    /// rejection, not retried.
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// System resolver backed by the OS stub resolver, with a hard timeout.
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ResolveHost for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        // Port is required by lookup_host but irrelevant to the answer.
        let lookup = tokio::net::lookup_host((host, 443u16));
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(addrs)) => {
                let addrs: Vec<IpAddr> = addrs.map(|sa| sa.ip()).collect();
                debug!(host = %host, count = addrs.len(), "Resolved host");
                Ok(addrs)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("DNS resolution for {host} timed out"),
            )),
        }
    }
}
