// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators and resolver doubles for attack simulation.

use annotation_guard::resolver::ResolveHost;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of client IP addresses for flood simulation.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Generate a pool of usernames for per-user flood simulation.
pub fn generate_usernames(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("user-{i}")).collect()
}

/// URLs that must never pass the outbound validator, whatever DNS says:
/// wrong scheme, no host, parse failures, IP literals, allowlist
/// lookalikes, and userinfo confusion.
pub fn ssrf_probe_urls() -> Vec<&'static str> {
    vec![
        "",
        "   ",
        "not-a-url",
        "http://api.github.com/repos/org/repo/issues",
        "ftp://api.github.com/",
        "file:///etc/passwd",
        "javascript:alert(1)",
        "data:text/html,<script>",
        "https://",
        "://missing-scheme.com/",
        "https://127.0.0.1/latest/meta-data/",
        "https://169.254.169.254/latest/meta-data/",
        "https://[::1]/admin",
        "https://api.github.com.evil.example/",
        "https://evil-api.github.com/",
        "https://sub.api.github.com/",
        "https://api.github.com@evil.example/",
        "https://metadata.internal/",
    ]
}

/// Addresses that must classify as non-public.
pub fn private_addresses() -> Vec<IpAddr> {
    [
        "127.0.0.1",
        "10.0.0.8",
        "172.16.4.2",
        "192.168.1.50",
        "169.254.169.254",
        "100.64.0.9",
        "0.0.0.0",
        "224.0.0.1",
        "240.0.0.1",
        "::1",
        "fd00::1",
        "fe80::1",
        "::ffff:10.0.0.1",
    ]
    .iter()
    .map(|a| a.parse().unwrap())
    .collect()
}

/// Addresses that must classify as public.
pub fn public_addresses() -> Vec<IpAddr> {
    ["140.82.114.6", "203.0.113.5", "8.8.8.8", "2606:4700::6810:84e5"]
        .iter()
        .map(|a| a.parse().unwrap())
        .collect()
}

/// Resolver double answering from a fixed host-to-addresses map;
/// unknown hosts fail like NXDOMAIN.
pub struct MapResolver {
    answers: HashMap<String, Vec<IpAddr>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
        }
    }

    pub fn with(mut self, host: &str, addrs: &[&str]) -> Self {
        self.answers.insert(
            host.to_lowercase(),
            addrs.iter().map(|a| a.parse().unwrap()).collect(),
        );
        self
    }
}

#[async_trait]
impl ResolveHost for MapResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.answers
            .get(&host.to_lowercase())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such host: {host}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ips_are_unique() {
        let ips = generate_ips(256);
        assert_eq!(ips.len(), 256);
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 256);
    }

    #[tokio::test]
    async fn map_resolver_answers_and_fails() {
        let resolver = MapResolver::new().with("api.github.com", &["140.82.114.6"]);
        assert_eq!(resolver.resolve("API.GITHUB.COM").await.unwrap().len(), 1);
        assert!(resolver.resolve("other.example").await.is_err());
    }
}
