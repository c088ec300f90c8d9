// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the annotation guard service.
//!
//! Defaults mirror the annotation backend's production settings: outbound
//! calls are restricted to the issue tracker API host, content reports are
//! capped at 5 per minute per user, and feature requests at 3 per ten
//! minutes per client IP.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the annotation guard service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Trust the leftmost X-Forwarded-For entry for client IPs.
    /// Enable only when a proxy that strips the header sits in front.
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Outbound URL validation configuration
    #[serde(default)]
    pub outbound: OutboundConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Issue tracker forwarding configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Outbound URL validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundConfig {
    /// Hostnames outbound requests may target. Membership is exact and
    /// case-insensitive; no wildcard or suffix matching.
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// DNS resolution timeout in milliseconds (default: 3000)
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,
}

/// A single fixed-window rate rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRule {
    /// Window length in seconds
    pub window_secs: u64,

    /// Maximum admitted requests per key per window
    pub max_requests: u32,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Content report intake: per user, falling back to client IP
    /// (default: 5 per 60s)
    #[serde(default = "default_report_rule")]
    pub report: RateRule,

    /// Feature request intake: per client IP (default: 3 per 600s)
    #[serde(default = "default_feature_rule")]
    pub feature: RateRule,

    /// Interval between stale-window purges in seconds (default: 60)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

/// Issue tracker forwarding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Issue tracker API base (default: https://api.github.com)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Repository slug ("owner/name") feature requests are filed against
    #[serde(default)]
    pub repo: Option<String>,

    /// API token; the forwarder reports itself unconfigured without one
    #[serde(default)]
    pub token: Option<String>,

    /// Outbound request timeout in milliseconds (default: 10000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["api.github.com".to_string()]
}

fn default_resolve_timeout_ms() -> u64 {
    3000
}

fn default_report_rule() -> RateRule {
    RateRule {
        window_secs: 60,
        max_requests: 5,
    }
}

fn default_feature_rule() -> RateRule {
    RateRule {
        window_secs: 600,
        max_requests: 3,
    }
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10000
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            trust_forwarded_for: false,
            outbound: OutboundConfig::default(),
            rate_limit: RateLimitConfig::default(),
            upstream: UpstreamConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: default_allowed_hosts(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            report: default_report_rule(),
            feature: default_feature_rule(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            repo: None,
            token: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl OutboundConfig {
    /// Get the DNS resolution timeout
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

impl RateRule {
    /// Get the window duration
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl UpstreamConfig {
    /// Get the outbound request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Whether both the repository slug and the token are present.
    pub fn is_configured(&self) -> bool {
        self.repo.is_some() && self.token.is_some()
    }
}

impl RateLimitConfig {
    /// Get the stale-window purge interval
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            bind_addr: env_str("BIND_ADDR").unwrap_or(defaults.bind_addr),
            trust_forwarded_for: env_flag("TRUST_FORWARDED_FOR"),
            outbound: OutboundConfig {
                allowed_hosts: env_str("ALLOWED_OUTBOUND_HOSTS")
                    .map(|v| {
                        v.split(',')
                            .map(|h| h.trim().to_string())
                            .filter(|h| !h.is_empty())
                            .collect()
                    })
                    .unwrap_or(defaults.outbound.allowed_hosts),
                resolve_timeout_ms: env_parse("RESOLVE_TIMEOUT_MS")
                    .unwrap_or(defaults.outbound.resolve_timeout_ms),
            },
            rate_limit: RateLimitConfig {
                report: RateRule {
                    window_secs: env_parse("REPORT_WINDOW_SECS")
                        .unwrap_or(defaults.rate_limit.report.window_secs),
                    max_requests: env_parse("REPORT_MAX_REQUESTS")
                        .unwrap_or(defaults.rate_limit.report.max_requests),
                },
                feature: RateRule {
                    window_secs: env_parse("FEATURE_WINDOW_SECS")
                        .unwrap_or(defaults.rate_limit.feature.window_secs),
                    max_requests: env_parse("FEATURE_MAX_REQUESTS")
                        .unwrap_or(defaults.rate_limit.feature.max_requests),
                },
                cleanup_interval_secs: env_parse("CLEANUP_INTERVAL_SECS")
                    .unwrap_or(defaults.rate_limit.cleanup_interval_secs),
            },
            upstream: UpstreamConfig {
                api_base: env_str("UPSTREAM_API_BASE").unwrap_or(defaults.upstream.api_base),
                repo: env_str("UPSTREAM_REPO"),
                token: env_str("UPSTREAM_TOKEN"),
                request_timeout_ms: env_parse("UPSTREAM_TIMEOUT_MS")
                    .unwrap_or(defaults.upstream.request_timeout_ms),
            },
            metrics: MetricsConfig {
                enabled: env_str("METRICS_ENABLED")
                    .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                    .unwrap_or(defaults.metrics.enabled),
                path: env_str("METRICS_PATH").unwrap_or(defaults.metrics.path),
            },
        }
    }
}

fn env_str(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
