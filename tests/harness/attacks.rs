// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Flood patterns for exercising the fixed-window rate limiter.

use annotation_guard::config::RateRule;

/// Flood pattern configuration.
#[derive(Debug, Clone)]
pub struct FloodConfig {
    /// Total number of requests to send
    pub total_requests: usize,
    /// Number of distinct principals (users or IPs) issuing them
    pub unique_principals: usize,
    /// Action name the requests target
    pub action: &'static str,
    /// Rate rule in force
    pub rule: RateRule,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            unique_principals: 1,
            action: "report",
            rule: RateRule {
                window_secs: 60,
                max_requests: 5,
            },
        }
    }
}

impl FloodConfig {
    /// One user hammering an endpoint.
    pub fn single_principal_flood() -> Self {
        Self {
            total_requests: 200,
            unique_principals: 1,
            ..Default::default()
        }
    }

    /// Many principals, moderate volume each.
    pub fn distributed_flood() -> Self {
        Self {
            total_requests: 500,
            unique_principals: 50,
            ..Default::default()
        }
    }

    /// Every request arrives under a fresh principal, the worst case
    /// for per-key limiting.
    pub fn principal_rotation() -> Self {
        Self {
            total_requests: 100,
            unique_principals: 100,
            ..Default::default()
        }
    }

    /// Admissions the limiter should grant within one window: each
    /// principal is capped at the rule maximum.
    pub fn expected_allowed(&self) -> usize {
        let per_principal = self.total_requests / self.unique_principals.max(1);
        self.unique_principals * per_principal.min(self.rule.max_requests as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_allowed_caps_per_principal() {
        let flood = FloodConfig::single_principal_flood();
        assert_eq!(flood.expected_allowed(), 5);

        let distributed = FloodConfig::distributed_flood();
        assert_eq!(distributed.expected_allowed(), 50 * 5);

        let rotation = FloodConfig::principal_rotation();
        assert_eq!(rotation.expected_allowed(), 100);
    }
}
