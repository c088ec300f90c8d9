// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Feature request forwarding to the issue tracker.
//!
//! Accepted feature requests become issues on the configured GitHub
//! repository. The outbound guard is consulted immediately before every
//! send, so the destination is re-resolved at call time rather than
//! trusted from an earlier check.

use crate::config::UpstreamConfig;
use crate::outbound::{OutboundGuard, OutboundRejection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Reasons a forwarding attempt did not produce an issue.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Issue tracker is not configured (repository or token missing)")]
    NotConfigured,

    #[error("Outbound destination rejected: {0}")]
    Rejected(#[from] OutboundRejection),

    #[error("Issue tracker request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Issue tracker returned status {status}")]
    UpstreamStatus { status: u16 },
}

#[derive(Debug, Serialize)]
struct IssuePayload<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct IssueCreated {
    html_url: String,
}

/// Client that files feature requests as issues.
pub struct IssueForwarder {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl IssueForwarder {
    pub fn new(config: UpstreamConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("annotation-guard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn issue_endpoint(&self) -> Option<String> {
        self.config.repo.as_ref().map(|repo| {
            format!(
                "{}/repos/{}/issues",
                self.config.api_base.trim_end_matches('/'),
                repo
            )
        })
    }

    /// File `title`/`body` as a new issue, returning its URL.
    pub async fn submit(
        &self,
        guard: &OutboundGuard,
        title: &str,
        body: &str,
    ) -> Result<String, ForwardError> {
        let token = self
            .config
            .token
            .as_deref()
            .ok_or(ForwardError::NotConfigured)?;
        let endpoint = self.issue_endpoint().ok_or(ForwardError::NotConfigured)?;

        if let Err(rejection) = guard.check(&endpoint).await {
            warn!(endpoint = %endpoint, reason = %rejection, "Refusing outbound issue request");
            return Err(ForwardError::Rejected(rejection));
        }

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .json(&IssuePayload { title, body })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = %endpoint, status = status.as_u16(), "Issue tracker rejected submission");
            return Err(ForwardError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let created: IssueCreated = response.json().await?;
        info!(issue_url = %created.html_url, "Feature request filed");
        Ok(created.html_url)
    }
}
