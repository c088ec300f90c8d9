// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the annotation guard service.
//!
//! Two intake endpoints guard the backend's content submissions, and
//! `/check` lets other backend processes consult the safeguards before
//! performing a privileged action of their own.

use crate::config::Config;
use crate::limiter::{action_key, RateLimitOutcome, RateLimiter};
use crate::metrics;
use crate::outbound::OutboundGuard;
use crate::upstream::{ForwardError, IssueForwarder};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Header carrying the authenticated username, set by the auth proxy in
/// front of this service.
const AUTH_USER_HEADER: &str = "x-authenticated-user";

/// Accepted content report kinds.
const REPORT_KINDS: &[&str] = &["annotation", "comment", "document"];

const MAX_ID_LEN: usize = 64;
const MAX_REASON_LEN: usize = 2000;
const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 4000;

/// Shared application state.
pub struct AppState {
    pub limiter: RateLimiter,
    pub outbound: Arc<OutboundGuard>,
    pub forwarder: IssueForwarder,
    pub config: Config,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Content report submission.
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    /// What is being reported: annotation, comment, or document
    pub kind: String,
    /// Identifier of the reported object
    pub id: String,
    /// Why it is being reported
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub status: &'static str,
}

/// Feature request submission.
#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct FeatureResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_url: Option<String>,
}

/// Safeguard decision request (for other backend processes).
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub ip: String,
    #[serde(default)]
    pub actor: Option<String>,
    pub action: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Safeguard decision response.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "annotation-guard",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Content report intake.
///
/// Rate limited per authenticated user, falling back to the client IP
/// for anonymous submissions.
pub async fn report_content(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<ReportRequest>,
) -> Response {
    let ip = client_ip(&state.config, &headers, addr);
    let principal = authenticated_user(&headers).unwrap_or_else(|| ip.to_string());

    if let Err(message) = validate_report(&req) {
        debug!(principal = %principal, error = %message, "Invalid report payload");
        return bad_request("INVALID_REPORT", message);
    }

    let outcome = state
        .limiter
        .check_and_increment(&action_key("report", &principal), &state.config.rate_limit.report)
        .await;

    match outcome {
        RateLimitOutcome::RateLimited { retry_after } => {
            metrics::REQUESTS_LIMITED.with_label_values(&["report"]).inc();
            info!(principal = %principal, "Report rate limited");
            rate_limited(retry_after.as_secs())
        }
        RateLimitOutcome::Allowed { remaining, .. } => {
            metrics::REQUESTS_ALLOWED.with_label_values(&["report"]).inc();
            info!(
                principal = %principal,
                kind = %req.kind,
                id = %req.id,
                remaining,
                "Content report accepted"
            );
            (StatusCode::OK, Json(ReportResponse { status: "accepted" })).into_response()
        }
    }
}

/// Feature request intake.
///
/// Rate limited per client IP; the limit is consumed even when the
/// upstream tracker is unconfigured, so repeated probing of a dormant
/// deployment still hits 429.
pub async fn feature_request(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<FeatureRequest>,
) -> Response {
    let ip = client_ip(&state.config, &headers, addr);

    if let Err(message) = validate_feature(&req) {
        debug!(ip = %ip, error = %message, "Invalid feature request payload");
        return bad_request("INVALID_FEATURE_REQUEST", message);
    }

    let outcome = state
        .limiter
        .check_and_increment(
            &action_key("feature", &ip.to_string()),
            &state.config.rate_limit.feature,
        )
        .await;

    if let RateLimitOutcome::RateLimited { retry_after } = outcome {
        metrics::REQUESTS_LIMITED.with_label_values(&["feature"]).inc();
        info!(ip = %ip, "Feature request rate limited");
        return rate_limited(retry_after.as_secs());
    }
    metrics::REQUESTS_ALLOWED.with_label_values(&["feature"]).inc();

    match state
        .forwarder
        .submit(&state.outbound, &req.title, &req.description)
        .await
    {
        Ok(issue_url) => (
            StatusCode::OK,
            Json(FeatureResponse {
                status: "submitted",
                issue_url: Some(issue_url),
            }),
        )
            .into_response(),
        Err(err @ ForwardError::NotConfigured) => {
            info!(ip = %ip, "Feature request accepted but tracker is not configured");
            service_unavailable("UPSTREAM_NOT_CONFIGURED", err.to_string())
        }
        Err(ForwardError::Rejected(rejection)) => {
            metrics::OUTBOUND_REJECTED
                .with_label_values(&[rejection.reason_label()])
                .inc();
            warn!(ip = %ip, reason = %rejection, "Outbound destination rejected");
            service_unavailable("OUTBOUND_REJECTED", rejection.to_string())
        }
        Err(err) => {
            metrics::UPSTREAM_FAILURES.inc();
            warn!(ip = %ip, error = %err, "Issue tracker submission failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: err.to_string(),
                    code: "UPSTREAM_ERROR",
                    retry_after_secs: None,
                }),
            )
                .into_response()
        }
    }
}

/// Safeguard decision endpoint.
///
/// Always answers 200 with a decision body so the caller can read it,
/// mirroring how a fronting proxy consumes external auth responses.
pub async fn check(State(state): State<Arc<AppState>>, Json(req): Json<CheckRequest>) -> Response {
    let ip: IpAddr = match req.ip.parse() {
        Ok(ip) => ip,
        Err(_) => {
            warn!(ip = %req.ip, "Invalid IP address format");
            return (
                StatusCode::BAD_REQUEST,
                Json(CheckResponse {
                    allowed: false,
                    reason: Some("Invalid IP address format".to_string()),
                    retry_after_secs: None,
                    remaining: None,
                }),
            )
                .into_response();
        }
    };

    let rule = match req.action.as_str() {
        "report" => &state.config.rate_limit.report,
        "feature" => &state.config.rate_limit.feature,
        other => {
            debug!(action = %other, "Unknown action in check request");
            return decision(CheckResponse {
                allowed: false,
                reason: Some(format!("Unknown action: {other}")),
                retry_after_secs: None,
                remaining: None,
            });
        }
    };

    // Outbound validation first, so a hostile URL is reported as such
    // rather than burning rate budget.
    if let Some(url) = req.url.as_deref() {
        if let Err(rejection) = state.outbound.check(url).await {
            metrics::OUTBOUND_REJECTED
                .with_label_values(&[rejection.reason_label()])
                .inc();
            info!(ip = %ip, url = %url, reason = %rejection, "Outbound URL rejected");
            return decision(CheckResponse {
                allowed: false,
                reason: Some(rejection.to_string()),
                retry_after_secs: None,
                remaining: None,
            });
        }
    }

    let principal = req.actor.clone().unwrap_or_else(|| ip.to_string());
    let outcome = state
        .limiter
        .check_and_increment(&action_key(&req.action, &principal), rule)
        .await;

    match outcome {
        RateLimitOutcome::Allowed { remaining, .. } => {
            metrics::REQUESTS_ALLOWED
                .with_label_values(&[req.action.as_str()])
                .inc();
            debug!(ip = %ip, action = %req.action, remaining, "Check allowed");
            decision(CheckResponse {
                allowed: true,
                reason: None,
                retry_after_secs: None,
                remaining: Some(remaining),
            })
        }
        RateLimitOutcome::RateLimited { retry_after } => {
            metrics::REQUESTS_LIMITED
                .with_label_values(&[req.action.as_str()])
                .inc();
            info!(ip = %ip, action = %req.action, "Check rate limited");
            decision(CheckResponse {
                allowed: false,
                reason: Some("Rate limit exceeded".to_string()),
                retry_after_secs: Some(retry_after.as_secs()),
                remaining: None,
            })
        }
    }
}

fn validate_report(req: &ReportRequest) -> Result<(), String> {
    if !REPORT_KINDS.contains(&req.kind.as_str()) {
        return Err(format!("Unknown report kind: {}", req.kind));
    }
    let id = req.id.trim();
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err("Report id must be non-empty and at most 64 characters".to_string());
    }
    let reason = req.reason.trim();
    if reason.is_empty() || reason.len() > MAX_REASON_LEN {
        return Err("Report reason must be non-empty and at most 2000 characters".to_string());
    }
    Ok(())
}

fn validate_feature(req: &FeatureRequest) -> Result<(), String> {
    let title = req.title.trim();
    if title.is_empty() || title.len() > MAX_TITLE_LEN {
        return Err("Title must be non-empty and at most 200 characters".to_string());
    }
    let description = req.description.trim();
    if description.is_empty() || description.len() > MAX_DESCRIPTION_LEN {
        return Err("Description must be non-empty and at most 4000 characters".to_string());
    }
    Ok(())
}

/// Authenticated username from the auth proxy, if present and sane.
fn authenticated_user(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTH_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Client IP: leftmost X-Forwarded-For entry when the fronting proxy is
/// trusted, otherwise the socket peer.
fn client_ip(config: &Config, headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    if config.trust_forwarded_for {
        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok())
        {
            return ip;
        }
    }
    peer.ip()
}

fn decision(body: CheckResponse) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

fn bad_request(code: &'static str, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message,
            code,
            retry_after_secs: None,
        }),
    )
        .into_response()
}

fn service_unavailable(code: &'static str, message: String) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: message,
            code,
            retry_after_secs: None,
        }),
    )
        .into_response()
}

fn rate_limited(retry_after_secs: u64) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after_secs.to_string())],
        Json(ErrorResponse {
            error: "Rate limit exceeded".to_string(),
            code: "RATE_LIMITED",
            retry_after_secs: Some(retry_after_secs),
        }),
    )
        .into_response()
}
