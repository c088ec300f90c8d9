// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Annotation Guard Service
//!
//! Safeguard service for the PDF annotation backend: outbound URL
//! validation (SSRF protection) and fixed-window rate limiting, exposed
//! over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /api/report` — content report intake (rate limited per user)
//! - `POST /api/feature-request` — feature request intake, forwarded to
//!   the configured issue tracker (rate limited per IP)
//! - `POST /check` — allow/deny decision for other backend processes
//! - `GET /health`, `GET /healthz` — liveness
//! - `GET /metrics` — Prometheus exposition (when enabled)
//!
//! ## Configuration
//!
//! Loaded from environment variables:
//!
//! - `BIND_ADDR`: server bind address (default: 0.0.0.0:8080)
//! - `ALLOWED_OUTBOUND_HOSTS`: comma-separated outbound hostname
//!   allowlist (default: api.github.com)
//! - `REPORT_MAX_REQUESTS` / `REPORT_WINDOW_SECS`: report limit (5/60)
//! - `FEATURE_MAX_REQUESTS` / `FEATURE_WINDOW_SECS`: feature limit (3/600)
//! - `UPSTREAM_REPO` / `UPSTREAM_TOKEN`: issue tracker destination
//! - `TRUST_FORWARDED_FOR`: honor X-Forwarded-For from the proxy

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use annotation_guard::{
    config::Config,
    handlers::{check, feature_request, health, report_content, AppState},
    limiter::RateLimiter,
    metrics::metrics_handler,
    outbound::OutboundGuard,
    resolver::SystemResolver,
    upstream::IssueForwarder,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        allowed_hosts = ?config.outbound.allowed_hosts,
        report_max = config.rate_limit.report.max_requests,
        report_window_secs = config.rate_limit.report.window_secs,
        feature_max = config.rate_limit.feature.max_requests,
        feature_window_secs = config.rate_limit.feature.window_secs,
        upstream_configured = config.upstream.is_configured(),
        "Starting annotation guard"
    );

    // Create application state
    let resolver = Arc::new(SystemResolver::new(config.outbound.resolve_timeout()));
    let outbound = Arc::new(OutboundGuard::new(&config.outbound, resolver));
    let limiter = RateLimiter::in_memory();
    let forwarder = IssueForwarder::new(config.upstream.clone())?;

    let state = Arc::new(AppState {
        limiter,
        outbound,
        forwarder,
        config: config.clone(),
    });

    // Spawn cleanup task for expired rate windows
    let cleanup_state = state.clone();
    let cleanup_interval = config.rate_limit.cleanup_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            let dropped = cleanup_state.limiter.cleanup().await;
            if dropped > 0 {
                info!(dropped, "Purged expired rate windows");
            }
        }
    });

    // Build router
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/api/report", post(report_content))
        .route("/api/feature-request", post(feature_request))
        .route("/check", post(check));

    if config.metrics.enabled {
        app = app.route(&config.metrics.path, get(metrics_handler));
    }

    let app = app.layer(TraceLayer::new_for_http()).with_state(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
