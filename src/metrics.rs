// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the guard service.

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    pub static ref REQUESTS_ALLOWED: IntCounterVec = register_int_counter_vec!(
        "guard_requests_allowed_total",
        "Requests admitted by the rate limiter, by action",
        &["action"]
    )
    .unwrap();
    pub static ref REQUESTS_LIMITED: IntCounterVec = register_int_counter_vec!(
        "guard_requests_limited_total",
        "Requests rejected by the rate limiter, by action",
        &["action"]
    )
    .unwrap();
    pub static ref OUTBOUND_REJECTED: IntCounterVec = register_int_counter_vec!(
        "guard_outbound_rejected_total",
        "Outbound URLs rejected by the validator, by reason",
        &["reason"]
    )
    .unwrap();
    pub static ref UPSTREAM_FAILURES: IntCounter = register_int_counter!(
        "guard_upstream_failures_total",
        "Forwarding attempts that failed at the issue tracker"
    )
    .unwrap();
}

/// Prometheus text exposition endpoint.
pub async fn metrics_handler() -> Response {
    let families = prometheus::gather();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(CONTENT_TYPE, encoder.format_type().to_string())], buf).into_response()
}
