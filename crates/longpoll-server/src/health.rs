//! `/health` and `/stats` bodies.

use std::time::Instant;

use longpoll_telemetry::MetricValue;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered clients.
    pub clients: usize,
}

pub fn health_check(start_time: Instant, clients: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        clients,
    }
}

/// Stats response body.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub uptime_secs: u64,
    pub clients: usize,
    pub clients_evicted_total: u64,
    pub metrics: Vec<MetricValue>,
}
