use std::net::SocketAddr;
use std::time::Instant;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total indexer requests answered. Labels: unit, status.
pub const REQUESTS_TOTAL: &str = "calindex_requests_total";

/// Histogram: request handling latency in seconds. Labels: unit.
pub const BUILD_DURATION_SECONDS: &str = "calindex_build_duration_seconds";

/// Counter: envelopes dropped without a response. Labels: unit.
pub const IGNORED_ENVELOPES_TOTAL: &str = "calindex_ignored_envelopes_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: entries held by the month scene.
pub const SCENE_ENTRIES: &str = "calindex_scene_entries";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::warn!("failed to install Prometheus metrics exporter: {e}"),
    }
}

/// Elapsed wall time in milliseconds, rounded to one decimal.
pub fn build_ms(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 10_000.0).round() / 10.0
}

pub fn record_request(unit: &'static str, ok: bool, started: Instant) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(REQUESTS_TOTAL, "unit" => unit, "status" => status).increment(1);
    metrics::histogram!(BUILD_DURATION_SECONDS, "unit" => unit)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_ignored(unit: &'static str) {
    metrics::counter!(IGNORED_ENVELOPES_TOTAL, "unit" => unit).increment(1);
}
