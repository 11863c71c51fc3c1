use std::net::SocketAddr;

// ── Resolver metrics ────────────────────────────────────────────

/// Counter: bookings committed through the resolver.
pub const BOOKINGS_CREATED_TOTAL: &str = "lodged_bookings_created_total";

/// Counter: writes aborted because the interval was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "lodged_booking_conflicts_total";

/// Counter: owner-initiated cancellations.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "lodged_bookings_cancelled_total";

// ── Scheduler metrics ───────────────────────────────────────────

/// Counter: pre-arrival notifications handed to the publisher.
pub const NOTIFICATIONS_PUBLISHED_TOTAL: &str = "lodged_notifications_published_total";

/// Counter: per-booking publish failures (logged and skipped).
pub const NOTIFICATION_FAILURES_TOTAL: &str = "lodged_notification_failures_total";

/// Counter: bookings purged past the retention window.
pub const BOOKINGS_EVICTED_TOTAL: &str = "lodged_bookings_evicted_total";

/// Histogram: full tick duration (both sub-tasks joined) in seconds.
pub const TICK_DURATION_SECONDS: &str = "lodged_tick_duration_seconds";

/// Install the Prometheus exporter on the given port, or do nothing
/// when no port is configured.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus exporter");
    tracing::info!("serving metrics at http://0.0.0.0:{port}/metrics");
}
