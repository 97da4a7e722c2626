use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking operations. Labels: op, status.
pub const BOOKINGS_TOTAL: &str = "slotgrid_bookings_total";

/// Counter: conflicts found while booking. Labels: kind (teacher, room, section).
pub const CONFLICTS_TOTAL: &str = "slotgrid_conflicts_total";

/// Histogram: booking operation latency in seconds. Labels: op.
pub const OPERATION_DURATION_SECONDS: &str = "slotgrid_operation_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: schools with a loaded engine.
pub const TENANTS_ACTIVE: &str = "slotgrid_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotgrid_wal_flush_duration_seconds";

/// Histogram: transactions written per WAL flush.
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotgrid_wal_flush_batch_size";

/// Counter: WAL compactions run.
pub const WAL_COMPACTIONS_TOTAL: &str = "slotgrid_wal_compactions_total";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
