use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slotgrid::config::Config;
use slotgrid::engine::{OverviewStats, RoomStats, TeacherStats, UnusedSlot};
use slotgrid::tenant::TenantManager;

#[derive(Serialize)]
struct Report {
    school: String,
    overview: OverviewStats,
    teachers: Vec<TeacherStats>,
    rooms: Vec<RoomStats>,
    unused_slots: Vec<UnusedSlot>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    slotgrid::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let tenants = Arc::new(TenantManager::new(
        config.data_dir.clone(),
        config.compact_threshold,
        config.compact_interval,
    ));
    let school = tenants.get_or_create(&config.tenant)?;

    let overview = school.engine.overview_stats().await?;
    info!("slotgrid loaded school {}", config.tenant);
    info!("  data_dir: {}", config.data_dir.display());
    info!(
        "  teachers: {}, rooms: {}, periods: {}, entries: {}",
        overview.totals.teachers, overview.totals.rooms, overview.totals.periods, overview.totals.entries
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    if std::env::args().nth(1).as_deref() == Some("report") {
        let report = Report {
            school: config.tenant.clone(),
            overview,
            teachers: school.engine.teacher_stats().await?,
            rooms: school.engine.room_stats().await?,
            unused_slots: school.engine.unused_slots().await?,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    // Keep the store and its compactor alive until SIGTERM/ctrl-c.
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }

    info!("shutdown signal received, compacting WAL");
    if let Err(e) = school.store.compact().await {
        tracing::warn!("final compaction failed: {e}");
    }
    info!("slotgrid stopped");
    Ok(())
}
