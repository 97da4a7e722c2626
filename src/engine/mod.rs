mod analytics;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use analytics::{
    overview_stats, room_stats, teacher_stats, unused_slots, utilization_percentage, DayCount,
    EntityCounts, FreeRoom, FreeTeacher, OverviewStats, PeriodLoad, RoomStats, TeacherStats,
    UnusedSlot,
};
pub use error::EngineError;
pub use queries::{Timetable, TimetableDay, TimetableSlot};

use std::sync::Arc;
use std::time::Instant;

use crate::store::EntityStore;

/// The booking engine of one school: conflict detection, booking
/// transactions and grid analytics over an [`EntityStore`].
///
/// Stateless apart from the store handle; construct one per store and share
/// it behind an `Arc`.
pub struct Engine {
    store: Arc<dyn EntityStore>,
}

impl Engine {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

/// Record count and latency of a booking operation.
fn observe<T>(op: &'static str, started: Instant, result: &Result<T, EngineError>) {
    let status = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::counter!(crate::observability::BOOKINGS_TOTAL, "op" => op, "status" => status)
        .increment(1);
    metrics::histogram!(crate::observability::OPERATION_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
}
