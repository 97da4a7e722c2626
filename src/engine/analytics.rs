use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::*;
use crate::store::GridSnapshot;

use super::{Engine, EngineError};

// ── Report types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub day: Day,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherStats {
    pub teacher_id: Ulid,
    pub name: String,
    pub subject: String,
    pub weekly_periods: u32,
    pub scheduled_periods: u32,
    /// 0..=100
    pub utilization_percentage: u32,
    pub remaining_periods: u32,
    /// All five days, in week order.
    pub periods_by_day: Vec<DayCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStats {
    pub room_id: Ulid,
    pub name: String,
    pub room_type: String,
    pub capacity: u32,
    pub scheduled_periods: u32,
    /// Period count × 5: every cell of the week.
    pub available_periods: u32,
    /// 0..=100
    pub utilization_percentage: u32,
    pub remaining_periods: u32,
    pub periods_by_day: Vec<DayCount>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub teachers: usize,
    pub grades: usize,
    pub sections: usize,
    pub rooms: usize,
    pub periods: usize,
    pub entries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodLoad {
    pub period_number: u32,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewStats {
    pub totals: EntityCounts,
    pub entries_by_day: Vec<DayCount>,
    /// Busiest first; ties by period number.
    pub busy_periods: Vec<PeriodLoad>,
    pub average_teacher_utilization: f64,
    pub average_room_utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeTeacher {
    pub id: Ulid,
    pub name: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeRoom {
    pub id: Ulid,
    pub name: String,
    pub room_type: String,
    pub capacity: u32,
}

/// A (day, period) cell with at least one free room and one free teacher
/// who works that day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedSlot {
    pub day: Day,
    pub period_id: Ulid,
    pub period_number: u32,
    pub start: ClockTime,
    pub end: ClockTime,
    pub free_rooms: Vec<FreeRoom>,
    pub free_teachers: Vec<FreeTeacher>,
}

// ── Computation ──────────────────────────────────────────────────

/// `round(scheduled / capacity * 100)`, clamped to 100. Zero capacity reads as 0%.
pub fn utilization_percentage(scheduled: u32, capacity: u32) -> u32 {
    if capacity == 0 {
        return 0;
    }
    let (s, c) = (scheduled as u64, capacity as u64);
    // Round half up in integers: floor(s*100/c + 1/2).
    ((s * 200 + c) / (2 * c)).min(100) as u32
}

fn per_day(counts: &[usize; 5]) -> Vec<DayCount> {
    Day::ALL
        .into_iter()
        .map(|day| DayCount {
            day,
            count: counts[day.index()],
        })
        .collect()
}

fn mean(values: impl ExactSizeIterator<Item = u32>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.map(f64::from).sum::<f64>() / n as f64
}

/// Per-day entry counts keyed by whichever id `key` picks out of an entry.
fn day_counts_by(entries: &[ScheduleEntry], key: impl Fn(&ScheduleEntry) -> Ulid) -> HashMap<Ulid, [usize; 5]> {
    let mut out: HashMap<Ulid, [usize; 5]> = HashMap::new();
    for e in entries {
        out.entry(key(e)).or_default()[e.day.index()] += 1;
    }
    out
}

pub fn teacher_stats(snap: &GridSnapshot) -> Vec<TeacherStats> {
    let counts = day_counts_by(&snap.entries, |e| e.teacher_id);
    let mut stats: Vec<TeacherStats> = snap
        .teachers
        .iter()
        .map(|t| {
            let days = counts.get(&t.id).copied().unwrap_or_default();
            let scheduled = days.iter().sum::<usize>() as u32;
            TeacherStats {
                teacher_id: t.id,
                name: t.name.clone(),
                subject: t.subject.clone(),
                weekly_periods: t.weekly_periods,
                scheduled_periods: scheduled,
                utilization_percentage: utilization_percentage(scheduled, t.weekly_periods),
                remaining_periods: t.weekly_periods.saturating_sub(scheduled),
                periods_by_day: per_day(&days),
            }
        })
        .collect();
    stats.sort_by(|a, b| a.name.cmp(&b.name).then(a.teacher_id.cmp(&b.teacher_id)));
    stats
}

pub fn room_stats(snap: &GridSnapshot) -> Vec<RoomStats> {
    let counts = day_counts_by(&snap.entries, |e| e.room_id);
    let available = (snap.periods.len() * Day::ALL.len()) as u32;
    let mut stats: Vec<RoomStats> = snap
        .rooms
        .iter()
        .map(|r| {
            let days = counts.get(&r.id).copied().unwrap_or_default();
            let scheduled = days.iter().sum::<usize>() as u32;
            RoomStats {
                room_id: r.id,
                name: r.name.clone(),
                room_type: r.room_type.clone(),
                capacity: r.capacity,
                scheduled_periods: scheduled,
                available_periods: available,
                utilization_percentage: utilization_percentage(scheduled, available),
                remaining_periods: available.saturating_sub(scheduled),
                periods_by_day: per_day(&days),
            }
        })
        .collect();
    stats.sort_by(|a, b| a.name.cmp(&b.name).then(a.room_id.cmp(&b.room_id)));
    stats
}

pub fn overview_stats(snap: &GridSnapshot) -> OverviewStats {
    let mut by_day = [0usize; 5];
    for e in &snap.entries {
        by_day[e.day.index()] += 1;
    }

    let numbers: HashMap<Ulid, u32> = snap.periods.iter().map(|p| (p.id, p.number)).collect();
    let mut loads: HashMap<u32, usize> = HashMap::new();
    for e in &snap.entries {
        if let Some(number) = numbers.get(&e.period_id) {
            *loads.entry(*number).or_default() += 1;
        }
    }
    let mut busy_periods: Vec<PeriodLoad> = loads
        .into_iter()
        .map(|(period_number, count)| PeriodLoad { period_number, count })
        .collect();
    busy_periods.sort_by(|a, b| b.count.cmp(&a.count).then(a.period_number.cmp(&b.period_number)));

    let teachers = teacher_stats(snap);
    let rooms = room_stats(snap);

    OverviewStats {
        totals: EntityCounts {
            teachers: snap.teachers.len(),
            grades: snap.grades.len(),
            sections: snap.sections.len(),
            rooms: snap.rooms.len(),
            periods: snap.periods.len(),
            entries: snap.entries.len(),
        },
        entries_by_day: per_day(&by_day),
        busy_periods,
        average_teacher_utilization: mean(teachers.iter().map(|t| t.utilization_percentage)),
        average_room_utilization: mean(rooms.iter().map(|r| r.utilization_percentage)),
    }
}

/// Walk every (day, period) cell of the week and report the ones where a
/// free room and a free, working teacher coexist. Cells with only one side
/// available are left out.
pub fn unused_slots(snap: &GridSnapshot) -> Vec<UnusedSlot> {
    let busy_teachers: HashSet<(Ulid, Day, Ulid)> = snap
        .entries
        .iter()
        .map(|e| (e.teacher_id, e.day, e.period_id))
        .collect();
    let busy_rooms: HashSet<(Ulid, Day, Ulid)> = snap
        .entries
        .iter()
        .map(|e| (e.room_id, e.day, e.period_id))
        .collect();

    let mut rooms: Vec<&Room> = snap.rooms.iter().collect();
    rooms.sort_by(|a, b| a.name.cmp(&b.name));
    let mut teachers: Vec<&Teacher> = snap.teachers.iter().collect();
    teachers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    let mut slots = Vec::new();
    for day in Day::ALL {
        for period in &snap.periods {
            let free_rooms: Vec<FreeRoom> = rooms
                .iter()
                .filter(|r| !busy_rooms.contains(&(r.id, day, period.id)))
                .map(|r| FreeRoom {
                    id: r.id,
                    name: r.name.clone(),
                    room_type: r.room_type.clone(),
                    capacity: r.capacity,
                })
                .collect();
            let free_teachers: Vec<FreeTeacher> = teachers
                .iter()
                .filter(|t| t.work_days.contains(day))
                .filter(|t| !busy_teachers.contains(&(t.id, day, period.id)))
                .map(|t| FreeTeacher {
                    id: t.id,
                    name: t.name.clone(),
                    subject: t.subject.clone(),
                })
                .collect();

            if free_rooms.is_empty() || free_teachers.is_empty() {
                continue;
            }
            slots.push(UnusedSlot {
                day,
                period_id: period.id,
                period_number: period.number,
                start: period.start,
                end: period.end,
                free_rooms,
                free_teachers,
            });
        }
    }
    slots
}

impl Engine {
    pub async fn teacher_stats(&self) -> Result<Vec<TeacherStats>, EngineError> {
        Ok(teacher_stats(&self.store.snapshot().await?))
    }

    pub async fn room_stats(&self) -> Result<Vec<RoomStats>, EngineError> {
        Ok(room_stats(&self.store.snapshot().await?))
    }

    pub async fn overview_stats(&self) -> Result<OverviewStats, EngineError> {
        Ok(overview_stats(&self.store.snapshot().await?))
    }

    pub async fn unused_slots(&self) -> Result<Vec<UnusedSlot>, EngineError> {
        Ok(unused_slots(&self.store.snapshot().await?))
    }
}
