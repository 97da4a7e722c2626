use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::*;
use crate::store::EntryFilter;

use super::{Engine, EngineError};

/// Weekly grid of one section or teacher: every day, every period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timetable {
    pub days: Vec<TimetableDay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableDay {
    pub day: Day,
    /// In period number order.
    pub slots: Vec<TimetableSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableSlot {
    pub period_id: Ulid,
    pub period_number: u32,
    pub start: ClockTime,
    pub end: ClockTime,
    pub entry: Option<EntryView>,
}

impl Timetable {
    pub fn booked(&self) -> usize {
        self.days
            .iter()
            .flat_map(|d| &d.slots)
            .filter(|s| s.entry.is_some())
            .count()
    }
}

fn build_timetable(periods: &[Period], views: Vec<EntryView>) -> Timetable {
    let mut days: Vec<TimetableDay> = Day::ALL
        .into_iter()
        .map(|day| TimetableDay {
            day,
            slots: periods
                .iter()
                .map(|p| TimetableSlot {
                    period_id: p.id,
                    period_number: p.number,
                    start: p.start,
                    end: p.end,
                    entry: None,
                })
                .collect(),
        })
        .collect();

    for view in views {
        let day = &mut days[view.entry.day.index()];
        if let Some(slot) = day.slots.iter_mut().find(|s| s.period_id == view.entry.period_id) {
            slot.entry = Some(view);
        }
    }
    Timetable { days }
}

impl Engine {
    pub async fn get_entry(&self, id: Ulid) -> Result<EntryView, EngineError> {
        self.store.entry_view(id).await?.ok_or(EngineError::NotFound(id))
    }

    pub async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<EntryView>, EngineError> {
        Ok(self.store.list_entries(filter).await?)
    }

    pub async fn section_timetable(&self, section_id: Ulid) -> Result<Timetable, EngineError> {
        if self.store.section(section_id).await?.is_none() {
            return Err(EngineError::ReferenceNotFound(vec![format!(
                "Section {section_id} not found"
            )]));
        }
        let filter = EntryFilter {
            section_id: Some(section_id),
            ..Default::default()
        };
        self.timetable(&filter).await
    }

    pub async fn teacher_timetable(&self, teacher_id: Ulid) -> Result<Timetable, EngineError> {
        if self.store.teacher(teacher_id).await?.is_none() {
            return Err(EngineError::ReferenceNotFound(vec![format!(
                "Teacher {teacher_id} not found"
            )]));
        }
        let filter = EntryFilter {
            teacher_id: Some(teacher_id),
            ..Default::default()
        };
        self.timetable(&filter).await
    }

    async fn timetable(&self, filter: &EntryFilter) -> Result<Timetable, EngineError> {
        let (periods, views) = self.store.grid_entries(filter).await?;
        Ok(build_timetable(&periods, views))
    }
}
