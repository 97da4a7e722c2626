use crate::limits::*;
use crate::model::*;
use crate::store::{Dimension, ScheduleRead, StoreError};

use super::{Engine, EngineError};

/// Look for bookings that collide with `candidate` along all three dimensions.
///
/// The three lookups are independent and run concurrently; the report is
/// built only once all of them are back. Conflicts are listed in teacher,
/// room, section order.
pub(crate) async fn detect_conflicts<R: ScheduleRead + ?Sized>(
    reader: &R,
    candidate: &BookingCandidate,
) -> Result<ConflictReport, StoreError> {
    let BookingCandidate {
        teacher_id,
        section_id,
        room_id,
        period_id,
        day,
        exclude_entry_id,
    } = *candidate;

    let (teacher, room, section) = futures::try_join!(
        reader.find_booking(Dimension::Teacher(teacher_id), day, period_id, exclude_entry_id),
        reader.find_booking(Dimension::Room(room_id), day, period_id, exclude_entry_id),
        reader.find_booking(Dimension::Section(section_id), day, period_id, exclude_entry_id),
    )?;

    let conflicts = [
        (ConflictKind::Teacher, teacher),
        (ConflictKind::Room, room),
        (ConflictKind::Section, section),
    ]
    .into_iter()
    .filter_map(|(kind, hit)| hit.map(|existing| Conflict::new(kind, existing)))
    .collect();

    Ok(ConflictReport::from_conflicts(conflicts))
}

/// Resolve every referenced id and the section/grade pairing.
/// All failures are collected; nothing stops at the first one.
pub(crate) async fn resolve_references<R: ScheduleRead + ?Sized>(
    reader: &R,
    ids: &ReferenceIds,
) -> Result<ReferenceCheck, StoreError> {
    let (teacher, grade, section, period, room) = futures::try_join!(
        reader.teacher(ids.teacher_id),
        reader.grade(ids.grade_id),
        reader.section(ids.section_id),
        reader.period(ids.period_id),
        reader.room(ids.room_id),
    )?;

    let mut errors = Vec::new();
    if teacher.is_none() {
        errors.push(format!("Teacher {} not found", ids.teacher_id));
    }
    if grade.is_none() {
        errors.push(format!("Grade {} not found", ids.grade_id));
    }
    match &section {
        None => errors.push(format!("Section {} not found", ids.section_id)),
        Some(s) if s.grade_id != ids.grade_id => errors.push(format!(
            "Section {} does not belong to grade {}",
            s.name, ids.grade_id
        )),
        Some(_) => {}
    }
    if period.is_none() {
        errors.push(format!("Period {} not found", ids.period_id));
    }
    if room.is_none() {
        errors.push(format!("Room {} not found", ids.room_id));
    }

    Ok(ReferenceCheck {
        valid: errors.is_empty(),
        errors,
    })
}

pub(crate) fn validate_subject(subject: &str) -> Result<(), EngineError> {
    if subject.trim().is_empty() {
        return Err(EngineError::Validation("subject must not be empty".into()));
    }
    if subject.len() > MAX_SUBJECT_LEN {
        return Err(EngineError::LimitExceeded("subject too long"));
    }
    Ok(())
}

pub(crate) fn record_conflicts(report: &ConflictReport) {
    for conflict in &report.conflicts {
        metrics::counter!(crate::observability::CONFLICTS_TOTAL, "kind" => conflict.kind.as_str())
            .increment(1);
    }
}

impl Engine {
    /// Pure query: conflicts come back as data, never as an error.
    pub async fn check_conflicts(
        &self,
        candidate: &BookingCandidate,
    ) -> Result<ConflictReport, EngineError> {
        Ok(detect_conflicts(self.store.as_ref(), candidate).await?)
    }

    /// Pure query: unresolved references come back as data, never as an error.
    pub async fn validate_references(&self, ids: &ReferenceIds) -> Result<ReferenceCheck, EngineError> {
        Ok(resolve_references(self.store.as_ref(), ids).await?)
    }
}
