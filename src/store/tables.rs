use std::collections::HashMap;

use ulid::Ulid;

use crate::model::*;

use super::codec;
use super::{Dimension, EntryFilter, GridSnapshot, StoreError};

/// Key of the three booking uniqueness indexes: (dimension id, day, period id).
type SlotKey = (Ulid, Day, Ulid);

/// Inverse of one applied event, replayed on rollback.
#[derive(Debug)]
pub(super) enum Undo {
    Teacher(Ulid, Option<Teacher>),
    Grade(Ulid, Option<Grade>),
    Section(Ulid, Option<Section>),
    Room(Ulid, Option<Room>),
    Period(Ulid, Option<Period>),
    Entry(Ulid, Option<ScheduleEntry>),
}

/// All records of one school plus the booking uniqueness indexes.
#[derive(Debug, Default)]
pub(super) struct Tables {
    pub teachers: HashMap<Ulid, Teacher>,
    pub grades: HashMap<Ulid, Grade>,
    pub sections: HashMap<Ulid, Section>,
    pub rooms: HashMap<Ulid, Room>,
    pub periods: HashMap<Ulid, Period>,
    pub entries: HashMap<Ulid, ScheduleEntry>,
    teacher_slots: HashMap<SlotKey, Ulid>,
    room_slots: HashMap<SlotKey, Ulid>,
    section_slots: HashMap<SlotKey, Ulid>,
}

impl Tables {
    // ── Event application ────────────────────────────────────

    /// Apply an event and return its inverse. Constraints are checked by the
    /// transaction before it records the event, not here.
    pub fn apply(&mut self, event: &Event) -> Result<Undo, StoreError> {
        Ok(match event {
            Event::TeacherSaved { id, .. } => {
                let teacher = codec::teacher_from_event(event)?;
                Undo::Teacher(*id, self.teachers.insert(*id, teacher))
            }
            Event::TeacherDeleted { id } => Undo::Teacher(*id, self.teachers.remove(id)),
            Event::GradeSaved(g) => Undo::Grade(g.id, self.grades.insert(g.id, g.clone())),
            Event::GradeDeleted { id } => Undo::Grade(*id, self.grades.remove(id)),
            Event::SectionSaved(s) => Undo::Section(s.id, self.sections.insert(s.id, s.clone())),
            Event::SectionDeleted { id } => Undo::Section(*id, self.sections.remove(id)),
            Event::RoomSaved(r) => Undo::Room(r.id, self.rooms.insert(r.id, r.clone())),
            Event::RoomDeleted { id } => Undo::Room(*id, self.rooms.remove(id)),
            Event::PeriodSaved(p) => Undo::Period(p.id, self.periods.insert(p.id, p.clone())),
            Event::PeriodDeleted { id } => Undo::Period(*id, self.periods.remove(id)),
            Event::EntryCreated(e) | Event::EntryUpdated(e) => {
                Undo::Entry(e.id, self.set_entry(e.id, Some(e.clone())))
            }
            Event::EntryDeleted { id } => Undo::Entry(*id, self.set_entry(*id, None)),
        })
    }

    pub fn revert(&mut self, undo: Undo) {
        fn restore<T>(map: &mut HashMap<Ulid, T>, id: Ulid, prev: Option<T>) {
            match prev {
                Some(v) => {
                    map.insert(id, v);
                }
                None => {
                    map.remove(&id);
                }
            }
        }
        match undo {
            Undo::Teacher(id, prev) => restore(&mut self.teachers, id, prev),
            Undo::Grade(id, prev) => restore(&mut self.grades, id, prev),
            Undo::Section(id, prev) => restore(&mut self.sections, id, prev),
            Undo::Room(id, prev) => restore(&mut self.rooms, id, prev),
            Undo::Period(id, prev) => restore(&mut self.periods, id, prev),
            Undo::Entry(id, prev) => {
                self.set_entry(id, prev);
            }
        }
    }

    /// Replace (or remove) an entry, keeping the slot indexes in step.
    fn set_entry(&mut self, id: Ulid, entry: Option<ScheduleEntry>) -> Option<ScheduleEntry> {
        let prev = self.entries.remove(&id);
        if let Some(old) = &prev {
            self.teacher_slots.remove(&(old.teacher_id, old.day, old.period_id));
            self.room_slots.remove(&(old.room_id, old.day, old.period_id));
            self.section_slots.remove(&(old.section_id, old.day, old.period_id));
        }
        if let Some(new) = entry {
            self.teacher_slots.insert((new.teacher_id, new.day, new.period_id), id);
            self.room_slots.insert((new.room_id, new.day, new.period_id), id);
            self.section_slots.insert((new.section_id, new.day, new.period_id), id);
            self.entries.insert(id, new);
        }
        prev
    }

    // ── Constraint checks ────────────────────────────────────

    /// The entry occupying `dimension` at (day, period), ignoring `exclude`.
    pub fn booking_at(
        &self,
        dimension: Dimension,
        day: Day,
        period_id: Ulid,
        exclude: Option<Ulid>,
    ) -> Option<&ScheduleEntry> {
        let (index, key) = match dimension {
            Dimension::Teacher(id) => (&self.teacher_slots, (id, day, period_id)),
            Dimension::Room(id) => (&self.room_slots, (id, day, period_id)),
            Dimension::Section(id) => (&self.section_slots, (id, day, period_id)),
        };
        index
            .get(&key)
            .filter(|found| Some(**found) != exclude)
            .and_then(|found| self.entries.get(found))
    }

    /// Foreign keys and the three booking uniqueness constraints.
    pub fn check_entry(&self, entry: &ScheduleEntry) -> Result<(), StoreError> {
        if !self.teachers.contains_key(&entry.teacher_id) {
            return Err(StoreError::MissingRecord { kind: "teacher", id: entry.teacher_id });
        }
        if !self.grades.contains_key(&entry.grade_id) {
            return Err(StoreError::MissingRecord { kind: "grade", id: entry.grade_id });
        }
        if !self.sections.contains_key(&entry.section_id) {
            return Err(StoreError::MissingRecord { kind: "section", id: entry.section_id });
        }
        if !self.periods.contains_key(&entry.period_id) {
            return Err(StoreError::MissingRecord { kind: "period", id: entry.period_id });
        }
        if !self.rooms.contains_key(&entry.room_id) {
            return Err(StoreError::MissingRecord { kind: "room", id: entry.room_id });
        }

        let checks = [
            (Dimension::Teacher(entry.teacher_id), "teacher_day_period"),
            (Dimension::Room(entry.room_id), "room_day_period"),
            (Dimension::Section(entry.section_id), "section_day_period"),
        ];
        for (dimension, constraint) in checks {
            if let Some(existing) =
                self.booking_at(dimension, entry.day, entry.period_id, Some(entry.id))
            {
                return Err(StoreError::UniqueViolation { constraint, existing: existing.id });
            }
        }
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────

    /// Resolve the display fields of an entry. `None` if a reference dangles.
    pub fn view(&self, entry: &ScheduleEntry) -> Option<EntryView> {
        let teacher = self.teachers.get(&entry.teacher_id)?;
        let grade = self.grades.get(&entry.grade_id)?;
        let section = self.sections.get(&entry.section_id)?;
        let room = self.rooms.get(&entry.room_id)?;
        let period = self.periods.get(&entry.period_id)?;
        Some(EntryView {
            entry: entry.clone(),
            teacher_name: teacher.name.clone(),
            grade_name: grade.name.clone(),
            section_name: section.name.clone(),
            room_name: room.name.clone(),
            period_number: period.number,
        })
    }

    pub fn list(&self, filter: &EntryFilter) -> Vec<EntryView> {
        let mut views: Vec<EntryView> = self
            .entries
            .values()
            .filter(|e| filter.matches(e))
            .filter_map(|e| self.view(e))
            .collect();
        views.sort_by_key(|v| (v.entry.day, v.period_number, v.entry.id));
        views
    }

    pub fn snapshot(&self) -> GridSnapshot {
        fn sorted<T: Clone>(map: &HashMap<Ulid, T>) -> Vec<T> {
            let mut ids: Vec<&Ulid> = map.keys().collect();
            ids.sort();
            ids.into_iter().map(|id| map[id].clone()).collect()
        }
        let mut periods = sorted(&self.periods);
        periods.sort_by_key(|p| p.number);
        GridSnapshot {
            teachers: sorted(&self.teachers),
            grades: sorted(&self.grades),
            sections: sorted(&self.sections),
            rooms: sorted(&self.rooms),
            periods,
            entries: sorted(&self.entries),
        }
    }

    /// Minimal event set that recreates the current state, parents first.
    pub fn to_events(&self) -> Vec<Event> {
        let snap = self.snapshot();
        let mut events = Vec::new();
        events.extend(snap.grades.into_iter().map(Event::GradeSaved));
        events.extend(snap.sections.into_iter().map(Event::SectionSaved));
        events.extend(snap.teachers.iter().map(codec::teacher_event));
        events.extend(snap.rooms.into_iter().map(Event::RoomSaved));
        events.extend(snap.periods.into_iter().map(Event::PeriodSaved));
        events.extend(snap.entries.into_iter().map(Event::EntryCreated));
        events
    }
}
