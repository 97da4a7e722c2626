use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

// ── Week ─────────────────────────────────────────────────────────

/// A working day of the fixed five-day school week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
}

impl Day {
    /// All day tokens in week order.
    pub const ALL: [Day; 5] = [
        Day::Sunday,
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Sunday => "sunday",
            Day::Monday => "monday",
            Day::Tuesday => "tuesday",
            Day::Wednesday => "wednesday",
            Day::Thursday => "thursday",
        }
    }

    /// Position within the week, 0 for sunday.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDay(pub String);

impl fmt::Display for InvalidDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid day '{}': expected one of sunday, monday, tuesday, wednesday, thursday",
            self.0
        )
    }
}

impl std::error::Error for InvalidDay {}

impl FromStr for Day {
    type Err = InvalidDay;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Day::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| InvalidDay(s.to_string()))
    }
}

/// Set of days a teacher works, as a bitmask over [`Day::ALL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Day>", into = "Vec<Day>")]
pub struct DaySet(u8);

impl DaySet {
    pub const fn empty() -> Self {
        DaySet(0)
    }

    pub const fn full_week() -> Self {
        DaySet(0b1_1111)
    }

    pub fn insert(&mut self, day: Day) {
        self.0 |= 1 << day.index();
    }

    pub fn contains(&self, day: Day) -> bool {
        self.0 & (1 << day.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Days in week order.
    pub fn iter(&self) -> impl Iterator<Item = Day> + '_ {
        Day::ALL.into_iter().filter(|d| self.contains(*d))
    }
}

impl FromIterator<Day> for DaySet {
    fn from_iter<I: IntoIterator<Item = Day>>(iter: I) -> Self {
        let mut set = DaySet::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl From<Vec<Day>> for DaySet {
    fn from(days: Vec<Day>) -> Self {
        days.into_iter().collect()
    }
}

impl From<DaySet> for Vec<Day> {
    fn from(set: DaySet) -> Self {
        set.iter().collect()
    }
}

/// Wall-clock time of day, minute precision. Written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(ClockTime(hour as u16 * 60 + minute as u16))
        } else {
            None
        }
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for ClockTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid time '{s}': expected HH:MM"))?;
        let hour: u8 = h.parse().map_err(|_| format!("invalid hour in '{s}'"))?;
        let minute: u8 = m.parse().map_err(|_| format!("invalid minute in '{s}'"))?;
        ClockTime::new(hour, minute).ok_or_else(|| format!("time out of range: '{s}'"))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ClockTime> for String {
    fn from(t: ClockTime) -> Self {
        t.to_string()
    }
}

// ── Entities ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: Ulid,
    pub name: String,
    pub subject: String,
    /// Target number of periods per week.
    pub weekly_periods: u32,
    pub work_days: DaySet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub id: Ulid,
    pub name: String,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: Ulid,
    pub name: String,
    pub grade_id: Ulid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub name: String,
    pub capacity: u32,
    pub room_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: Ulid,
    pub number: u32,
    pub start: ClockTime,
    pub end: ClockTime,
}

impl Period {
    /// Half-open `[start, end)` overlap.
    pub fn overlaps(&self, other: &Period) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A committed booking of one teacher, section and room into one (day, period) cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: Ulid,
    pub day: Day,
    pub subject: String,
    pub teacher_id: Ulid,
    pub grade_id: Ulid,
    pub section_id: Ulid,
    pub period_id: Ulid,
    pub room_id: Ulid,
}

/// An entry together with the display fields of everything it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryView {
    pub entry: ScheduleEntry,
    pub teacher_name: String,
    pub grade_name: String,
    pub section_name: String,
    pub room_name: String,
    pub period_number: u32,
}

impl EntryView {
    /// "Grade 7 - A" style label of the booked section.
    pub fn class_label(&self) -> String {
        format!("{} - {}", self.grade_name, self.section_name)
    }
}

// ── Booking inputs ───────────────────────────────────────────────

/// A proposed booking, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub day: Day,
    pub subject: String,
    pub teacher_id: Ulid,
    pub grade_id: Ulid,
    pub section_id: Ulid,
    pub period_id: Ulid,
    pub room_id: Ulid,
}

impl NewEntry {
    pub fn references(&self) -> ReferenceIds {
        ReferenceIds {
            teacher_id: self.teacher_id,
            grade_id: self.grade_id,
            section_id: self.section_id,
            period_id: self.period_id,
            room_id: self.room_id,
        }
    }

    pub fn candidate(&self) -> BookingCandidate {
        BookingCandidate {
            teacher_id: self.teacher_id,
            section_id: self.section_id,
            room_id: self.room_id,
            period_id: self.period_id,
            day: self.day,
            exclude_entry_id: None,
        }
    }

    pub fn into_entry(self, id: Ulid) -> ScheduleEntry {
        ScheduleEntry {
            id,
            day: self.day,
            subject: self.subject,
            teacher_id: self.teacher_id,
            grade_id: self.grade_id,
            section_id: self.section_id,
            period_id: self.period_id,
            room_id: self.room_id,
        }
    }
}

/// Partial update of an entry. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPatch {
    pub day: Option<Day>,
    pub subject: Option<String>,
    pub teacher_id: Option<Ulid>,
    pub grade_id: Option<Ulid>,
    pub section_id: Option<Ulid>,
    pub period_id: Option<Ulid>,
    pub room_id: Option<Ulid>,
}

impl EntryPatch {
    /// Overlay the patch onto an existing entry, keeping its id.
    pub fn apply_to(&self, existing: &ScheduleEntry) -> ScheduleEntry {
        ScheduleEntry {
            id: existing.id,
            day: self.day.unwrap_or(existing.day),
            subject: self.subject.clone().unwrap_or_else(|| existing.subject.clone()),
            teacher_id: self.teacher_id.unwrap_or(existing.teacher_id),
            grade_id: self.grade_id.unwrap_or(existing.grade_id),
            section_id: self.section_id.unwrap_or(existing.section_id),
            period_id: self.period_id.unwrap_or(existing.period_id),
            room_id: self.room_id.unwrap_or(existing.room_id),
        }
    }
}

/// The three ids and the cell a conflict check looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCandidate {
    pub teacher_id: Ulid,
    pub section_id: Ulid,
    pub room_id: Ulid,
    pub period_id: Ulid,
    pub day: Day,
    /// Entry ignored by the check (the entry being updated).
    pub exclude_entry_id: Option<Ulid>,
}

impl BookingCandidate {
    pub fn for_entry(entry: &ScheduleEntry) -> Self {
        Self {
            teacher_id: entry.teacher_id,
            section_id: entry.section_id,
            room_id: entry.room_id,
            period_id: entry.period_id,
            day: entry.day,
            exclude_entry_id: Some(entry.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceIds {
    pub teacher_id: Ulid,
    pub grade_id: Ulid,
    pub section_id: Ulid,
    pub period_id: Ulid,
    pub room_id: Ulid,
}

impl From<&ScheduleEntry> for ReferenceIds {
    fn from(e: &ScheduleEntry) -> Self {
        Self {
            teacher_id: e.teacher_id,
            grade_id: e.grade_id,
            section_id: e.section_id,
            period_id: e.period_id,
            room_id: e.room_id,
        }
    }
}

// ── Check results ────────────────────────────────────────────────

/// Which booking dimension collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Teacher,
    Room,
    Section,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::Teacher => "teacher",
            ConflictKind::Room => "room",
            ConflictKind::Section => "section",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub message: String,
    /// The already-committed entry that occupies the cell.
    pub existing: EntryView,
}

impl Conflict {
    pub fn new(kind: ConflictKind, existing: EntryView) -> Self {
        let day = existing.entry.day;
        let period = existing.period_number;
        let message = match kind {
            ConflictKind::Teacher => format!(
                "Teacher {} is already scheduled on {day} period {period} with {}",
                existing.teacher_name,
                existing.class_label()
            ),
            ConflictKind::Room => format!(
                "Room {} is already booked on {day} period {period} by {}",
                existing.room_name,
                existing.class_label()
            ),
            ConflictKind::Section => format!(
                "{} already has a class on {day} period {period} with {}",
                existing.class_label(),
                existing.teacher_name
            ),
        };
        Self { kind, message, existing }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub has_conflict: bool,
    /// In teacher, room, section order.
    pub conflicts: Vec<Conflict>,
}

impl ConflictReport {
    pub fn from_conflicts(conflicts: Vec<Conflict>) -> Self {
        Self {
            has_conflict: !conflicts.is_empty(),
            conflicts,
        }
    }

    pub fn first_message(&self) -> Option<&str> {
        self.conflicts.first().map(|c| c.message.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

// ── Bulk results ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Position in the submitted batch.
    pub index: usize,
    pub input: NewEntry,
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub created: Vec<ScheduleEntry>,
    pub skipped: Vec<SkippedEntry>,
    /// One line per skipped entry: `entry {index}: {first conflict message}`.
    pub errors: Vec<String>,
}

// ── WAL events ───────────────────────────────────────────────────

/// The event types, flat. This is the WAL record payload; one committed
/// transaction is written as one `Vec<Event>` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    TeacherSaved {
        id: Ulid,
        name: String,
        subject: String,
        weekly_periods: u32,
        /// JSON array of day tokens.
        work_days: String,
    },
    TeacherDeleted {
        id: Ulid,
    },
    GradeSaved(Grade),
    GradeDeleted {
        id: Ulid,
    },
    SectionSaved(Section),
    SectionDeleted {
        id: Ulid,
    },
    RoomSaved(Room),
    RoomDeleted {
        id: Ulid,
    },
    PeriodSaved(Period),
    PeriodDeleted {
        id: Ulid,
    },
    EntryCreated(ScheduleEntry),
    EntryUpdated(ScheduleEntry),
    EntryDeleted {
        id: Ulid,
    },
}
