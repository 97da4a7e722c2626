//! Entity Store: records of one school and the transaction primitive the
//! booking engine writes through.
//!
//! The engine only sees the [`EntityStore`] / [`StoreTxn`] traits.
//! [`MemoryStore`] is the bundled adapter: in-memory tables, declared
//! uniqueness constraints, and an optional write-ahead log.

mod codec;
mod error;
mod memory;
mod tables;

pub use error::StoreError;
pub use memory::{MemoryStore, MemoryTxn};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::*;

/// One of the three booking dimensions, with the id to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Teacher(Ulid),
    Room(Ulid),
    Section(Ulid),
}

/// Conjunctive filter over committed entries. Empty filter matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub teacher_id: Option<Ulid>,
    pub section_id: Option<Ulid>,
    pub room_id: Option<Ulid>,
    pub day: Option<Day>,
}

impl EntryFilter {
    pub fn matches(&self, e: &ScheduleEntry) -> bool {
        self.teacher_id.is_none_or(|id| e.teacher_id == id)
            && self.section_id.is_none_or(|id| e.section_id == id)
            && self.room_id.is_none_or(|id| e.room_id == id)
            && self.day.is_none_or(|d| e.day == d)
    }
}

/// Consistent copy of every table, read under one lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridSnapshot {
    pub teachers: Vec<Teacher>,
    pub grades: Vec<Grade>,
    pub sections: Vec<Section>,
    pub rooms: Vec<Room>,
    /// Sorted by period number.
    pub periods: Vec<Period>,
    pub entries: Vec<ScheduleEntry>,
}

/// Point lookups and the booking existence query, shared by the store and
/// by open transactions (which also see their own uncommitted writes).
#[async_trait]
pub trait ScheduleRead: Send + Sync {
    async fn teacher(&self, id: Ulid) -> Result<Option<Teacher>, StoreError>;
    async fn grade(&self, id: Ulid) -> Result<Option<Grade>, StoreError>;
    async fn section(&self, id: Ulid) -> Result<Option<Section>, StoreError>;
    async fn period(&self, id: Ulid) -> Result<Option<Period>, StoreError>;
    async fn room(&self, id: Ulid) -> Result<Option<Room>, StoreError>;
    async fn entry(&self, id: Ulid) -> Result<Option<ScheduleEntry>, StoreError>;

    /// The entry booking `dimension` at (day, period), other than `exclude`,
    /// with its display fields resolved in the same read.
    async fn find_booking(
        &self,
        dimension: Dimension,
        day: Day,
        period_id: Ulid,
        exclude: Option<Ulid>,
    ) -> Result<Option<EntryView>, StoreError>;
}

/// An open atomic write. Dropping it without `commit` rolls everything back.
#[async_trait]
pub trait StoreTxn: ScheduleRead {
    async fn insert_entry(&mut self, entry: ScheduleEntry) -> Result<(), StoreError>;
    async fn update_entry(&mut self, entry: ScheduleEntry) -> Result<(), StoreError>;
    /// Returns false if no such entry existed.
    async fn delete_entry(&mut self, id: Ulid) -> Result<bool, StoreError>;
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait EntityStore: ScheduleRead {
    async fn begin<'a>(&'a self) -> Result<Box<dyn StoreTxn + 'a>, StoreError>;
    async fn snapshot(&self) -> Result<GridSnapshot, StoreError>;
    async fn entry_view(&self, id: Ulid) -> Result<Option<EntryView>, StoreError>;
    /// Matching entries with display fields, sorted by (day, period number).
    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<EntryView>, StoreError>;
    /// Periods (by number) and matching entries, read together.
    async fn grid_entries(
        &self,
        filter: &EntryFilter,
    ) -> Result<(Vec<Period>, Vec<EntryView>), StoreError>;
}
