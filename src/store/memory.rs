use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock, RwLockWriteGuard};
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::wal::Wal;

use super::codec;
use super::tables::{Tables, Undo};
use super::{Dimension, EntityStore, EntryFilter, GridSnapshot, ScheduleRead, StoreError, StoreTxn};

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Commit {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    FramesSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL.
/// Commits that arrive together are buffered and share one fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Commit { events, response } => {
                let mut batch = vec![(events, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Commit { events, response }) => batch.push((events, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                flush_batch(&mut wal, batch);
                if let Some(other) = deferred {
                    handle_non_commit(&mut wal, other);
                }
            }
            other => handle_non_commit(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: Vec<(Vec<Event>, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();

    let mut result = Ok(());
    for (events, _) in &batch {
        if let Err(e) = wal.append_buffered(events) {
            result = Err(e);
            break;
        }
    }
    // Flush even after an append error so no partial frame lingers in the buffer.
    let flushed = wal.flush_sync();
    if result.is_ok() {
        result = flushed;
    }

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_commit(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let _ = response.send(wal.compact(&events));
        }
        WalCommand::FramesSinceCompact { response } => {
            let _ = response.send(wal.frames_since_compact());
        }
        WalCommand::Commit { .. } => unreachable!("commits are batched by the writer loop"),
    }
}

// ── Store ────────────────────────────────────────────────

/// In-memory Entity Store. All writes go through [`MemoryTxn`], which holds
/// the table write lock until it commits or drops, so transactions are
/// serializable. With a WAL, each commit is durable before it returns.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    wal_tx: Option<mpsc::Sender<WalCommand>>,
}

impl MemoryStore {
    /// Volatile store without a log.
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            wal_tx: None,
        }
    }

    /// Replay the log at `path` and keep appending to it.
    /// Must be called from within a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let frames = Wal::replay(path)?;
        let mut tables = Tables::default();
        let mut events = 0usize;
        for frame in &frames {
            for event in frame {
                tables
                    .apply(event)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                events += 1;
            }
        }
        info!(
            "replayed {} transactions ({events} events) from {}",
            frames.len(),
            path.display()
        );

        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(1024);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            tables: RwLock::new(tables),
            wal_tx: Some(wal_tx),
        })
    }

    /// Start a transaction. Waits for any other open transaction to finish.
    pub async fn transaction(&self) -> MemoryTxn<'_> {
        MemoryTxn {
            tables: self.tables.write().await,
            wal_tx: self.wal_tx.as_ref(),
            events: Vec::new(),
            undo: Vec::new(),
            finished: false,
        }
    }

    // ── One-shot catalog writes ──────────────────────────────

    pub async fn save_teacher(&self, teacher: Teacher) -> Result<(), StoreError> {
        let mut tx = self.transaction().await;
        tx.put_teacher(teacher)?;
        tx.commit().await
    }

    pub async fn save_grade(&self, grade: Grade) -> Result<(), StoreError> {
        let mut tx = self.transaction().await;
        tx.put_grade(grade)?;
        tx.commit().await
    }

    pub async fn save_section(&self, section: Section) -> Result<(), StoreError> {
        let mut tx = self.transaction().await;
        tx.put_section(section)?;
        tx.commit().await
    }

    pub async fn save_room(&self, room: Room) -> Result<(), StoreError> {
        let mut tx = self.transaction().await;
        tx.put_room(room)?;
        tx.commit().await
    }

    pub async fn save_period(&self, period: Period) -> Result<(), StoreError> {
        let mut tx = self.transaction().await;
        tx.put_period(period)?;
        tx.commit().await
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Rewrite the log as the minimal event set for the current state.
    /// No-op for a volatile store.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        // Read lock keeps commits out until the rewrite is done.
        let tables = self.tables.read().await;
        let events = tables.to_events();
        let count = events.len();
        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))?;
        drop(tables);
        info!("compacted WAL to {count} events");
        Ok(())
    }

    pub async fn frames_since_compact(&self) -> u64 {
        let Some(wal_tx) = &self.wal_tx else {
            return 0;
        };
        let (tx, rx) = oneshot::channel();
        if wal_tx
            .send(WalCommand::FramesSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl ScheduleRead for MemoryStore {
    async fn teacher(&self, id: Ulid) -> Result<Option<Teacher>, StoreError> {
        Ok(self.tables.read().await.teachers.get(&id).cloned())
    }

    async fn grade(&self, id: Ulid) -> Result<Option<Grade>, StoreError> {
        Ok(self.tables.read().await.grades.get(&id).cloned())
    }

    async fn section(&self, id: Ulid) -> Result<Option<Section>, StoreError> {
        Ok(self.tables.read().await.sections.get(&id).cloned())
    }

    async fn period(&self, id: Ulid) -> Result<Option<Period>, StoreError> {
        Ok(self.tables.read().await.periods.get(&id).cloned())
    }

    async fn room(&self, id: Ulid) -> Result<Option<Room>, StoreError> {
        Ok(self.tables.read().await.rooms.get(&id).cloned())
    }

    async fn entry(&self, id: Ulid) -> Result<Option<ScheduleEntry>, StoreError> {
        Ok(self.tables.read().await.entries.get(&id).cloned())
    }

    async fn find_booking(
        &self,
        dimension: Dimension,
        day: Day,
        period_id: Ulid,
        exclude: Option<Ulid>,
    ) -> Result<Option<EntryView>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .booking_at(dimension, day, period_id, exclude)
            .and_then(|e| tables.view(e)))
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn StoreTxn + 'a>, StoreError> {
        Ok(Box::new(self.transaction().await))
    }

    async fn snapshot(&self) -> Result<GridSnapshot, StoreError> {
        Ok(self.tables.read().await.snapshot())
    }

    async fn entry_view(&self, id: Ulid) -> Result<Option<EntryView>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.entries.get(&id).and_then(|e| tables.view(e)))
    }

    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<EntryView>, StoreError> {
        Ok(self.tables.read().await.list(filter))
    }

    async fn grid_entries(
        &self,
        filter: &EntryFilter,
    ) -> Result<(Vec<Period>, Vec<EntryView>), StoreError> {
        let tables = self.tables.read().await;
        let mut periods: Vec<Period> = tables.periods.values().cloned().collect();
        periods.sort_by_key(|p| p.number);
        Ok((periods, tables.list(filter)))
    }
}

// ── Transaction ──────────────────────────────────────────

/// Exclusive write transaction over a [`MemoryStore`].
///
/// Writes apply to the tables immediately (so later reads in the same
/// transaction see them) and are undone on drop unless committed.
pub struct MemoryTxn<'a> {
    tables: RwLockWriteGuard<'a, Tables>,
    wal_tx: Option<&'a mpsc::Sender<WalCommand>>,
    events: Vec<Event>,
    undo: Vec<Undo>,
    finished: bool,
}

impl MemoryTxn<'_> {
    fn record(&mut self, event: Event) -> Result<(), StoreError> {
        let undo = self.tables.apply(&event)?;
        self.undo.push(undo);
        self.events.push(event);
        Ok(())
    }

    fn rollback(&mut self) {
        while let Some(undo) = self.undo.pop() {
            self.tables.revert(undo);
        }
        self.events.clear();
    }

    /// Make every write of this transaction durable and visible, or none.
    pub async fn commit(mut self) -> Result<(), StoreError> {
        if !self.events.is_empty()
            && let Some(wal_tx) = self.wal_tx
        {
            let (tx, rx) = oneshot::channel();
            wal_tx
                .send(WalCommand::Commit {
                    events: self.events.clone(),
                    response: tx,
                })
                .await
                .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
            rx.await
                .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
                .map_err(|e| StoreError::Wal(e.to_string()))?;
        }
        debug!("committed transaction with {} events", self.events.len());
        self.finished = true;
        Ok(())
    }

    fn check_name(name: &str, what: &str) -> Result<(), StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidRecord(format!("{what} name must not be empty")));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(StoreError::LimitExceeded("name too long"));
        }
        Ok(())
    }

    fn check_capacity<T>(map: &std::collections::HashMap<Ulid, T>, id: &Ulid) -> Result<(), StoreError> {
        if !map.contains_key(id) && map.len() >= MAX_RECORDS_PER_KIND {
            return Err(StoreError::LimitExceeded("too many records"));
        }
        Ok(())
    }

    // ── Catalog writes ───────────────────────────────────────

    pub fn put_teacher(&mut self, teacher: Teacher) -> Result<(), StoreError> {
        Self::check_name(&teacher.name, "teacher")?;
        Self::check_capacity(&self.tables.teachers, &teacher.id)?;
        if teacher.subject.len() > MAX_SUBJECT_LEN {
            return Err(StoreError::LimitExceeded("subject too long"));
        }
        if teacher.weekly_periods > MAX_WEEKLY_PERIODS {
            return Err(StoreError::LimitExceeded("weekly periods too high"));
        }
        self.record(codec::teacher_event(&teacher))
    }

    pub fn put_grade(&mut self, grade: Grade) -> Result<(), StoreError> {
        Self::check_name(&grade.name, "grade")?;
        Self::check_capacity(&self.tables.grades, &grade.id)?;
        self.record(Event::GradeSaved(grade))
    }

    /// Section names are unique within their grade.
    pub fn put_section(&mut self, section: Section) -> Result<(), StoreError> {
        Self::check_name(&section.name, "section")?;
        Self::check_capacity(&self.tables.sections, &section.id)?;
        if !self.tables.grades.contains_key(&section.grade_id) {
            return Err(StoreError::MissingRecord { kind: "grade", id: section.grade_id });
        }
        if let Some(dup) = self.tables.sections.values().find(|s| {
            s.id != section.id && s.grade_id == section.grade_id && s.name == section.name
        }) {
            return Err(StoreError::UniqueViolation { constraint: "section_grade_name", existing: dup.id });
        }
        // Entries carry the section's grade; it cannot move while booked.
        if let Some(old) = self.tables.sections.get(&section.id)
            && old.grade_id != section.grade_id
            && let Some(booked) = self.tables.entries.values().find(|e| e.section_id == section.id)
        {
            return Err(StoreError::InvalidRecord(format!(
                "section {} is booked by entry {} and cannot change grade",
                section.name, booked.id
            )));
        }
        self.record(Event::SectionSaved(section))
    }

    /// Room names are globally unique.
    pub fn put_room(&mut self, room: Room) -> Result<(), StoreError> {
        Self::check_name(&room.name, "room")?;
        Self::check_capacity(&self.tables.rooms, &room.id)?;
        if room.room_type.len() > MAX_ROOM_TYPE_LEN {
            return Err(StoreError::LimitExceeded("room type too long"));
        }
        if let Some(dup) = self
            .tables
            .rooms
            .values()
            .find(|r| r.id != room.id && r.name == room.name)
        {
            return Err(StoreError::UniqueViolation { constraint: "room_name", existing: dup.id });
        }
        self.record(Event::RoomSaved(room))
    }

    /// Period numbers are unique and periods never overlap in time.
    pub fn put_period(&mut self, period: Period) -> Result<(), StoreError> {
        Self::check_capacity(&self.tables.periods, &period.id)?;
        if period.start >= period.end {
            return Err(StoreError::InvalidRecord(format!(
                "period {} must start before it ends ({} - {})",
                period.number, period.start, period.end
            )));
        }
        for other in self.tables.periods.values().filter(|p| p.id != period.id) {
            if other.number == period.number {
                return Err(StoreError::UniqueViolation { constraint: "period_number", existing: other.id });
            }
            if other.overlaps(&period) {
                return Err(StoreError::InvalidRecord(format!(
                    "period {} ({} - {}) overlaps period {} ({} - {})",
                    period.number, period.start, period.end, other.number, other.start, other.end
                )));
            }
        }
        self.record(Event::PeriodSaved(period))
    }

    // ── Cascading deletes ────────────────────────────────────

    fn delete_entries_where(&mut self, pred: impl Fn(&ScheduleEntry) -> bool) -> Result<usize, StoreError> {
        let mut doomed: Vec<Ulid> = self
            .tables
            .entries
            .values()
            .filter(|&e| pred(e))
            .map(|e| e.id)
            .collect();
        doomed.sort();
        for id in &doomed {
            self.record(Event::EntryDeleted { id: *id })?;
        }
        Ok(doomed.len())
    }

    pub fn remove_teacher(&mut self, id: Ulid) -> Result<bool, StoreError> {
        if !self.tables.teachers.contains_key(&id) {
            return Ok(false);
        }
        self.delete_entries_where(|e| e.teacher_id == id)?;
        self.record(Event::TeacherDeleted { id })?;
        Ok(true)
    }

    pub fn remove_room(&mut self, id: Ulid) -> Result<bool, StoreError> {
        if !self.tables.rooms.contains_key(&id) {
            return Ok(false);
        }
        self.delete_entries_where(|e| e.room_id == id)?;
        self.record(Event::RoomDeleted { id })?;
        Ok(true)
    }

    pub fn remove_period(&mut self, id: Ulid) -> Result<bool, StoreError> {
        if !self.tables.periods.contains_key(&id) {
            return Ok(false);
        }
        self.delete_entries_where(|e| e.period_id == id)?;
        self.record(Event::PeriodDeleted { id })?;
        Ok(true)
    }

    pub fn remove_section(&mut self, id: Ulid) -> Result<bool, StoreError> {
        if !self.tables.sections.contains_key(&id) {
            return Ok(false);
        }
        self.delete_entries_where(|e| e.section_id == id)?;
        self.record(Event::SectionDeleted { id })?;
        Ok(true)
    }

    /// Removes the grade's sections and every entry booked for the grade.
    pub fn remove_grade(&mut self, id: Ulid) -> Result<bool, StoreError> {
        if !self.tables.grades.contains_key(&id) {
            return Ok(false);
        }
        let mut sections: Vec<Ulid> = self
            .tables
            .sections
            .values()
            .filter(|s| s.grade_id == id)
            .map(|s| s.id)
            .collect();
        sections.sort();
        self.delete_entries_where(|e| e.grade_id == id || sections.contains(&e.section_id))?;
        for sid in sections {
            self.record(Event::SectionDeleted { id: sid })?;
        }
        self.record(Event::GradeDeleted { id })?;
        Ok(true)
    }
}

impl Drop for MemoryTxn<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.undo.is_empty() {
            debug!("rolling back transaction with {} events", self.events.len());
            self.rollback();
        }
    }
}

#[async_trait]
impl ScheduleRead for MemoryTxn<'_> {
    async fn teacher(&self, id: Ulid) -> Result<Option<Teacher>, StoreError> {
        Ok(self.tables.teachers.get(&id).cloned())
    }

    async fn grade(&self, id: Ulid) -> Result<Option<Grade>, StoreError> {
        Ok(self.tables.grades.get(&id).cloned())
    }

    async fn section(&self, id: Ulid) -> Result<Option<Section>, StoreError> {
        Ok(self.tables.sections.get(&id).cloned())
    }

    async fn period(&self, id: Ulid) -> Result<Option<Period>, StoreError> {
        Ok(self.tables.periods.get(&id).cloned())
    }

    async fn room(&self, id: Ulid) -> Result<Option<Room>, StoreError> {
        Ok(self.tables.rooms.get(&id).cloned())
    }

    async fn entry(&self, id: Ulid) -> Result<Option<ScheduleEntry>, StoreError> {
        Ok(self.tables.entries.get(&id).cloned())
    }

    async fn find_booking(
        &self,
        dimension: Dimension,
        day: Day,
        period_id: Ulid,
        exclude: Option<Ulid>,
    ) -> Result<Option<EntryView>, StoreError> {
        Ok(self
            .tables
            .booking_at(dimension, day, period_id, exclude)
            .and_then(|e| self.tables.view(e)))
    }
}

#[async_trait]
impl StoreTxn for MemoryTxn<'_> {
    async fn insert_entry(&mut self, entry: ScheduleEntry) -> Result<(), StoreError> {
        if self.tables.entries.contains_key(&entry.id) {
            return Err(StoreError::UniqueViolation { constraint: "entry_id", existing: entry.id });
        }
        if self.tables.entries.len() >= MAX_ENTRIES {
            return Err(StoreError::LimitExceeded("too many schedule entries"));
        }
        self.tables.check_entry(&entry)?;
        self.record(Event::EntryCreated(entry))
    }

    async fn update_entry(&mut self, entry: ScheduleEntry) -> Result<(), StoreError> {
        if !self.tables.entries.contains_key(&entry.id) {
            return Err(StoreError::MissingRecord { kind: "schedule entry", id: entry.id });
        }
        self.tables.check_entry(&entry)?;
        self.record(Event::EntryUpdated(entry))
    }

    async fn delete_entry(&mut self, id: Ulid) -> Result<bool, StoreError> {
        if !self.tables.entries.contains_key(&id) {
            return Ok(false);
        }
        self.record(Event::EntryDeleted { id })?;
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        MemoryTxn::commit(*self).await
    }
}
