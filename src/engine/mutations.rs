use std::time::Instant;

use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{detect_conflicts, record_conflicts, resolve_references, validate_subject};
use super::{observe, Engine, EngineError};

impl Engine {
    /// Book a single entry: validate references, check conflicts, insert.
    /// All three steps run inside one store transaction.
    pub async fn create_entry(&self, input: NewEntry) -> Result<ScheduleEntry, EngineError> {
        let started = Instant::now();
        let result = self.create_entry_inner(input).await;
        observe("create", started, &result);
        result
    }

    async fn create_entry_inner(&self, input: NewEntry) -> Result<ScheduleEntry, EngineError> {
        validate_subject(&input.subject)?;
        let mut tx = self.store.begin().await?;

        let refs = resolve_references(&*tx, &input.references()).await?;
        if !refs.valid {
            return Err(EngineError::ReferenceNotFound(refs.errors));
        }

        let report = detect_conflicts(&*tx, &input.candidate()).await?;
        if report.has_conflict {
            record_conflicts(&report);
            return Err(EngineError::Conflict(report));
        }

        let entry = input.into_entry(Ulid::new());
        tx.insert_entry(entry.clone())
            .await
            .map_err(|e| constraint_race(entry.id, e.into()))?;
        tx.commit().await?;

        info!(
            "booked entry {} ({} period {}) teacher={} section={} room={}",
            entry.id, entry.day, entry.period_id, entry.teacher_id, entry.section_id, entry.room_id
        );
        Ok(entry)
    }

    /// Overlay `patch` onto entry `id` and re-validate the merged booking,
    /// ignoring the entry's own current slot.
    pub async fn update_entry(&self, id: Ulid, patch: EntryPatch) -> Result<ScheduleEntry, EngineError> {
        let started = Instant::now();
        let result = self.update_entry_inner(id, patch).await;
        observe("update", started, &result);
        result
    }

    async fn update_entry_inner(&self, id: Ulid, patch: EntryPatch) -> Result<ScheduleEntry, EngineError> {
        let mut tx = self.store.begin().await?;
        let existing = tx.entry(id).await?.ok_or(EngineError::NotFound(id))?;
        if let Some(subject) = &patch.subject {
            validate_subject(subject)?;
        }
        let merged = patch.apply_to(&existing);

        let refs = resolve_references(&*tx, &ReferenceIds::from(&merged)).await?;
        if !refs.valid {
            return Err(EngineError::ReferenceNotFound(refs.errors));
        }

        let report = detect_conflicts(&*tx, &BookingCandidate::for_entry(&merged)).await?;
        if report.has_conflict {
            record_conflicts(&report);
            return Err(EngineError::Conflict(report));
        }

        tx.update_entry(merged.clone())
            .await
            .map_err(|e| constraint_race(id, e.into()))?;
        tx.commit().await?;

        info!("updated entry {id} ({} period {})", merged.day, merged.period_id);
        Ok(merged)
    }

    pub async fn delete_entry(&self, id: Ulid) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self.delete_entry_inner(id).await;
        observe("delete", started, &result);
        result
    }

    async fn delete_entry_inner(&self, id: Ulid) -> Result<(), EngineError> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_entry(id).await? {
            return Err(EngineError::NotFound(id));
        }
        tx.commit().await?;
        info!("deleted entry {id}");
        Ok(())
    }

    /// Book a batch in array order inside one transaction.
    ///
    /// Each entry is checked against the store as it stands at that point of
    /// the transaction, earlier entries of the same batch included, so the
    /// first of two colliding entries wins. With `skip_conflicts` off the
    /// first conflict aborts the whole batch; with it on, conflicting entries
    /// land in `skipped` and the rest commit together. Any other failure
    /// aborts the batch in both modes.
    pub async fn bulk_create_entries(
        &self,
        entries: Vec<NewEntry>,
        skip_conflicts: bool,
    ) -> Result<BulkOutcome, EngineError> {
        let started = Instant::now();
        let result = self.bulk_create_inner(entries, skip_conflicts).await;
        observe("bulk_create", started, &result);
        result
    }

    async fn bulk_create_inner(
        &self,
        entries: Vec<NewEntry>,
        skip_conflicts: bool,
    ) -> Result<BulkOutcome, EngineError> {
        if entries.len() > MAX_BATCH_SIZE {
            return Err(EngineError::LimitExceeded("batch too large"));
        }
        for input in &entries {
            validate_subject(&input.subject)?;
        }
        let mut outcome = BulkOutcome::default();
        if entries.is_empty() {
            return Ok(outcome);
        }

        let submitted = entries.len();
        let mut tx = self.store.begin().await?;

        for (index, input) in entries.into_iter().enumerate() {
            let refs = resolve_references(&*tx, &input.references()).await?;
            if !refs.valid {
                let errors = refs
                    .errors
                    .into_iter()
                    .map(|e| format!("entry {index}: {e}"))
                    .collect();
                return Err(EngineError::ReferenceNotFound(errors));
            }

            let report = detect_conflicts(&*tx, &input.candidate()).await?;
            if report.has_conflict {
                record_conflicts(&report);
                if !skip_conflicts {
                    debug!("bulk create aborted at entry {index}: conflict");
                    return Err(EngineError::Conflict(report));
                }
                if let Some(msg) = report.first_message() {
                    outcome.errors.push(format!("entry {index}: {msg}"));
                }
                outcome.skipped.push(SkippedEntry {
                    index,
                    input,
                    conflicts: report.conflicts,
                });
                continue;
            }

            let entry = input.into_entry(Ulid::new());
            tx.insert_entry(entry.clone())
                .await
                .map_err(|e| constraint_race(entry.id, e.into()))?;
            outcome.created.push(entry);
        }

        tx.commit().await?;
        info!(
            "bulk create: {submitted} submitted, {} created, {} skipped",
            outcome.created.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }
}

/// Log a store uniqueness rejection that slipped past a clean check.
fn constraint_race(entry_id: Ulid, err: EngineError) -> EngineError {
    if let EngineError::StorageConstraint(msg) = &err {
        warn!("storage constraint rejected entry {entry_id} after a clean conflict check: {msg}");
    }
    err
}
