/// Longest accepted name for a teacher, grade, section or room.
pub const MAX_NAME_LEN: usize = 128;

/// Longest accepted subject label on a teacher or an entry.
pub const MAX_SUBJECT_LEN: usize = 128;

/// Longest accepted room type label.
pub const MAX_ROOM_TYPE_LEN: usize = 64;

/// Max entries accepted by a single bulk create.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Max records per lookup entity kind (teachers, rooms, ...).
pub const MAX_RECORDS_PER_KIND: usize = 10_000;

/// Max committed schedule entries per school.
pub const MAX_ENTRIES: usize = 100_000;

/// Upper bound on a teacher's weekly period target.
pub const MAX_WEEKLY_PERIODS: u32 = 200;

/// Max length of a school (tenant) name.
pub const MAX_TENANT_NAME_LEN: usize = 128;

/// Max number of schools loaded at once.
pub const MAX_TENANTS: usize = 1000;
