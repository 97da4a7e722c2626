use std::path::PathBuf;
use std::time::Duration;

use ulid::Ulid;

use slotgrid::engine::EngineError;
use slotgrid::model::*;
use slotgrid::store::{EntryFilter, MemoryStore};
use slotgrid::tenant::{School, TenantManager};

// ── Test infrastructure ──────────────────────────────────────

fn test_data_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("slotgrid_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

struct Week {
    t1: Teacher,
    t2: Teacher,
    grade: Grade,
    sx: Section,
    sy: Section,
    room_a: Room,
    room_b: Room,
    p1: Period,
    p2: Period,
}

impl Week {
    fn entry(&self, t: &Teacher, s: &Section, r: &Room, p: &Period, day: Day) -> NewEntry {
        NewEntry {
            day,
            subject: t.subject.clone(),
            teacher_id: t.id,
            grade_id: self.grade.id,
            section_id: s.id,
            period_id: p.id,
            room_id: r.id,
        }
    }
}

async fn seed(store: &MemoryStore) -> Week {
    let grade = Grade { id: Ulid::new(), name: "Grade 9".into(), order: 9 };
    let week = Week {
        t1: Teacher {
            id: Ulid::new(),
            name: "Layla".into(),
            subject: "Physics".into(),
            weekly_periods: 6,
            work_days: DaySet::full_week(),
        },
        t2: Teacher {
            id: Ulid::new(),
            name: "Karim".into(),
            subject: "History".into(),
            weekly_periods: 6,
            work_days: DaySet::full_week(),
        },
        sx: Section { id: Ulid::new(), name: "X".into(), grade_id: grade.id },
        sy: Section { id: Ulid::new(), name: "Y".into(), grade_id: grade.id },
        room_a: Room { id: Ulid::new(), name: "Room A".into(), capacity: 28, room_type: "lab".into() },
        room_b: Room { id: Ulid::new(), name: "Room B".into(), capacity: 32, room_type: "classroom".into() },
        p1: Period {
            id: Ulid::new(),
            number: 1,
            start: "07:30".parse().unwrap(),
            end: "08:15".parse().unwrap(),
        },
        p2: Period {
            id: Ulid::new(),
            number: 2,
            start: "08:20".parse().unwrap(),
            end: "09:05".parse().unwrap(),
        },
        grade,
    };
    store.save_grade(week.grade.clone()).await.unwrap();
    store.save_section(week.sx.clone()).await.unwrap();
    store.save_section(week.sy.clone()).await.unwrap();
    store.save_teacher(week.t1.clone()).await.unwrap();
    store.save_teacher(week.t2.clone()).await.unwrap();
    store.save_room(week.room_a.clone()).await.unwrap();
    store.save_room(week.room_b.clone()).await.unwrap();
    store.save_period(week.p1.clone()).await.unwrap();
    store.save_period(week.p2.clone()).await.unwrap();
    week
}

async fn open_school(tm: &TenantManager, name: &str) -> (School, Week) {
    let school = tm.get_or_create(name).unwrap();
    let week = seed(&school.store).await;
    (school, week)
}

fn manager(dir: PathBuf) -> TenantManager {
    TenantManager::new(dir, 1000, Duration::from_secs(3600))
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn one_conflict_per_dimension() {
    let tm = manager(test_data_dir());
    let (school, w) = open_school(&tm, "dimensions").await;
    let engine = &school.engine;
    engine
        .create_entry(w.entry(&w.t1, &w.sx, &w.room_a, &w.p1, Day::Sunday))
        .await
        .unwrap();

    let cases = [
        (w.entry(&w.t1, &w.sy, &w.room_b, &w.p1, Day::Sunday), ConflictKind::Teacher),
        (w.entry(&w.t2, &w.sy, &w.room_a, &w.p1, Day::Sunday), ConflictKind::Room),
        (w.entry(&w.t2, &w.sx, &w.room_b, &w.p1, Day::Sunday), ConflictKind::Section),
    ];
    for (proposed, kind) in cases {
        let report = engine.check_conflicts(&proposed.candidate()).await.unwrap();
        assert_eq!(report.conflicts.len(), 1, "{kind:?}");
        assert_eq!(report.conflicts[0].kind, kind);
        assert!(matches!(
            engine.create_entry(proposed).await,
            Err(EngineError::Conflict(_))
        ));
    }

    let free = w.entry(&w.t1, &w.sy, &w.room_b, &w.p2, Day::Sunday);
    engine.create_entry(free).await.unwrap();
    assert_eq!(engine.list_entries(&EntryFilter::default()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn bulk_skip_then_reopen() {
    let dir = test_data_dir();
    let created_ids: Vec<Ulid> = {
        let tm = manager(dir.clone());
        let (school, w) = open_school(&tm, "bulk").await;
        let batch = vec![
            w.entry(&w.t1, &w.sx, &w.room_a, &w.p1, Day::Monday),
            w.entry(&w.t1, &w.sy, &w.room_b, &w.p1, Day::Monday),
            w.entry(&w.t2, &w.sy, &w.room_b, &w.p2, Day::Monday),
        ];
        let outcome = school.engine.bulk_create_entries(batch, true).await.unwrap();
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].index, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("entry 1: Teacher Layla"));
        outcome.created.iter().map(|e| e.id).collect()
    };

    // A fresh manager replays the school's WAL from disk.
    let tm = manager(dir);
    let school = tm.get_or_create("bulk").unwrap();
    let mut ids: Vec<Ulid> = school
        .engine
        .list_entries(&EntryFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.entry.id)
        .collect();
    ids.sort();
    let mut expected = created_ids;
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn analytics_over_a_small_week() {
    let tm = manager(test_data_dir());
    let (school, w) = open_school(&tm, "analytics").await;
    let engine = &school.engine;
    for day in [Day::Sunday, Day::Monday, Day::Tuesday] {
        engine
            .create_entry(w.entry(&w.t1, &w.sx, &w.room_a, &w.p1, day))
            .await
            .unwrap();
    }

    let teachers = engine.teacher_stats().await.unwrap();
    let layla = teachers.iter().find(|t| t.teacher_id == w.t1.id).unwrap();
    assert_eq!(layla.scheduled_periods, 3);
    assert_eq!(layla.utilization_percentage, 50);
    assert_eq!(layla.remaining_periods, 3);
    let karim = teachers.iter().find(|t| t.teacher_id == w.t2.id).unwrap();
    assert_eq!(karim.utilization_percentage, 0);

    let rooms = engine.room_stats().await.unwrap();
    let room_a = rooms.iter().find(|r| r.room_id == w.room_a.id).unwrap();
    assert_eq!(room_a.available_periods, 10);
    assert_eq!(room_a.utilization_percentage, 30);

    let overview = engine.overview_stats().await.unwrap();
    assert_eq!(overview.totals.teachers, 2);
    assert_eq!(overview.totals.entries, 3);
    assert_eq!(overview.average_teacher_utilization, 25.0);
    assert_eq!(overview.average_room_utilization, 15.0);

    // Period 1 on sunday..tuesday has Room B and Karim free; everything else
    // has both rooms and both teachers free.
    let slots = engine.unused_slots().await.unwrap();
    assert_eq!(slots.len(), 10);
    let sunday_p1 = slots
        .iter()
        .find(|s| s.day == Day::Sunday && s.period_id == w.p1.id)
        .unwrap();
    assert_eq!(sunday_p1.free_rooms.len(), 1);
    assert_eq!(sunday_p1.free_rooms[0].id, w.room_b.id);
    assert_eq!(sunday_p1.free_teachers.len(), 1);
    assert_eq!(sunday_p1.free_teachers[0].id, w.t2.id);
}

#[tokio::test]
async fn part_time_teacher_limits_unused_slots() {
    let tm = manager(test_data_dir());
    let school = tm.get_or_create("part_time").unwrap();
    school
        .store
        .save_period(Period {
            id: Ulid::new(),
            number: 1,
            start: "08:00".parse().unwrap(),
            end: "08:45".parse().unwrap(),
        })
        .await
        .unwrap();
    school
        .store
        .save_room(Room { id: Ulid::new(), name: "Hall".into(), capacity: 60, room_type: "hall".into() })
        .await
        .unwrap();
    school
        .store
        .save_teacher(Teacher {
            id: Ulid::new(),
            name: "Nadia".into(),
            subject: "Art".into(),
            weekly_periods: 2,
            work_days: [Day::Sunday, Day::Monday].into_iter().collect(),
        })
        .await
        .unwrap();

    let days: Vec<Day> = school
        .engine
        .unused_slots()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.day)
        .collect();
    assert_eq!(days, vec![Day::Sunday, Day::Monday]);
}
