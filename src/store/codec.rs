//! Storage encoding of the teacher work-day set.
//!
//! The WAL keeps work days as a JSON array string (`["sunday","monday"]`);
//! everything above the store sees a [`DaySet`].

use crate::model::*;

use super::StoreError;

pub fn encode_work_days(days: DaySet) -> String {
    let tokens: Vec<Day> = days.into();
    serde_json::to_string(&tokens).unwrap_or_else(|_| "[]".to_string())
}

pub fn decode_work_days(raw: &str) -> Result<DaySet, StoreError> {
    let tokens: Vec<Day> = serde_json::from_str(raw)
        .map_err(|e| StoreError::InvalidRecord(format!("work days '{raw}': {e}")))?;
    Ok(tokens.into())
}

pub fn teacher_event(teacher: &Teacher) -> Event {
    Event::TeacherSaved {
        id: teacher.id,
        name: teacher.name.clone(),
        subject: teacher.subject.clone(),
        weekly_periods: teacher.weekly_periods,
        work_days: encode_work_days(teacher.work_days),
    }
}

pub fn teacher_from_event(event: &Event) -> Result<Teacher, StoreError> {
    match event {
        Event::TeacherSaved {
            id,
            name,
            subject,
            weekly_periods,
            work_days,
        } => Ok(Teacher {
            id: *id,
            name: name.clone(),
            subject: subject.clone(),
            weekly_periods: *weekly_periods,
            work_days: decode_work_days(work_days)?,
        }),
        other => Err(StoreError::InvalidRecord(format!("not a teacher event: {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn work_days_encode_as_json_array() {
        let days: DaySet = [Day::Monday, Day::Sunday].into_iter().collect();
        assert_eq!(encode_work_days(days), r#"["sunday","monday"]"#);
        assert_eq!(encode_work_days(DaySet::empty()), "[]");
    }

    #[test]
    fn decode_rejects_unknown_token() {
        assert!(decode_work_days(r#"["sunday","friday"]"#).is_err());
        assert!(decode_work_days("sunday").is_err());
    }

    #[test]
    fn teacher_survives_event_encoding() {
        let teacher = Teacher {
            id: Ulid::new(),
            name: "Mr. Salem".into(),
            subject: "Physics".into(),
            weekly_periods: 18,
            work_days: [Day::Tuesday, Day::Thursday].into_iter().collect(),
        };
        let event = teacher_event(&teacher);
        assert_eq!(teacher_from_event(&event).unwrap(), teacher);
    }
}
