use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rollcall_core::DayOfWeek;
use serde::{Deserialize, Serialize};

/// A course that meets on a weekly schedule
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Class {
    pub id: i64,
    pub name: String,
    /// Optional unique course code (e.g. "CSE-101")
    pub code: Option<String>,
    pub description: Option<String>,
    pub teacher_name: Option<String>,
    /// Inactive classes are never resolved as running.
    pub is_active: bool,
    /// First day of the course term
    pub start_date: Option<NaiveDate>,
    /// Last day of the course term
    pub end_date: Option<NaiveDate>,
    /// Planned number of sessions in the term
    pub total_classes: Option<i64>,
    pub created_at: NaiveDateTime,
}

/// Fields for creating or replacing a class
#[derive(Debug, Clone)]
pub struct ClassInput {
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub teacher_name: Option<String>,
    pub is_active: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_classes: Option<i64>,
}

impl ClassInput {
    /// Active class with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            description: None,
            teacher_name: None,
            is_active: true,
            start_date: None,
            end_date: None,
            total_classes: None,
        }
    }

    /// Set the course code.
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<Class> for ClassInput {
    fn from(class: Class) -> Self {
        Self {
            name: class.name,
            code: class.code,
            description: class.description,
            teacher_name: class.teacher_name,
            is_active: class.is_active,
            start_date: class.start_date,
            end_date: class.end_date,
            total_classes: class.total_classes,
        }
    }
}

/// One weekly meeting of a class
///
/// At most one row exists per `(class_id, day_of_week)`, and
/// `end_time` is strictly after `start_time`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClassSchedule {
    pub id: i64,
    pub class_id: i64,
    /// Lowercase weekday name
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ClassSchedule {
    /// Weekday as an enum.
    pub fn get_day(&self) -> Option<DayOfWeek> {
        self.day_of_week.parse().ok()
    }

    /// Returns `true` if `time` falls inside the meeting, both ends inclusive.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time <= self.end_time
    }
}

/// A weekly slot to store for a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub day: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[rstest]
    #[case(t(9, 59), false)]
    #[case(t(10, 0), true)]
    #[case(t(10, 30), true)]
    #[case(t(11, 0), true)]
    #[case(t(11, 1), false)]
    fn test_schedule_window_is_inclusive(#[case] at: NaiveTime, #[case] inside: bool) {
        let schedule = ClassSchedule {
            id: 1,
            class_id: 1,
            day_of_week: "monday".to_string(),
            start_time: t(10, 0),
            end_time: t(11, 0),
        };
        assert_eq!(schedule.contains(at), inside);
        assert_eq!(schedule.get_day(), Some(DayOfWeek::Monday));
    }
}
