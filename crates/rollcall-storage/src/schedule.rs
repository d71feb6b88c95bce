//! Resolution of the class currently in session.
//!
//! A class is running when one of its weekly schedules is for today's
//! weekday and the current civil time lies between the start and end time,
//! both inclusive. Inactive classes never run.
//!
//! When several classes are in their window at once the choice is
//! deterministic:
//!
//! 1. the class the scanning device is assigned to, if it is among them;
//! 2. otherwise the one with the earliest start time;
//! 3. then the lowest class id.

use crate::error::StorageResult;
use chrono::{Datelike, NaiveDateTime, NaiveTime};
use rollcall_core::DayOfWeek;
use serde::Serialize;
use sqlx::{Sqlite, Transaction};
use tracing::debug;

/// A class together with today's meeting window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ScheduledClass {
    pub class_id: i64,
    pub class_name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ScheduledClass {
    /// Returns `true` if `time` is inside the meeting window.
    pub fn in_window(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time <= self.end_time
    }
}

/// Pick the running class among `candidates` at `time`.
///
/// `preferred` is the class assigned to the scanning device, if any.
pub fn pick_running(
    candidates: &[ScheduledClass],
    time: NaiveTime,
    preferred: Option<i64>,
) -> Option<ScheduledClass> {
    let mut running: Vec<&ScheduledClass> =
        candidates.iter().filter(|c| c.in_window(time)).collect();

    if let Some(preferred) = preferred
        && let Some(found) = running.iter().find(|c| c.class_id == preferred)
    {
        return Some((*found).clone());
    }

    running.sort_by_key(|c| (c.start_time, c.class_id));
    running.first().map(|c| (*c).clone())
}

/// Today's meetings of active classes
pub async fn schedules_for_day(
    tx: &mut Transaction<'_, Sqlite>,
    day: DayOfWeek,
) -> StorageResult<Vec<ScheduledClass>> {
    let rows = sqlx::query_as::<_, ScheduledClass>(
        r#"
        SELECT c.id AS class_id, c.name AS class_name, s.start_time, s.end_time
        FROM class_schedules s
        JOIN classes c ON c.id = s.class_id
        WHERE s.day_of_week = ? AND c.is_active = 1
        ORDER BY s.start_time ASC, c.id ASC
        "#,
    )
    .bind(day.as_str())
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

/// The class in session at `now`, if any.
pub async fn running_class(
    tx: &mut Transaction<'_, Sqlite>,
    now: NaiveDateTime,
    preferred: Option<i64>,
) -> StorageResult<Option<ScheduledClass>> {
    let day = DayOfWeek::from(now.weekday());
    let candidates = schedules_for_day(tx, day).await?;
    let running = pick_running(&candidates, now.time(), preferred);

    debug!(
        %day,
        time = %now.time(),
        candidates = candidates.len(),
        class_id = ?running.as_ref().map(|c| c.class_id),
        "resolved running class"
    );

    Ok(running)
}
