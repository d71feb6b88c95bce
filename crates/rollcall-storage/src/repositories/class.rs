#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult, map_unique};
use crate::models::{Class, ClassInput, ClassSchedule, ScheduleSlot, Student};
use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::info;

/// Repository trait for classes and their weekly schedules
pub trait ClassRepository: Send + Sync {
    /// Find a class by ID
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Class>>;

    /// List classes ordered by name
    async fn list(&self, active_only: bool) -> StorageResult<Vec<Class>>;

    /// Create a new class
    async fn create(&self, class: &ClassInput, now: NaiveDateTime) -> StorageResult<Class>;

    /// Replace all fields of a class
    async fn update(&self, id: i64, class: &ClassInput) -> StorageResult<Class>;

    /// Delete a class; schedules cascade, references are cleared
    async fn delete(&self, id: i64) -> StorageResult<()>;

    /// Students whose home class is `id`
    async fn students(&self, id: i64) -> StorageResult<Vec<Student>>;

    /// Number of students assigned to the class
    async fn student_count(&self, id: i64) -> StorageResult<i64>;

    /// Weekly schedule, Monday first
    async fn schedules(&self, id: i64) -> StorageResult<Vec<ClassSchedule>>;

    /// Replace the weekly schedule atomically
    async fn replace_schedules(&self, id: i64, slots: &[ScheduleSlot]) -> StorageResult<Vec<ClassSchedule>>;

    /// Total and active class counts
    async fn counts(&self) -> StorageResult<(i64, i64)>;
}

/// SQLite implementation of ClassRepository
pub struct SqliteClassRepository {
    pool: SqlitePool,
}

impl SqliteClassRepository {
    /// Create a new SQLite class repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn validate_class(class: &ClassInput) -> StorageResult<()> {
    if class.name.trim().is_empty() {
        return Err(StorageError::Validation("name is required".to_string()));
    }
    if let (Some(start), Some(end)) = (class.start_date, class.end_date)
        && end < start
    {
        return Err(StorageError::Validation(
            "end_date must not be before start_date".to_string(),
        ));
    }
    if class.total_classes.is_some_and(|n| n < 0) {
        return Err(StorageError::Validation(
            "total_classes must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Check a weekly schedule: one slot per day, each ending after it starts.
pub fn validate_slots(slots: &[ScheduleSlot]) -> StorageResult<()> {
    let mut seen = HashSet::new();
    for slot in slots {
        if slot.end_time <= slot.start_time {
            return Err(StorageError::Validation(format!(
                "{}: end_time must be after start_time",
                slot.day
            )));
        }
        if !seen.insert(slot.day) {
            return Err(StorageError::Conflict(format!(
                "{} is scheduled more than once",
                slot.day
            )));
        }
    }
    Ok(())
}

impl ClassRepository for SqliteClassRepository {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Class>> {
        let class = sqlx::query_as::<_, Class>(
            r#"
            SELECT id, name, code, description, teacher_name, is_active,
                   start_date, end_date, total_classes, created_at
            FROM classes
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(class)
    }

    async fn list(&self, active_only: bool) -> StorageResult<Vec<Class>> {
        let classes = sqlx::query_as::<_, Class>(
            r#"
            SELECT id, name, code, description, teacher_name, is_active,
                   start_date, end_date, total_classes, created_at
            FROM classes
            WHERE (? = 0 OR is_active = 1)
            ORDER BY name, id
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(classes)
    }

    async fn create(&self, class: &ClassInput, now: NaiveDateTime) -> StorageResult<Class> {
        validate_class(class)?;

        let result = sqlx::query(
            r#"
            INSERT INTO classes (
                name, code, description, teacher_name, is_active,
                start_date, end_date, total_classes, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&class.name)
        .bind(&class.code)
        .bind(&class.description)
        .bind(&class.teacher_name)
        .bind(class.is_active)
        .bind(class.start_date)
        .bind(class.end_date)
        .bind(class.total_classes)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_unique("Class"))?;

        let id = result.last_insert_rowid();
        info!(class_id = id, name = %class.name, "class created");

        self.find_by_id(id)
            .await?
            .ok_or_else(|| StorageError::not_found("Class", "id", id))
    }

    async fn update(&self, id: i64, class: &ClassInput) -> StorageResult<Class> {
        validate_class(class)?;

        let result = sqlx::query(
            r#"
            UPDATE classes
            SET name = ?, code = ?, description = ?, teacher_name = ?,
                is_active = ?, start_date = ?, end_date = ?, total_classes = ?
            WHERE id = ?
            "#,
        )
        .bind(&class.name)
        .bind(&class.code)
        .bind(&class.description)
        .bind(&class.teacher_name)
        .bind(class.is_active)
        .bind(class.start_date)
        .bind(class.end_date)
        .bind(class.total_classes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_unique("Class"))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Class", "id", id));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| StorageError::not_found("Class", "id", id))
    }

    async fn delete(&self, id: i64) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        // Devices attached to the class drop back to idle so the mode/class
        // CHECK constraint keeps holding once the reference is nulled
        sqlx::query("UPDATE devices SET mode = 'idle', current_class_id = NULL WHERE current_class_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM classes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Class", "id", id));
        }

        tx.commit().await?;
        info!(class_id = id, "class deleted");
        Ok(())
    }

    async fn students(&self, id: i64) -> StorageResult<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(
            r#"
            SELECT id, name, email, student_code, fingerprint_id,
                   fingerprint_template, class_id, created_at, updated_at
            FROM students
            WHERE class_id = ?
            ORDER BY name, id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(students)
    }

    async fn student_count(&self, id: i64) -> StorageResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE class_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn schedules(&self, id: i64) -> StorageResult<Vec<ClassSchedule>> {
        let mut schedules = sqlx::query_as::<_, ClassSchedule>(
            r#"
            SELECT id, class_id, day_of_week, start_time, end_time
            FROM class_schedules
            WHERE class_id = ?
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        schedules.sort_by_key(|s| (s.get_day(), s.start_time));
        Ok(schedules)
    }

    async fn replace_schedules(&self, id: i64, slots: &[ScheduleSlot]) -> StorageResult<Vec<ClassSchedule>> {
        validate_slots(slots)?;

        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM classes WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StorageError::not_found("Class", "id", id));
        }

        sqlx::query("DELETE FROM class_schedules WHERE class_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for slot in slots {
            sqlx::query(
                r#"
                INSERT INTO class_schedules (class_id, day_of_week, start_time, end_time)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(slot.day.as_str())
            .bind(slot.start_time)
            .bind(slot.end_time)
            .execute(&mut *tx)
            .await
            .map_err(map_unique("Schedule"))?;
        }

        tx.commit().await?;
        info!(class_id = id, days = slots.len(), "class schedule replaced");

        self.schedules(id).await
    }

    async fn counts(&self) -> StorageResult<(i64, i64)> {
        let counts: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0) FROM classes",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use chrono::{NaiveDate, NaiveTime};
    use rollcall_core::DayOfWeek;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(day: DayOfWeek, start: NaiveTime, end: NaiveTime) -> ScheduleSlot {
        ScheduleSlot {
            day,
            start_time: start,
            end_time: end,
        }
    }

    async fn setup() -> (Database, SqliteClassRepository) {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteClassRepository::new(db.pool().clone());
        (db, repo)
    }

    #[tokio::test]
    async fn test_create_update_and_code_conflict() {
        let (_db, repo) = setup().await;
        let math = repo
            .create(&ClassInput::named("Math").code("MATH-1"), now())
            .await
            .unwrap();
        assert!(math.is_active);

        let err = repo
            .create(&ClassInput::named("Other").code("MATH-1"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        let mut input = ClassInput::from(math.clone());
        input.is_active = false;
        input.teacher_name = Some("Dr. Rahman".to_string());
        let updated = repo.update(math.id, &input).await.unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.teacher_name.as_deref(), Some("Dr. Rahman"));

        assert_eq!(repo.list(true).await.unwrap().len(), 0);
        assert_eq!(repo.list(false).await.unwrap().len(), 1);
        assert_eq!(repo.counts().await.unwrap(), (1, 0));
    }

    #[tokio::test]
    async fn test_class_validation() {
        let (_db, repo) = setup().await;
        assert!(matches!(
            repo.create(&ClassInput::named(" "), now()).await.unwrap_err(),
            StorageError::Validation(_)
        ));

        let mut term = ClassInput::named("Physics");
        term.start_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        term.end_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        assert!(matches!(
            repo.create(&term, now()).await.unwrap_err(),
            StorageError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_replace_schedules() {
        let (_db, repo) = setup().await;
        let class = repo.create(&ClassInput::named("Math"), now()).await.unwrap();

        let stored = repo
            .replace_schedules(
                class.id,
                &[
                    slot(DayOfWeek::Wednesday, t(14, 0), t(15, 0)),
                    slot(DayOfWeek::Monday, t(10, 0), t(11, 0)),
                ],
            )
            .await
            .unwrap();
        let days: Vec<_> = stored.iter().map(|s| s.day_of_week.as_str()).collect();
        assert_eq!(days, ["monday", "wednesday"]);

        let stored = repo
            .replace_schedules(class.id, &[slot(DayOfWeek::Friday, t(8, 0), t(9, 30))])
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].start_time, t(8, 0));
    }

    #[tokio::test]
    async fn test_schedule_validation() {
        let (_db, repo) = setup().await;
        let class = repo.create(&ClassInput::named("Math"), now()).await.unwrap();

        let twice = [
            slot(DayOfWeek::Monday, t(10, 0), t(11, 0)),
            slot(DayOfWeek::Monday, t(12, 0), t(13, 0)),
        ];
        assert!(matches!(
            repo.replace_schedules(class.id, &twice).await.unwrap_err(),
            StorageError::Conflict(_)
        ));

        let backwards = [slot(DayOfWeek::Monday, t(11, 0), t(10, 0))];
        assert!(matches!(
            repo.replace_schedules(class.id, &backwards).await.unwrap_err(),
            StorageError::Validation(_)
        ));

        assert!(matches!(
            repo.replace_schedules(999, &[]).await.unwrap_err(),
            StorageError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_and_idles_devices() {
        let (db, repo) = setup().await;
        let class = repo.create(&ClassInput::named("Math"), now()).await.unwrap();
        repo.replace_schedules(class.id, &[slot(DayOfWeek::Monday, t(10, 0), t(11, 0))])
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO devices (device_id, name, mode, current_class_id, created_at) VALUES ('D1', 'D', 'attendance', ?, ?)",
        )
        .bind(class.id)
        .bind(now())
        .execute(db.pool())
        .await
        .unwrap();

        repo.delete(class.id).await.unwrap();

        assert!(repo.schedules(class.id).await.unwrap().is_empty());
        let (mode, current): (String, Option<i64>) =
            sqlx::query_as("SELECT mode, current_class_id FROM devices WHERE device_id = 'D1'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(mode, "idle");
        assert_eq!(current, None);
    }
}
