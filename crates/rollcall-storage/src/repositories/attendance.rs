#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult, map_unique};
use crate::models::{
    Attendance, AttendanceFilter, AttendanceReport, AttendanceStats, AttendanceView, NewAttendance, StudentTally,
};
use crate::transaction;
use chrono::{NaiveDate, NaiveDateTime};
use rollcall_core::constants::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, SUMMARY_ROWS};
use rollcall_core::{AttendanceStatus, FingerprintSlot};
use sqlx::SqlitePool;
use tracing::info;

/// Manual attendance entry made by an operator
#[derive(Debug, Clone)]
pub struct ManualMark {
    pub fingerprint_id: FingerprintSlot,
    pub status: AttendanceStatus,
    /// Device credited with the entry; its attendance class is used
    pub device_id: String,
    pub notes: Option<String>,
}

/// Repository trait for attendance queries and manual edits
///
/// Scan-driven transitions go through
/// [`AttendanceRecorder`](crate::recorder::AttendanceRecorder).
pub trait AttendanceRepository: Send + Sync {
    /// Find one row with student and class names
    async fn find_view(&self, id: i64) -> StorageResult<Option<AttendanceView>>;

    /// List rows newest first
    async fn list(&self, filter: &AttendanceFilter) -> StorageResult<Vec<AttendanceView>>;

    /// Delete a row
    async fn delete(&self, id: i64) -> StorageResult<()>;

    /// Status counts, optionally for one class and/or session date
    async fn stats(&self, class_id: Option<i64>, date: Option<NaiveDate>) -> StorageResult<AttendanceStats>;

    /// Counts and most frequent attendees over an inclusive date range
    async fn report(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        class_id: Option<i64>,
    ) -> StorageResult<AttendanceReport>;

    /// Number of rows with the given session date
    async fn count_for_date(&self, date: NaiveDate) -> StorageResult<i64>;

    /// Record attendance by hand for the student in a fingerprint slot
    async fn mark(&self, mark: &ManualMark, now: NaiveDateTime) -> StorageResult<Attendance>;
}

/// SQLite implementation of AttendanceRepository
pub struct SqliteAttendanceRepository {
    pool: SqlitePool,
}

impl SqliteAttendanceRepository {
    /// Create a new SQLite attendance repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Clamp a requested page size into `1..=MAX_LIST_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

impl AttendanceRepository for SqliteAttendanceRepository {
    async fn find_view(&self, id: i64) -> StorageResult<Option<AttendanceView>> {
        let row = sqlx::query_as::<_, AttendanceView>(
            r#"
            SELECT a.id, a.student_id, a.class_id, a.device_id, a.status,
                   a.confidence, a.entry_time, a.exit_time, a.duration_minutes,
                   a.session_date, a.notes, a.created_at,
                   s.name AS student_name, c.name AS class_name
            FROM attendance a
            LEFT JOIN students s ON s.id = a.student_id
            LEFT JOIN classes c ON c.id = a.class_id
            WHERE a.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list(&self, filter: &AttendanceFilter) -> StorageResult<Vec<AttendanceView>> {
        let rows = sqlx::query_as::<_, AttendanceView>(
            r#"
            SELECT a.id, a.student_id, a.class_id, a.device_id, a.status,
                   a.confidence, a.entry_time, a.exit_time, a.duration_minutes,
                   a.session_date, a.notes, a.created_at,
                   s.name AS student_name, c.name AS class_name
            FROM attendance a
            LEFT JOIN students s ON s.id = a.student_id
            LEFT JOIN classes c ON c.id = a.class_id
            WHERE (?1 IS NULL OR a.student_id = ?1)
              AND (?2 IS NULL OR a.class_id = ?2)
              AND (?3 IS NULL OR a.session_date = ?3)
            ORDER BY a.entry_time DESC, a.id DESC
            LIMIT ?4
            "#,
        )
        .bind(filter.student_id)
        .bind(filter.class_id)
        .bind(filter.date)
        .bind(clamp_limit(filter.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn delete(&self, id: i64) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Attendance", "id", id));
        }

        info!(attendance_id = id, "attendance deleted");
        Ok(())
    }

    async fn stats(&self, class_id: Option<i64>, date: Option<NaiveDate>) -> StorageResult<AttendanceStats> {
        let (total, present, absent, late): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(status = 'present'), 0),
                   COALESCE(SUM(status = 'absent'), 0),
                   COALESCE(SUM(status = 'late'), 0)
            FROM attendance
            WHERE (?1 IS NULL OR class_id = ?1)
              AND (?2 IS NULL OR session_date = ?2)
            "#,
        )
        .bind(class_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(AttendanceStats::from_counts(total, present, absent, late))
    }

    async fn report(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        class_id: Option<i64>,
    ) -> StorageResult<AttendanceReport> {
        if end_date < start_date {
            return Err(StorageError::Validation(
                "end_date must not be before start_date".to_string(),
            ));
        }

        let (total, present, absent, late): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(status = 'present'), 0),
                   COALESCE(SUM(status = 'absent'), 0),
                   COALESCE(SUM(status = 'late'), 0)
            FROM attendance
            WHERE session_date BETWEEN ?1 AND ?2
              AND (?3 IS NULL OR class_id = ?3)
            "#,
        )
        .bind(start_date)
        .bind(end_date)
        .bind(class_id)
        .fetch_one(&self.pool)
        .await?;

        let top_students = sqlx::query_as::<_, StudentTally>(
            r#"
            SELECT s.id AS student_id, s.name AS name, COUNT(a.id) AS count
            FROM attendance a
            JOIN students s ON s.id = a.student_id
            WHERE a.session_date BETWEEN ?1 AND ?2
              AND (?3 IS NULL OR a.class_id = ?3)
            GROUP BY s.id, s.name
            ORDER BY count DESC, s.id
            LIMIT ?4
            "#,
        )
        .bind(start_date)
        .bind(end_date)
        .bind(class_id)
        .bind(SUMMARY_ROWS)
        .fetch_all(&self.pool)
        .await?;

        Ok(AttendanceReport {
            start_date,
            end_date,
            class_id,
            stats: AttendanceStats::from_counts(total, present, absent, late),
            top_students,
        })
    }

    async fn count_for_date(&self, date: NaiveDate) -> StorageResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE session_date = ?")
            .bind(date)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn mark(&self, mark: &ManualMark, now: NaiveDateTime) -> StorageResult<Attendance> {
        let mut tx = self.pool.begin().await?;

        let student = transaction::find_student_by_slot(&mut tx, mark.fingerprint_id)
            .await?
            .ok_or_else(|| StorageError::not_found("Student", "fingerprint_id", mark.fingerprint_id))?;

        let class_id = transaction::find_device(&mut tx, &mark.device_id)
            .await?
            .and_then(|device| device.attendance_class());

        let new = NewAttendance {
            student_id: student.id,
            class_id,
            device_id: mark.device_id.clone(),
            status: mark.status,
            confidence: None,
            entry_time: now,
            notes: mark.notes.clone(),
        };

        let id = transaction::insert_attendance(&mut tx, &new, now)
            .await
            .map_err(|err| match err {
                StorageError::Database(e) => map_unique("Attendance")(e),
                other => other,
            })?;

        let attendance = transaction::find_attendance(&mut tx, id)
            .await?
            .ok_or_else(|| StorageError::not_found("Attendance", "id", id))?;
        tx.commit().await?;

        info!(
            attendance_id = id,
            student_id = student.id,
            class_id = ?class_id,
            status = %mark.status,
            "attendance marked manually"
        );
        Ok(attendance)
    }
}
