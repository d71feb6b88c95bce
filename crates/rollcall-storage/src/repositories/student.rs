#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult, map_unique};
use crate::models::{NewStudent, Student, StudentUpdate};
use crate::transaction;
use chrono::NaiveDateTime;
use rollcall_core::FingerprintSlot;
use sqlx::SqlitePool;
use tracing::info;

/// Repository trait for Student entity operations
pub trait StudentRepository: Send + Sync {
    /// Find a student by ID
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Student>>;

    /// Find the student enrolled in a fingerprint slot
    async fn find_by_fingerprint(&self, slot: FingerprintSlot) -> StorageResult<Option<Student>>;

    /// List students ordered by name, optionally filtered by class and a
    /// case-insensitive substring of name, email or student code
    async fn list(&self, class_id: Option<i64>, search: Option<&str>) -> StorageResult<Vec<Student>>;

    /// Create a student, auto-assigning the slot when none is given
    async fn create(&self, student: &NewStudent, now: NaiveDateTime) -> StorageResult<Student>;

    /// Apply a partial update
    async fn update(&self, id: i64, update: StudentUpdate, now: NaiveDateTime) -> StorageResult<Student>;

    /// Delete a student and, by cascade, their attendance
    async fn delete(&self, id: i64) -> StorageResult<()>;

    /// Total number of students
    async fn count(&self) -> StorageResult<i64>;
}

/// SQLite implementation of StudentRepository
pub struct SqliteStudentRepository {
    pool: SqlitePool,
}

impl SqliteStudentRepository {
    /// Create a new SQLite student repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl StudentRepository for SqliteStudentRepository {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT id, name, email, student_code, fingerprint_id,
                   fingerprint_template, class_id, created_at, updated_at
            FROM students
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

    async fn find_by_fingerprint(&self, slot: FingerprintSlot) -> StorageResult<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT id, name, email, student_code, fingerprint_id,
                   fingerprint_template, class_id, created_at, updated_at
            FROM students
            WHERE fingerprint_id = ?
            "#,
        )
        .bind(slot.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

    async fn list(&self, class_id: Option<i64>, search: Option<&str>) -> StorageResult<Vec<Student>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let students = sqlx::query_as::<_, Student>(
            r#"
            SELECT id, name, email, student_code, fingerprint_id,
                   fingerprint_template, class_id, created_at, updated_at
            FROM students
            WHERE (?1 IS NULL OR class_id = ?1)
              AND (?2 IS NULL
                   OR lower(name) LIKE ?2
                   OR lower(COALESCE(email, '')) LIKE ?2
                   OR lower(COALESCE(student_code, '')) LIKE ?2)
            ORDER BY name, id
            "#,
        )
        .bind(class_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(students)
    }

    async fn create(&self, student: &NewStudent, now: NaiveDateTime) -> StorageResult<Student> {
        if student.name.trim().is_empty() {
            return Err(StorageError::Validation("name is required".to_string()));
        }

        // Slot auto-assignment reads MAX() and inserts atomically
        let mut tx = self.pool.begin().await?;
        let id = transaction::create_student(&mut tx, student, now).await?;
        let created = transaction::find_student(&mut tx, id)
            .await?
            .ok_or_else(|| StorageError::not_found("Student", "id", id))?;
        tx.commit().await?;

        info!(
            student_id = created.id,
            fingerprint_id = created.fingerprint_id,
            "student created"
        );
        Ok(created)
    }

    async fn update(&self, id: i64, update: StudentUpdate, now: NaiveDateTime) -> StorageResult<Student> {
        let mut student = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| StorageError::not_found("Student", "id", id))?;

        update.apply_to(&mut student);
        if student.name.trim().is_empty() {
            return Err(StorageError::Validation("name is required".to_string()));
        }

        let result = sqlx::query(
            r#"
            UPDATE students
            SET name = ?, email = ?, student_code = ?, fingerprint_id = ?,
                class_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.student_code)
        .bind(student.fingerprint_id)
        .bind(student.class_id)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_unique("Student"))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Student", "id", id));
        }

        student.updated_at = now;
        Ok(student)
    }

    async fn delete(&self, id: i64) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Student", "id", id));
        }

        info!(student_id = id, "student deleted");
        Ok(())
    }

    async fn count(&self) -> StorageResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
