//! Transaction-aware operations for atomic multistep operations.
//!
//! These functions accept a SQLite transaction reference so that an HTTP
//! request can read state, decide, and write within one unit of work. The
//! attendance state machine and the device command queue are built on
//! them; the caller commits once at the end.
//!
//! # Usage Pattern
//!
//! ```no_run
//! use rollcall_storage::{Database, transaction};
//! use rollcall_storage::models::NewStudent;
//! use chrono::NaiveDate;
//!
//! # async fn example(db: Database) -> Result<(), Box<dyn std::error::Error>> {
//! let now = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(9, 0, 0).unwrap();
//!
//! let mut tx = db.begin().await?;
//!
//! let student = NewStudent { name: "Alice".to_string(), ..Default::default() };
//! let id = transaction::create_student(&mut tx, &student, now).await?;
//!
//! // Both the insert and the slot assignment commit together
//! tx.commit().await?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```
//!
//! # Atomic Guarantees
//!
//! If any operation returns an error the transaction must not be committed;
//! dropping it rolls everything back.

use crate::error::{StorageError, StorageResult, map_unique};
use crate::models::{Attendance, Class, Command, Device, NewAttendance, NewStudent, Student};
use chrono::{NaiveDate, NaiveDateTime};
use rollcall_core::{
    CommandKind, CommandStatus, DeviceMode, FingerprintSlot, Template,
    constants::MIN_FINGERPRINT_SLOT,
};
use sqlx::{Sqlite, Transaction};

/// Student id, slot and raw template of an enrolled fingerprint
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EnrolledTemplate {
    pub student_id: i64,
    pub fingerprint_id: i64,
    pub fingerprint_template: Vec<u8>,
}

// ============================================================================
// Students
// ============================================================================

/// Find a student by primary key
pub async fn find_student(tx: &mut Transaction<'_, Sqlite>, id: i64) -> StorageResult<Option<Student>> {
    let student = sqlx::query_as::<_, Student>(
        r#"
        SELECT id, name, email, student_code, fingerprint_id,
               fingerprint_template, class_id, created_at, updated_at
        FROM students
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(student)
}

/// Find the student owning a fingerprint slot
pub async fn find_student_by_slot(
    tx: &mut Transaction<'_, Sqlite>,
    slot: FingerprintSlot,
) -> StorageResult<Option<Student>> {
    let student = sqlx::query_as::<_, Student>(
        r#"
        SELECT id, name, email, student_code, fingerprint_id,
               fingerprint_template, class_id, created_at, updated_at
        FROM students
        WHERE fingerprint_id = ?
        "#,
    )
    .bind(slot.get())
    .fetch_optional(&mut **tx)
    .await?;

    Ok(student)
}

/// All stored templates, in ascending slot order
///
/// Match ties resolve to the first candidate, so this order makes the
/// lowest slot win.
pub async fn enrolled_templates(
    tx: &mut Transaction<'_, Sqlite>,
) -> StorageResult<Vec<EnrolledTemplate>> {
    let rows = sqlx::query_as::<_, EnrolledTemplate>(
        r#"
        SELECT id AS student_id, fingerprint_id, fingerprint_template
        FROM students
        WHERE fingerprint_template IS NOT NULL
        ORDER BY fingerprint_id ASC
        "#,
    )
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

/// Next free slot: one past the highest slot in use, or 1 when empty
pub async fn next_fingerprint_slot(tx: &mut Transaction<'_, Sqlite>) -> StorageResult<FingerprintSlot> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(fingerprint_id) FROM students")
        .fetch_one(&mut **tx)
        .await?;

    let slot = match max {
        Some(highest) => FingerprintSlot::new(highest)?.next(),
        None => FingerprintSlot::new(MIN_FINGERPRINT_SLOT)?,
    };
    Ok(slot)
}

/// Create a new student within a transaction
///
/// A missing slot is auto-assigned with [`next_fingerprint_slot`].
///
/// # Returns
///
/// Returns the auto-generated student ID on success
///
/// # Errors
///
/// Returns `StorageError::Conflict` if the slot, email or student code is
/// already taken.
pub async fn create_student(
    tx: &mut Transaction<'_, Sqlite>,
    student: &NewStudent,
    now: NaiveDateTime,
) -> StorageResult<i64> {
    let slot = match student.fingerprint_id {
        Some(slot) => slot,
        None => next_fingerprint_slot(tx).await?,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO students (
            name, email, student_code, fingerprint_id, class_id,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&student.name)
    .bind(&student.email)
    .bind(&student.student_code)
    .bind(slot.get())
    .bind(student.class_id)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(map_unique("Student"))?;

    Ok(result.last_insert_rowid())
}

/// Store or clear the template of the student owning `slot`
///
/// # Returns
///
/// Returns `true` if a student owns the slot.
pub async fn set_student_template(
    tx: &mut Transaction<'_, Sqlite>,
    slot: FingerprintSlot,
    template: Option<&Template>,
    now: NaiveDateTime,
) -> StorageResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE students
        SET fingerprint_template = ?, updated_at = ?
        WHERE fingerprint_id = ?
        "#,
    )
    .bind(template.map(Template::to_vec))
    .bind(now)
    .bind(slot.get())
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Classes
// ============================================================================

/// Find a class by primary key
pub async fn find_class(tx: &mut Transaction<'_, Sqlite>, id: i64) -> StorageResult<Option<Class>> {
    let class = sqlx::query_as::<_, Class>(
        r#"
        SELECT id, name, code, description, teacher_name, is_active,
               start_date, end_date, total_classes, created_at
        FROM classes
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(class)
}

// ============================================================================
// Devices
// ============================================================================

/// Find a device by its hardware identifier
pub async fn find_device(
    tx: &mut Transaction<'_, Sqlite>,
    device_id: &str,
) -> StorageResult<Option<Device>> {
    let device = sqlx::query_as::<_, Device>(
        r#"
        SELECT id, device_id, name, location, mode, current_class_id,
               is_active, last_seen, created_at
        FROM devices
        WHERE device_id = ?
        "#,
    )
    .bind(device_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(device)
}

/// Record that the device contacted the server
pub async fn touch_device(
    tx: &mut Transaction<'_, Sqlite>,
    device_id: &str,
    now: NaiveDateTime,
) -> StorageResult<bool> {
    let result = sqlx::query("UPDATE devices SET last_seen = ? WHERE device_id = ?")
        .bind(now)
        .bind(device_id)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Switch a device's mode
///
/// `class_id` is only stored in attendance mode; any other mode clears it.
pub async fn set_device_mode(
    tx: &mut Transaction<'_, Sqlite>,
    device_id: &str,
    mode: DeviceMode,
    class_id: Option<i64>,
) -> StorageResult<()> {
    let class_id = if mode.allows_class() { class_id } else { None };

    let result = sqlx::query(
        r#"
        UPDATE devices
        SET mode = ?, current_class_id = ?
        WHERE device_id = ?
        "#,
    )
    .bind(mode.as_str())
    .bind(class_id)
    .bind(device_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("Device", "device_id", device_id));
    }

    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

/// Queue a command for a device
pub async fn insert_command(
    tx: &mut Transaction<'_, Sqlite>,
    device_id: &str,
    kind: CommandKind,
    slot: FingerprintSlot,
    student_name: Option<&str>,
    now: NaiveDateTime,
) -> StorageResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO commands (device_id, command_type, fingerprint_id, student_name, status, created_at)
        VALUES (?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(device_id)
    .bind(kind.as_str())
    .bind(slot.get())
    .bind(student_name)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Find a command by primary key
pub async fn find_command(tx: &mut Transaction<'_, Sqlite>, id: i64) -> StorageResult<Option<Command>> {
    let command = sqlx::query_as::<_, Command>(
        r#"
        SELECT id, device_id, command_type, fingerprint_id, student_name,
               status, created_at, completed_at, error_message
        FROM commands
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(command)
}

/// Oldest pending command for a device (FIFO by creation time, then id)
pub async fn oldest_pending_command(
    tx: &mut Transaction<'_, Sqlite>,
    device_id: &str,
) -> StorageResult<Option<Command>> {
    let command = sqlx::query_as::<_, Command>(
        r#"
        SELECT id, device_id, command_type, fingerprint_id, student_name,
               status, created_at, completed_at, error_message
        FROM commands
        WHERE device_id = ? AND status = 'pending'
        ORDER BY created_at ASC, id ASC
        LIMIT 1
        "#,
    )
    .bind(device_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(command)
}

/// Move a pending command to a terminal status
///
/// # Errors
///
/// Returns `StorageError::Conflict` if the command is no longer pending.
pub async fn finish_command(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    status: CommandStatus,
    error_message: Option<&str>,
    now: NaiveDateTime,
) -> StorageResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE commands
        SET status = ?, completed_at = ?, error_message = COALESCE(?, error_message)
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(status.as_str())
    .bind(now)
    .bind(error_message)
    .bind(id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::Conflict(format!(
            "Command {id} is not pending"
        )));
    }

    Ok(())
}

// ============================================================================
// Attendance
// ============================================================================

/// Find an attendance row by primary key
pub async fn find_attendance(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
) -> StorageResult<Option<Attendance>> {
    let row = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, student_id, class_id, device_id, status, confidence,
               entry_time, exit_time, duration_minutes, session_date,
               notes, created_at
        FROM attendance
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row)
}

/// Most recent attendance row of a student in a class, on any day
pub async fn latest_attendance(
    tx: &mut Transaction<'_, Sqlite>,
    student_id: i64,
    class_id: i64,
) -> StorageResult<Option<Attendance>> {
    let row = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, student_id, class_id, device_id, status, confidence,
               entry_time, exit_time, duration_minutes, session_date,
               notes, created_at
        FROM attendance
        WHERE student_id = ? AND class_id = ?
        ORDER BY entry_time DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(student_id)
    .bind(class_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row)
}

/// The session row of a student in a class on a given civil date
pub async fn session_attendance(
    tx: &mut Transaction<'_, Sqlite>,
    student_id: i64,
    class_id: i64,
    session_date: NaiveDate,
) -> StorageResult<Option<Attendance>> {
    let row = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, student_id, class_id, device_id, status, confidence,
               entry_time, exit_time, duration_minutes, session_date,
               notes, created_at
        FROM attendance
        WHERE student_id = ? AND class_id = ? AND session_date = ?
        "#,
    )
    .bind(student_id)
    .bind(class_id)
    .bind(session_date)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row)
}

/// Insert an open attendance row
///
/// The session date is the civil date of `entry_time`.
///
/// # Errors
///
/// A second row for the same student, class and date fails the unique
/// session index; the raw `StorageError::Database` is returned so the
/// caller can tell a lost race from other failures.
pub async fn insert_attendance(
    tx: &mut Transaction<'_, Sqlite>,
    attendance: &NewAttendance,
    now: NaiveDateTime,
) -> StorageResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance (
            student_id, class_id, device_id, status, confidence,
            entry_time, session_date, notes, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(attendance.student_id)
    .bind(attendance.class_id)
    .bind(&attendance.device_id)
    .bind(attendance.status.as_str())
    .bind(attendance.confidence)
    .bind(attendance.entry_time)
    .bind(attendance.entry_time.date())
    .bind(&attendance.notes)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Close an open attendance row
///
/// # Returns
///
/// Returns `false` if the row was already closed (or does not exist).
pub async fn close_attendance(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    exit_time: NaiveDateTime,
    duration_minutes: i64,
) -> StorageResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET exit_time = ?, duration_minutes = ?
        WHERE id = ? AND exit_time IS NULL
        "#,
    )
    .bind(exit_time)
    .bind(duration_minutes)
    .bind(id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}
