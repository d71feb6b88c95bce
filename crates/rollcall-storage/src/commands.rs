//! Device command queue.
//!
//! Administrators queue `enroll` and `delete` commands for a scanner; the
//! scanner polls for the oldest pending one and reports back. Completing an
//! enrollment stores the uploaded template on the student owning the slot
//! and returns the device to idle. Commands never expire.

use crate::error::{StorageError, StorageResult};
use crate::models::{Command, Student};
use crate::transaction;
use chrono::NaiveDateTime;
use rollcall_core::{CommandKind, CommandStatus, DeviceMode, FingerprintSlot, Template};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, warn};

/// Report sent by a device when it finishes a command
#[derive(Debug, Clone)]
pub struct CommandCompletion {
    /// `Completed` or `Failed`
    pub status: CommandStatus,
    /// Template captured during enrollment, if the device uploads one
    pub template: Option<Template>,
    pub error_message: Option<String>,
}

impl CommandCompletion {
    /// Successful completion without a template.
    pub fn completed() -> Self {
        Self {
            status: CommandStatus::Completed,
            template: None,
            error_message: None,
        }
    }

    /// Successful enrollment with the captured template.
    pub fn with_template(template: Template) -> Self {
        Self {
            template: Some(template),
            ..Self::completed()
        }
    }

    /// Failed command with the device's error text.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Failed,
            template: None,
            error_message: Some(message.into()),
        }
    }
}

/// Outcome of completing a command
#[derive(Debug, Clone)]
pub struct CompletedCommand {
    pub command: Command,
    /// A template was stored on (or cleared from) a student
    pub template_updated: bool,
    /// The device was switched back to idle
    pub device_reset: bool,
}

/// Oldest pending command for `device_id`, recording the poll as activity.
///
/// # Errors
///
/// Returns `StorageError::NotFound` for an unregistered device.
pub async fn poll(
    tx: &mut Transaction<'_, Sqlite>,
    device_id: &str,
    now: NaiveDateTime,
) -> StorageResult<Option<Command>> {
    if !transaction::touch_device(tx, device_id, now).await? {
        return Err(StorageError::not_found("Device", "device_id", device_id));
    }

    let command = transaction::oldest_pending_command(tx, device_id).await?;
    debug!(
        device_id,
        command_id = ?command.as_ref().map(|c| c.id),
        "device polled"
    );
    Ok(command)
}

/// Finish a pending command.
///
/// In one transaction: the command moves to its terminal status; a
/// completed enrollment stores the template (when uploaded) on the student
/// owning the slot; a completed deletion clears that student's template;
/// any finished enrollment returns the device to idle.
///
/// # Errors
///
/// - `StorageError::NotFound` if the command does not exist
/// - `StorageError::Conflict` if it is not pending
/// - `StorageError::Validation` if `completion.status` is `Pending`
pub async fn complete(
    tx: &mut Transaction<'_, Sqlite>,
    command_id: i64,
    completion: &CommandCompletion,
    now: NaiveDateTime,
) -> StorageResult<CompletedCommand> {
    if !completion.status.is_terminal() {
        return Err(StorageError::Validation(
            "completion status must be completed or failed".to_string(),
        ));
    }

    let command = transaction::find_command(tx, command_id)
        .await?
        .ok_or_else(|| StorageError::not_found("Command", "id", command_id))?;

    if !command.is_pending() {
        return Err(StorageError::Conflict(format!(
            "Command {command_id} is already {}",
            command.status
        )));
    }

    transaction::finish_command(
        tx,
        command_id,
        completion.status,
        completion.error_message.as_deref(),
        now,
    )
    .await?;

    let kind = command.get_kind();
    let slot = FingerprintSlot::new(command.fingerprint_id)?;
    let succeeded = completion.status == CommandStatus::Completed;

    let template_updated = match (kind, succeeded) {
        (Some(CommandKind::Enroll), true) => match &completion.template {
            Some(template) => {
                let stored = transaction::set_student_template(tx, slot, Some(template), now).await?;
                if !stored {
                    warn!(command_id, %slot, "enrolled slot has no student, template discarded");
                }
                stored
            }
            None => false,
        },
        (Some(CommandKind::Delete), true) => {
            transaction::set_student_template(tx, slot, None, now).await?
        }
        _ => false,
    };

    let device_reset = kind == Some(CommandKind::Enroll);
    if device_reset {
        transaction::set_device_mode(tx, &command.device_id, DeviceMode::Idle, None).await?;
    }

    let command = transaction::find_command(tx, command_id)
        .await?
        .ok_or_else(|| StorageError::not_found("Command", "id", command_id))?;

    info!(
        command_id,
        device_id = %command.device_id,
        command_type = %command.command_type,
        status = %command.status,
        template_updated,
        "command finished"
    );

    Ok(CompletedCommand {
        command,
        template_updated,
        device_reset,
    })
}

/// Queue a command for `student` on `device_id`.
///
/// Enrollment also switches the device into enrollment mode.
///
/// # Errors
///
/// Returns `StorageError::NotFound` for an unregistered device.
pub async fn issue(
    tx: &mut Transaction<'_, Sqlite>,
    student: &Student,
    kind: CommandKind,
    device_id: &str,
    now: NaiveDateTime,
) -> StorageResult<Command> {
    if transaction::find_device(tx, device_id).await?.is_none() {
        return Err(StorageError::not_found("Device", "device_id", device_id));
    }

    let slot = FingerprintSlot::new(student.fingerprint_id)?;
    let id = transaction::insert_command(tx, device_id, kind, slot, Some(&student.name), now).await?;

    if kind == CommandKind::Enroll {
        transaction::set_device_mode(tx, device_id, DeviceMode::Enrollment, None).await?;
    }

    info!(
        command_id = id,
        device_id,
        command_type = %kind,
        student_id = student.id,
        %slot,
        "command queued"
    );

    transaction::find_command(tx, id)
        .await?
        .ok_or_else(|| StorageError::not_found("Command", "id", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use crate::models::NewStudent;
    use chrono::{Duration, NaiveDate};
    use rollcall_core::constants::TEMPLATE_SIZE;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    async fn setup() -> (Database, Student) {
        let db = Database::in_memory().await.unwrap();
        let mut tx = db.begin().await.unwrap();
        sqlx::query("INSERT INTO devices (device_id, name, created_at) VALUES ('ESP32-01', 'Main', ?)")
            .bind(at(8, 0))
            .execute(&mut *tx)
            .await
            .unwrap();
        let new = NewStudent {
            name: "Alice".to_string(),
            fingerprint_id: Some(FingerprintSlot::new(7).unwrap()),
            ..Default::default()
        };
        let id = transaction::create_student(&mut tx, &new, at(8, 0)).await.unwrap();
        let student = transaction::find_student(&mut tx, id).await.unwrap().unwrap();
        tx.commit().await.unwrap();
        (db, student)
    }

    async fn device_mode(db: &Database) -> String {
        sqlx::query_scalar("SELECT mode FROM devices WHERE device_id = 'ESP32-01'")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_poll_is_fifo_and_touches_device() {
        let (db, student) = setup().await;
        let mut tx = db.begin().await.unwrap();

        let first = issue(&mut tx, &student, CommandKind::Delete, "ESP32-01", at(9, 0))
            .await
            .unwrap();
        issue(&mut tx, &student, CommandKind::Enroll, "ESP32-01", at(9, 5))
            .await
            .unwrap();

        let polled = poll(&mut tx, "ESP32-01", at(9, 10)).await.unwrap().unwrap();
        assert_eq!(polled.id, first.id);

        let device = transaction::find_device(&mut tx, "ESP32-01").await.unwrap().unwrap();
        assert_eq!(device.last_seen, Some(at(9, 10)));
    }

    #[tokio::test]
    async fn test_poll_unknown_device() {
        let (db, _) = setup().await;
        let mut tx = db.begin().await.unwrap();
        let err = poll(&mut tx, "NOPE", at(9, 0)).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_enroll_complete_stores_template_and_resets_device() {
        let (db, student) = setup().await;

        let mut tx = db.begin().await.unwrap();
        let cmd = issue(&mut tx, &student, CommandKind::Enroll, "ESP32-01", at(9, 0))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(device_mode(&db).await, "enrollment");
        assert_eq!(cmd.student_name.as_deref(), Some("Alice"));
        assert_eq!(cmd.fingerprint_id, 7);

        let template = Template::from_bytes(&[0xab; TEMPLATE_SIZE]).unwrap();
        let mut tx = db.begin().await.unwrap();
        let done = complete(
            &mut tx,
            cmd.id,
            &CommandCompletion::with_template(template.clone()),
            at(9, 1),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert!(done.template_updated);
        assert!(done.device_reset);
        assert_eq!(done.command.status, "completed");
        assert_eq!(done.command.completed_at, Some(at(9, 1)));
        assert_eq!(device_mode(&db).await, "idle");

        let mut tx = db.begin().await.unwrap();
        let stored = transaction::find_student(&mut tx, student.id).await.unwrap().unwrap();
        assert_eq!(stored.template(), Some(template));

        // Nothing left to poll
        assert!(poll(&mut tx, "ESP32-01", at(9, 2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enroll_without_template_still_completes() {
        let (db, student) = setup().await;
        let mut tx = db.begin().await.unwrap();
        let cmd = issue(&mut tx, &student, CommandKind::Enroll, "ESP32-01", at(9, 0))
            .await
            .unwrap();

        let done = complete(&mut tx, cmd.id, &CommandCompletion::completed(), at(9, 1))
            .await
            .unwrap();
        assert!(!done.template_updated);
        assert!(done.device_reset);
    }

    #[tokio::test]
    async fn test_completing_twice_is_conflict() {
        let (db, student) = setup().await;
        let mut tx = db.begin().await.unwrap();
        let cmd = issue(&mut tx, &student, CommandKind::Enroll, "ESP32-01", at(9, 0))
            .await
            .unwrap();

        complete(&mut tx, cmd.id, &CommandCompletion::failed("sensor timeout"), at(9, 1))
            .await
            .unwrap();
        let err = complete(&mut tx, cmd.id, &CommandCompletion::completed(), at(9, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        let failed = transaction::find_command(&mut tx, cmd.id).await.unwrap().unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("sensor timeout"));
    }

    #[tokio::test]
    async fn test_pending_completion_status_rejected() {
        let (db, _) = setup().await;
        let mut tx = db.begin().await.unwrap();
        let completion = CommandCompletion {
            status: CommandStatus::Pending,
            template: None,
            error_message: None,
        };
        let err = complete(&mut tx, 1, &completion, at(9, 0)).await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_complete_clears_template() {
        let (db, student) = setup().await;
        let mut tx = db.begin().await.unwrap();
        let template = Template::from_bytes(&[1u8; TEMPLATE_SIZE]).unwrap();
        transaction::set_student_template(&mut tx, FingerprintSlot::new(7).unwrap(), Some(&template), at(9, 0))
            .await
            .unwrap();

        let cmd = issue(&mut tx, &student, CommandKind::Delete, "ESP32-01", at(9, 0))
            .await
            .unwrap();
        let done = complete(&mut tx, cmd.id, &CommandCompletion::completed(), at(9, 0) + Duration::seconds(5))
            .await
            .unwrap();

        assert!(done.template_updated);
        assert!(!done.device_reset);
        let stored = transaction::find_student(&mut tx, student.id).await.unwrap().unwrap();
        assert!(!stored.has_template());
    }
}
