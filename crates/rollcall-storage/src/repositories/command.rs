#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::Command;
use sqlx::SqlitePool;

/// Read-side access to the device command queue
///
/// Queue transitions (issue, poll, complete) live in [`crate::commands`]
/// because they span several tables in one transaction.
pub trait CommandRepository: Send + Sync {
    /// Find a command by ID
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Command>>;

    /// Commands for a device, newest first
    async fn list_for_device(&self, device_id: &str, limit: i64) -> StorageResult<Vec<Command>>;

    /// Number of pending commands across all devices
    async fn count_pending(&self) -> StorageResult<i64>;
}

/// SQLite implementation of CommandRepository
pub struct SqliteCommandRepository {
    pool: SqlitePool,
}

impl SqliteCommandRepository {
    /// Create a new SQLite command repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl CommandRepository for SqliteCommandRepository {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Command>> {
        let command = sqlx::query_as::<_, Command>(
            r#"
            SELECT id, device_id, command_type, fingerprint_id, student_name,
                   status, created_at, completed_at, error_message
            FROM commands
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(command)
    }

    async fn list_for_device(&self, device_id: &str, limit: i64) -> StorageResult<Vec<Command>> {
        let commands = sqlx::query_as::<_, Command>(
            r#"
            SELECT id, device_id, command_type, fingerprint_id, student_name,
                   status, created_at, completed_at, error_message
            FROM commands
            WHERE device_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(commands)
    }

    async fn count_pending(&self) -> StorageResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM commands WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
