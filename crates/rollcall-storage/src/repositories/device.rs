#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult, map_unique};
use crate::models::Device;
use crate::transaction;
use chrono::NaiveDateTime;
use rollcall_core::DeviceMode;
use rollcall_core::constants::MAX_DEVICE_ID_LENGTH;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Repository trait for scanner devices
pub trait DeviceRepository: Send + Sync {
    /// Find a device by its external identifier
    async fn find_by_device_id(&self, device_id: &str) -> StorageResult<Option<Device>>;

    /// List all devices ordered by identifier
    async fn list(&self) -> StorageResult<Vec<Device>>;

    /// Register a new device in idle mode
    async fn register(
        &self,
        device_id: &str,
        name: &str,
        location: Option<&str>,
        now: NaiveDateTime,
    ) -> StorageResult<Device>;

    /// Insert the device unless it already exists, returning the stored row
    async fn ensure(
        &self,
        device_id: &str,
        name: &str,
        location: Option<&str>,
        now: NaiveDateTime,
    ) -> StorageResult<Device>;

    /// Record contact from the device and return its current state
    async fn check_in(&self, device_id: &str, now: NaiveDateTime) -> StorageResult<Device>;

    /// Switch the device mode
    ///
    /// In attendance mode a given class must exist; when none is given the
    /// current class is kept. Any other mode clears the class.
    async fn set_mode(&self, device_id: &str, mode: DeviceMode, class_id: Option<i64>) -> StorageResult<Device>;

    /// Total number of devices
    async fn count(&self) -> StorageResult<i64>;
}

/// SQLite implementation of DeviceRepository
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new SQLite device repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn validate_device_id(device_id: &str) -> StorageResult<()> {
    if device_id.trim().is_empty() {
        return Err(StorageError::Validation("device_id is required".to_string()));
    }
    if device_id.len() > MAX_DEVICE_ID_LENGTH {
        return Err(StorageError::Validation(format!(
            "device_id must be at most {MAX_DEVICE_ID_LENGTH} characters"
        )));
    }
    Ok(())
}

impl DeviceRepository for SqliteDeviceRepository {
    async fn find_by_device_id(&self, device_id: &str) -> StorageResult<Option<Device>> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, device_id, name, location, mode, current_class_id,
                   is_active, last_seen, created_at
            FROM devices
            WHERE device_id = ?
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    async fn list(&self) -> StorageResult<Vec<Device>> {
        let devices = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, device_id, name, location, mode, current_class_id,
                   is_active, last_seen, created_at
            FROM devices
            ORDER BY device_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }

    async fn register(
        &self,
        device_id: &str,
        name: &str,
        location: Option<&str>,
        now: NaiveDateTime,
    ) -> StorageResult<Device> {
        validate_device_id(device_id)?;
        if name.trim().is_empty() {
            return Err(StorageError::Validation("name is required".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO devices (device_id, name, location, mode, is_active, created_at)
            VALUES (?, ?, ?, 'idle', 1, ?)
            "#,
        )
        .bind(device_id)
        .bind(name)
        .bind(location)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_unique("Device"))?;

        info!(device_id, name, "device registered");

        self.find_by_device_id(device_id)
            .await?
            .ok_or_else(|| StorageError::not_found("Device", "device_id", device_id))
    }

    async fn ensure(
        &self,
        device_id: &str,
        name: &str,
        location: Option<&str>,
        now: NaiveDateTime,
    ) -> StorageResult<Device> {
        validate_device_id(device_id)?;

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO devices (device_id, name, location, mode, is_active, created_at)
            VALUES (?, ?, ?, 'idle', 1, ?)
            "#,
        )
        .bind(device_id)
        .bind(name)
        .bind(location)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(device_id, name, "device seeded");
        } else {
            debug!(device_id, "device already present");
        }

        self.find_by_device_id(device_id)
            .await?
            .ok_or_else(|| StorageError::not_found("Device", "device_id", device_id))
    }

    async fn check_in(&self, device_id: &str, now: NaiveDateTime) -> StorageResult<Device> {
        let mut tx = self.pool.begin().await?;
        if !transaction::touch_device(&mut tx, device_id, now).await? {
            return Err(StorageError::not_found("Device", "device_id", device_id));
        }
        let device = transaction::find_device(&mut tx, device_id)
            .await?
            .ok_or_else(|| StorageError::not_found("Device", "device_id", device_id))?;
        tx.commit().await?;

        Ok(device)
    }

    async fn set_mode(&self, device_id: &str, mode: DeviceMode, class_id: Option<i64>) -> StorageResult<Device> {
        let mut tx = self.pool.begin().await?;

        let current = transaction::find_device(&mut tx, device_id)
            .await?
            .ok_or_else(|| StorageError::not_found("Device", "device_id", device_id))?;

        let class_id = match class_id {
            Some(id) if mode.allows_class() => {
                if transaction::find_class(&mut tx, id).await?.is_none() {
                    return Err(StorageError::not_found("Class", "id", id));
                }
                Some(id)
            }
            _ => current.current_class_id,
        };

        transaction::set_device_mode(&mut tx, device_id, mode, class_id).await?;
        let device = transaction::find_device(&mut tx, device_id)
            .await?
            .ok_or_else(|| StorageError::not_found("Device", "device_id", device_id))?;
        tx.commit().await?;

        info!(
            device_id,
            mode = %mode,
            class_id = ?device.current_class_id,
            "device mode changed"
        );
        Ok(device)
    }

    async fn count(&self) -> StorageResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM devices")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
