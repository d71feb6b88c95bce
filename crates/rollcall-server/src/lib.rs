//! HTTP JSON API of the Rollcall attendance server.
//!
//! Scanners call `/api/attendance/verify` on every finger scan and poll
//! `/api/device/poll` for enrollment work; the admin frontend uses the
//! remaining CRUD, statistics and report endpoints.
//!
//! Every handler that reads and then writes does so inside one SQLite
//! transaction begun for the request and committed once.

pub mod config;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use chrono::{NaiveDate, NaiveDateTime};
use rollcall_core::Clock;
use rollcall_storage::{
    AttendanceRecorder, Database, Device, DeviceRepository, SqliteAttendanceRepository, SqliteClassRepository,
    SqliteCommandRepository, SqliteDeviceRepository, SqliteStudentRepository, StorageResult,
};

pub use config::{Cli, ConfigError, ServerConfig};
pub use handlers::ApiError;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// connection pool
    pub db: Database,
    /// civil wall clock; tests inject a fixed one
    pub clock: Arc<dyn Clock>,
    pub config: Arc<ServerConfig>,
    /// scan evaluation with the default byte-equality matcher
    pub recorder: Arc<AttendanceRecorder>,
}

impl AppState {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: ServerConfig) -> Self {
        Self {
            db,
            clock,
            config: Arc::new(config),
            recorder: Arc::new(AttendanceRecorder::default()),
        }
    }

    /// Current civil time.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Current civil date.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn students(&self) -> SqliteStudentRepository {
        SqliteStudentRepository::new(self.db.pool().clone())
    }

    pub fn classes(&self) -> SqliteClassRepository {
        SqliteClassRepository::new(self.db.pool().clone())
    }

    pub fn devices(&self) -> SqliteDeviceRepository {
        SqliteDeviceRepository::new(self.db.pool().clone())
    }

    pub fn commands(&self) -> SqliteCommandRepository {
        SqliteCommandRepository::new(self.db.pool().clone())
    }

    pub fn attendance(&self) -> SqliteAttendanceRepository {
        SqliteAttendanceRepository::new(self.db.pool().clone())
    }

    /// Device id to use when a request omits one.
    pub fn device_or_default(&self, device_id: Option<String>) -> String {
        device_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.config.default_device_id.clone())
    }

    /// Register the configured default device unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns error if the database write fails.
    pub async fn seed_default_device(&self) -> StorageResult<Device> {
        self.devices()
            .ensure(
                &self.config.default_device_id,
                &self.config.default_device_name,
                self.config.default_device_location.as_deref(),
                self.now(),
            )
            .await
    }
}

/// Create the axum application with all routes.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::health::router())
        .merge(handlers::dashboard::router())
        .merge(handlers::students::router())
        .merge(handlers::classes::router())
        .merge(handlers::devices::router())
        .merge(handlers::attendance::router())
        .fallback(handlers::not_found)
        .with_state(state)
}
