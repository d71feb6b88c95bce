use thiserror::Error;

/// Storage-specific error types for the Rollcall attendance system.
///
/// Business rejections during attendance processing (cooldown, no class
/// running, ...) are not errors; they are returned as outcomes. These
/// variants cover failed queries, missing rows and constraint violations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Entity not found in database
    #[error("Entity not found: {entity_type} with {field}={value}")]
    NotFound {
        entity_type: String,
        field: String,
        value: String,
    },

    /// Unique key or state conflict (duplicate slot, code, device id, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Data validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Domain value rejected by the core types
    #[error(transparent)]
    Core(#[from] rollcall_core::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Build a `NotFound` error.
    pub fn not_found(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Returns `true` if this wraps a unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(e) => is_unique_violation(e),
            _ => false,
        }
    }
}

/// Returns `true` if the SQLite error is a UNIQUE constraint failure.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Column list of a UNIQUE failure, e.g. `fingerprint_id` for
/// "UNIQUE constraint failed: students.fingerprint_id".
pub(crate) fn unique_violation_columns(err: &sqlx::Error) -> Option<String> {
    let db = err.as_database_error()?;
    if !db.is_unique_violation() {
        return None;
    }
    let message = db.message();
    let list = message.rsplit_once(": ").map_or(message, |(_, cols)| cols);
    let columns: Vec<&str> = list
        .split(',')
        .map(|c| c.trim())
        .map(|c| c.rsplit_once('.').map_or(c, |(_, col)| col))
        .collect();
    Some(columns.join(", "))
}

/// Map a unique violation on `entity` to `Conflict` and a dangling foreign
/// key to `Validation`, passing other errors through.
pub(crate) fn map_unique(entity: &'static str) -> impl FnOnce(sqlx::Error) -> StorageError {
    move |err| {
        if let Some(columns) = unique_violation_columns(&err) {
            return StorageError::Conflict(format!("{entity} with this {columns} already exists"));
        }
        if err
            .as_database_error()
            .is_some_and(|db| db.is_foreign_key_violation())
        {
            return StorageError::Validation(format!("{entity} references a missing record"));
        }
        StorageError::Database(err)
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
