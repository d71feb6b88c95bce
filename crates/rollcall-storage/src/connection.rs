use crate::error::{StorageError, StorageResult};
use sqlx::ConnectOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Database connection configuration for SQLite
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of idle connections to maintain
    pub min_connections: u32,

    /// Maximum lifetime of a connection before it's closed
    pub max_lifetime: Duration,

    /// Timeout for acquiring a connection from the pool
    pub acquire_timeout: Duration,

    /// Whether to create the database file if it doesn't exist
    pub create_if_missing: bool,

    /// Whether to run migrations on connection
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: "rollcall.db".to_string(),
            max_connections: 10,
            min_connections: 2,
            max_lifetime: Duration::from_secs(1800),
            acquire_timeout: Duration::from_secs(30),
            create_if_missing: true,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration with the given path
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    /// Set the maximum number of connections in the pool
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the minimum number of idle connections
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Set how long a pooled connection may live
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Set how long to wait for a free connection
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set whether to create the database if it doesn't exist
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set whether to run migrations automatically
    pub fn auto_migrate(mut self, migrate: bool) -> Self {
        self.auto_migrate = migrate;
        self
    }

    /// Check pool bounds before connecting.
    ///
    /// # Errors
    /// Returns `StorageError::Configuration` for an empty path or
    /// inconsistent pool sizes.
    pub fn validate(&self) -> StorageResult<()> {
        if self.database_path.trim().is_empty() {
            return Err(StorageError::Configuration(
                "database path must not be empty".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(StorageError::Configuration(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(StorageError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection pool with the given configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rollcall_storage::connection::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = DatabaseConfig::new("rollcall.db")
    ///     .max_connections(10)
    ///     .auto_migrate(true);
    ///
    /// let db = Database::new(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        config.validate()?;

        if let Some(parent) = Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Configuration(format!("Failed to create database directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.database_path))
            .map_err(|e| StorageError::Configuration(format!("Invalid database path: {}", e)))?
            .create_if_missing(config.create_if_missing)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(Some(config.max_lifetime))
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        info!(
            path = %config.database_path,
            max_connections = config.max_connections,
            "database pool opened"
        );

        let db = Self { pool };

        if config.auto_migrate {
            db.migrate().await?;
        }

        Ok(db)
    }

    /// Create an in-memory database (primarily for testing)
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rollcall_storage::connection::Database;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::in_memory().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Run the embedded migrations from the workspace `migrations/` directory.
    ///
    /// # Errors
    ///
    /// Returns error if a migration fails to apply or the applied history
    /// does not match the embedded files.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        debug!("database migrations applied");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a request-scoped transaction.
    ///
    /// Dropping the transaction without calling `commit()` rolls it back.
    pub async fn begin(&self) -> StorageResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Begin a transaction holding the SQLite write lock from the start.
    ///
    /// Read-then-write sequences (scans, command completion) use this so
    /// that concurrent requests queue on the busy timeout instead of
    /// failing when a deferred transaction upgrades from a stale snapshot.
    pub async fn begin_immediate(&self) -> StorageResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Close the database connection pool
    ///
    /// Waits for all active connections to be returned before closing them.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
