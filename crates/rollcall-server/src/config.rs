//! Server configuration.
//!
//! [`ServerConfig`] holds everything the binary needs to start. It can be
//! built in code (tests do this) or parsed from command-line flags and
//! `ROLLCALL_*` environment variables through [`Cli`].

use clap::Parser;
use rollcall_core::CivilClock;
use rollcall_core::constants::{
    DEFAULT_DEVICE_ID, DEFAULT_DEVICE_LOCATION, DEFAULT_DEVICE_NAME, DEFAULT_TIMEZONE, DEVICE_POLL_TIMEOUT_SECS,
    MAX_DEVICE_ID_LENGTH,
};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";

/// Default SQLite database file
pub const DEFAULT_DATABASE_PATH: &str = "rollcall.db";

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid listen address '{0}'")]
    ListenAddr(String),

    #[error(transparent)]
    Timezone(#[from] rollcall_core::Error),

    #[error("Invalid default device id: {0}")]
    DeviceId(String),

    #[error("Invalid log level '{0}'")]
    LogLevel(String),

    #[error("Database path must not be empty")]
    DatabasePath,
}

/// Runtime configuration of the attendance server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    pub database_path: String,

    /// IANA name of the civil timezone all timestamps are expressed in
    pub timezone: String,

    /// Device seeded at startup and assumed when a request omits one
    pub default_device_id: String,

    pub default_device_name: String,

    pub default_device_location: Option<String>,

    /// Advertised to devices; commands do not expire
    pub device_poll_timeout: Duration,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            default_device_id: DEFAULT_DEVICE_ID.to_string(),
            default_device_name: DEFAULT_DEVICE_NAME.to_string(),
            default_device_location: Some(DEFAULT_DEVICE_LOCATION.to_string()),
            device_poll_timeout: Duration::from_secs(DEVICE_POLL_TIMEOUT_SECS),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Set the SQLite database path
    pub fn database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Set the civil timezone
    pub fn timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = tz.into();
        self
    }

    /// Set the default device identifier
    pub fn default_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.default_device_id = device_id.into();
        self
    }

    /// Set the log filter
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Check the configuration before the server starts.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::DatabasePath);
        }

        self.clock()?;

        let device_id = self.default_device_id.trim();
        if device_id.is_empty() || device_id.len() > MAX_DEVICE_ID_LENGTH {
            return Err(ConfigError::DeviceId(format!(
                "'{}' must be 1 to {MAX_DEVICE_ID_LENGTH} characters",
                self.default_device_id
            )));
        }

        EnvFilter::try_new(&self.log_level).map_err(|_| ConfigError::LogLevel(self.log_level.clone()))?;

        Ok(())
    }

    /// Wall clock in the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if the timezone name is unknown.
    pub fn clock(&self) -> Result<CivilClock, ConfigError> {
        Ok(CivilClock::from_name(&self.timezone)?)
    }
}

/// Fingerprint attendance server
#[derive(Parser, Debug)]
#[command(name = "rollcall", version, about)]
pub struct Cli {
    /// address to listen on
    #[arg(long, env = "ROLLCALL_LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: String,

    /// path to the sqlite database file
    #[arg(long, env = "ROLLCALL_DATABASE_PATH", default_value = DEFAULT_DATABASE_PATH)]
    pub database_path: String,

    /// civil timezone for schedules and timestamps
    #[arg(long, env = "ROLLCALL_TIMEZONE", default_value = DEFAULT_TIMEZONE)]
    pub timezone: String,

    /// device seeded at startup
    #[arg(long, env = "ROLLCALL_DEFAULT_DEVICE_ID", default_value = DEFAULT_DEVICE_ID)]
    pub default_device_id: String,

    /// display name of the seeded device
    #[arg(long, env = "ROLLCALL_DEFAULT_DEVICE_NAME", default_value = DEFAULT_DEVICE_NAME)]
    pub default_device_name: String,

    /// location of the seeded device
    #[arg(long, env = "ROLLCALL_DEFAULT_DEVICE_LOCATION", default_value = DEFAULT_DEVICE_LOCATION)]
    pub default_device_location: String,

    /// device poll timeout in seconds
    #[arg(long, env = "ROLLCALL_DEVICE_POLL_TIMEOUT", default_value_t = DEVICE_POLL_TIMEOUT_SECS)]
    pub device_poll_timeout: u64,

    /// log filter used when RUST_LOG is unset
    #[arg(long, env = "ROLLCALL_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

impl Cli {
    /// Turn parsed arguments into a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for an unparsable listen address or any setting
    /// rejected by [`ServerConfig::validate`].
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let listen_addr = self
            .listen_addr
            .parse()
            .map_err(|_| ConfigError::ListenAddr(self.listen_addr.clone()))?;

        let location = self.default_device_location.trim();
        let config = ServerConfig {
            listen_addr,
            database_path: self.database_path,
            timezone: self.timezone,
            default_device_id: self.default_device_id,
            default_device_name: self.default_device_name,
            default_device_location: (!location.is_empty()).then(|| location.to_string()),
            device_poll_timeout: Duration::from_secs(self.device_poll_timeout),
            log_level: self.log_level,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.default_device_id, "ESP32-01");
        assert_eq!(config.device_poll_timeout, Duration::from_secs(300));
    }

    #[rstest]
    #[case(ServerConfig::default().timezone("Mars/Olympus"))]
    #[case(ServerConfig::default().database_path("  "))]
    #[case(ServerConfig::default().default_device_id(""))]
    #[case(ServerConfig::default().default_device_id("X".repeat(51)))]
    fn test_invalid_config(#[case] config: ServerConfig) {
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let config = Cli::try_parse_from(["rollcall"]).unwrap().into_config().unwrap();
        assert_eq!(config.listen_addr.port(), 5000);
        assert_eq!(config.timezone, "Asia/Dhaka");
        assert_eq!(config.default_device_location.as_deref(), Some("Building A - Main Entrance"));
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "rollcall",
            "--listen-addr",
            "127.0.0.1:8080",
            "--timezone",
            "Europe/Berlin",
            "--default-device-location",
            "",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.timezone, "Europe/Berlin");
        assert_eq!(config.default_device_location, None);
    }

    #[test]
    fn test_cli_rejects_bad_listen_addr() {
        let cli = Cli::try_parse_from(["rollcall", "--listen-addr", "not-an-address"]).unwrap();
        assert!(matches!(cli.into_config(), Err(ConfigError::ListenAddr(_))));
    }
}
