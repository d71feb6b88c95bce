use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Biometric errors
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid fingerprint slot: {0}")]
    InvalidSlot(i64),

    // Domain value errors
    #[error("Invalid {kind}: {value}")]
    InvalidCode { kind: &'static str, value: String },

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    // Configuration errors
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
