//! Core constants for the Rollcall attendance system.
//!
//! This module centralizes the fixed values that define how scans are
//! matched and how attendance sessions are opened and closed. Stored
//! fingerprint templates and recorded attendance depend on these values,
//! so changing them changes the meaning of existing data.
//!
//! # Usage
//!
//! ```
//! use rollcall_core::constants::*;
//!
//! assert_eq!(TEMPLATE_SIZE, 512);
//! assert_eq!(MATCH_THRESHOLD_PERCENT, 40.0);
//! assert_eq!(SCAN_COOLDOWN_MINUTES, 3);
//! ```

// ============================================================================
// Fingerprint Templates
// ============================================================================

/// Size of a raw fingerprint template captured by a scanner (bytes).
///
/// Scanners upload the characteristic buffer of the sensor as-is. Templates
/// of any other length are rejected on upload and skipped during matching.
pub const TEMPLATE_SIZE: usize = 512;

/// Minimum similarity (percent of equal byte positions) for a match.
///
/// # Value: 40.0
///
/// # Examples
///
/// ```
/// use rollcall_core::constants::MATCH_THRESHOLD_PERCENT;
///
/// let score = 41.2_f64;
/// assert!(score >= MATCH_THRESHOLD_PERCENT);
/// ```
pub const MATCH_THRESHOLD_PERCENT: f64 = 40.0;

/// Lowest valid fingerprint slot on a scanner.
pub const MIN_FINGERPRINT_SLOT: i64 = 1;

// ============================================================================
// Attendance Windows
// ============================================================================

/// Minutes after an entry during which repeat scans are ignored.
pub const SCAN_COOLDOWN_MINUTES: i64 = 3;

/// Grace period after the scheduled start before an entry counts as late.
///
/// An entry is late only when it happens *more than* this many minutes
/// after the start time; an entry exactly at the boundary is present.
pub const LATE_GRACE_MINUTES: i64 = 5;

// ============================================================================
// Devices
// ============================================================================

/// Identifier of the scanner seeded on first start.
pub const DEFAULT_DEVICE_ID: &str = "ESP32-01";

/// Display name of the seeded scanner.
pub const DEFAULT_DEVICE_NAME: &str = "Main Entrance Device";

/// Location of the seeded scanner.
pub const DEFAULT_DEVICE_LOCATION: &str = "Building A - Main Entrance";

/// Seconds a device may go without polling before it is considered stale.
///
/// Reported to operators only. Pending commands never expire.
pub const DEVICE_POLL_TIMEOUT_SECS: u64 = 300;

/// Maximum length of a device identifier.
pub const MAX_DEVICE_ID_LENGTH: usize = 50;

// ============================================================================
// Time
// ============================================================================

/// Civil timezone used for schedules and attendance timestamps.
pub const DEFAULT_TIMEZONE: &str = "Asia/Dhaka";

// ============================================================================
// Queries
// ============================================================================

/// Default page size for attendance listings.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Upper bound for any listing page size.
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Number of rows shown in "recent" and "top" summaries.
pub const SUMMARY_ROWS: i64 = 10;
