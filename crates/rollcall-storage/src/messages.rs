//! Messages returned to scanners for attendance outcomes
//!
//! Scanners show these on a small OLED display, so they are kept short
//! and ASCII-only.
//!
//! # Usage
//!
//! ```
//! use rollcall_storage::messages::DisplayMessages;
//!
//! assert_eq!(DisplayMessages::NO_CLASS_RUNNING, "No class is currently running");
//! assert_eq!(
//!     DisplayMessages::cooldown(2),
//!     "Please wait 2 minute(s) before scanning again"
//! );
//! ```

/// Display messages for attendance verification
pub struct DisplayMessages;

impl DisplayMessages {
    /// No student holds the scanned fingerprint slot.
    pub const STUDENT_NOT_FOUND: &'static str = "Student not found";

    /// No stored template reached the match threshold.
    pub const FINGERPRINT_NOT_RECOGNIZED: &'static str = "Fingerprint not recognized";

    /// The scanning device is enrolling fingerprints.
    pub const ENROLLMENT_MODE: &'static str = "Device is in enrollment mode";

    /// No class schedule covers the current time.
    pub const NO_CLASS_RUNNING: &'static str = "No class is currently running";

    /// Entry and exit were both recorded for today's session.
    pub const ALREADY_RECORDED: &'static str = "Attendance already recorded for this class today";

    /// Entry recorded.
    pub fn entry(name: &str, class_name: &str) -> String {
        format!("Welcome {name}, entry recorded for {class_name}")
    }

    /// Exit recorded.
    pub fn exit(name: &str, class_name: &str, minutes: i64) -> String {
        format!("Goodbye {name}, exit recorded for {class_name} ({minutes} min)")
    }

    /// Repeat scan inside the cooldown window.
    pub fn cooldown(minutes_remaining: i64) -> String {
        format!("Please wait {minutes_remaining} minute(s) before scanning again")
    }
}
