use chrono::NaiveDateTime;
use rollcall_core::{CommandKind, CommandStatus, DeviceMode};
use serde::{Deserialize, Serialize};

/// A fingerprint scanner registered with the server
///
/// `current_class_id` is only ever set while `mode` is `attendance`; the
/// schema enforces this with a CHECK constraint.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: i64,
    /// Hardware identifier reported by the scanner (e.g. "ESP32-01")
    pub device_id: String,
    pub name: String,
    pub location: Option<String>,
    /// `idle`, `attendance` or `enrollment`
    pub mode: String,
    pub current_class_id: Option<i64>,
    pub is_active: bool,
    /// Last time the device polled or asked for its mode
    pub last_seen: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Device {
    /// Mode as an enum; unknown codes read as idle.
    pub fn get_mode(&self) -> DeviceMode {
        self.mode.parse().unwrap_or(DeviceMode::Idle)
    }

    /// Class attached to the device, if it is taking attendance.
    pub fn attendance_class(&self) -> Option<i64> {
        if self.get_mode().allows_class() {
            self.current_class_id
        } else {
            None
        }
    }
}

/// Instruction queued for a scanner
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Command {
    pub id: i64,
    pub device_id: String,
    /// `enroll` or `delete`
    pub command_type: String,
    pub fingerprint_id: i64,
    pub student_name: Option<String>,
    /// `pending`, `completed` or `failed`
    pub status: String,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
}

impl Command {
    pub fn get_kind(&self) -> Option<CommandKind> {
        self.command_type.parse().ok()
    }

    pub fn get_status(&self) -> Option<CommandStatus> {
        self.status.parse().ok()
    }

    /// Returns `true` while the command waits for the device.
    pub fn is_pending(&self) -> bool {
        self.get_status() == Some(CommandStatus::Pending)
    }
}
