use crate::{
    Result,
    constants::{MIN_FINGERPRINT_SLOT, TEMPLATE_SIZE},
    error::Error,
};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fingerprint slot on a scanner (positive integer, unique per student)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct FingerprintSlot(i64);

impl FingerprintSlot {
    /// Create a new fingerprint slot with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidSlot` if the slot is lower than 1.
    pub fn new(slot: i64) -> Result<Self> {
        if slot < MIN_FINGERPRINT_SLOT {
            return Err(Error::InvalidSlot(slot));
        }
        Ok(FingerprintSlot(slot))
    }

    /// Get the raw slot number.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.0
    }

    /// The slot following this one, used for auto-assignment.
    #[must_use]
    pub fn next(&self) -> Self {
        FingerprintSlot(self.0 + 1)
    }
}

impl TryFrom<i64> for FingerprintSlot {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        FingerprintSlot::new(value)
    }
}

impl From<FingerprintSlot> for i64 {
    fn from(slot: FingerprintSlot) -> i64 {
        slot.0
    }
}

impl fmt::Display for FingerprintSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw fingerprint template (exactly 512 bytes)
///
/// Scanners exchange templates as hex strings; on the wire this type
/// serializes to and from lowercase hex.
#[derive(Clone, PartialEq, Eq)]
pub struct Template([u8; TEMPLATE_SIZE]);

impl Template {
    /// Create a template from raw bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidTemplate` if `bytes` is not exactly 512 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let buf: [u8; TEMPLATE_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidTemplate(format!(
                "expected {TEMPLATE_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Template(buf))
    }

    /// Parse a template from a hex string.
    ///
    /// Surrounding whitespace is ignored; both upper and lower case digits
    /// are accepted.
    ///
    /// # Errors
    /// Returns `Error::InvalidTemplate` if the string is not valid hex or does
    /// not decode to exactly 512 bytes.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| Error::InvalidTemplate(format!("malformed hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Encode the template as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Borrow the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; TEMPLATE_SIZE] {
        &self.0
    }

    /// Copy the raw bytes into a vector for storage.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Template({}..)", hex::encode(&self.0[..4]))
    }
}

impl Serialize for Template {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Template {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Template::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Operating mode of a scanner device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    /// Not capturing anything for the server.
    Idle,
    /// Scans are verified and recorded as attendance.
    Attendance,
    /// Scans capture new fingerprints; attendance is refused.
    Enrollment,
}

impl DeviceMode {
    /// Database/wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceMode::Idle => "idle",
            DeviceMode::Attendance => "attendance",
            DeviceMode::Enrollment => "enrollment",
        }
    }

    /// Returns `true` if the device is enrolling fingerprints.
    #[inline]
    #[must_use]
    pub fn is_enrollment(self) -> bool {
        matches!(self, DeviceMode::Enrollment)
    }

    /// Returns `true` if a current class may be attached in this mode.
    #[inline]
    #[must_use]
    pub fn allows_class(self) -> bool {
        matches!(self, DeviceMode::Attendance)
    }
}

impl FromStr for DeviceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(DeviceMode::Idle),
            "attendance" => Ok(DeviceMode::Attendance),
            "enrollment" => Ok(DeviceMode::Enrollment),
            _ => Err(Error::InvalidCode {
                kind: "device mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instruction queued for a scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Capture a fingerprint into the given slot.
    Enroll,
    /// Erase the fingerprint stored in the given slot.
    Delete,
}

impl CommandKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Enroll => "enroll",
            CommandKind::Delete => "delete",
        }
    }
}

impl FromStr for CommandKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enroll" => Ok(CommandKind::Enroll),
            "delete" => Ok(CommandKind::Delete),
            _ => Err(Error::InvalidCode {
                kind: "command type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a queued command: pending → completed | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Completed,
    Failed,
}

impl CommandStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
        }
    }

    /// Returns `true` for completed and failed commands.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, CommandStatus::Pending)
    }
}

impl FromStr for CommandStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(CommandStatus::Pending),
            "completed" => Ok(CommandStatus::Completed),
            "failed" => Ok(CommandStatus::Failed),
            _ => Err(Error::InvalidCode {
                kind: "command status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status recorded on an attendance entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

impl AttendanceStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Absent => "absent",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "late" => Ok(AttendanceStatus::Late),
            "absent" => Ok(AttendanceStatus::Absent),
            _ => Err(Error::InvalidCode {
                kind: "attendance status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Day of the week a class meets, stored as a lowercase English name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// All days, Monday first.
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl FromStr for DayOfWeek {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        DayOfWeek::ALL
            .into_iter()
            .find(|d| d.as_str() == lower)
            .ok_or_else(|| Error::InvalidCode {
                kind: "day of week",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a time of day given as `HH:MM` or `HH:MM:SS`.
///
/// # Errors
/// Returns `Error::InvalidTime` if neither format matches.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| Error::InvalidTime(format!("'{s}': {e}")))
}
