use chrono::{NaiveDate, NaiveDateTime};
use rollcall_core::AttendanceStatus;
use serde::{Deserialize, Serialize};

/// One entry/exit session of a student in a class
///
/// A row is created open (`exit_time` NULL) on the entry scan and closed at
/// most once by a later exit scan, which fills `exit_time` and
/// `duration_minutes`. `session_date` is the civil date of the entry and
/// together with student and class forms a unique key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendance {
    pub id: i64,
    pub student_id: i64,
    pub class_id: Option<i64>,
    pub device_id: String,
    /// `present`, `late` or `absent`
    pub status: String,
    /// Match confidence in percent, if known
    pub confidence: Option<i64>,
    pub entry_time: NaiveDateTime,
    pub exit_time: Option<NaiveDateTime>,
    pub duration_minutes: Option<i64>,
    pub session_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Attendance {
    pub fn get_status(&self) -> Option<AttendanceStatus> {
        self.status.parse().ok()
    }

    /// Entered but not yet exited.
    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    /// Both entry and exit recorded.
    pub fn is_closed(&self) -> bool {
        self.exit_time.is_some()
    }
}

/// Attendance row joined with student and class names for display
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub attendance: Attendance,
    pub student_name: Option<String>,
    pub class_name: Option<String>,
}

/// Attendance row to insert
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub student_id: i64,
    pub class_id: Option<i64>,
    pub device_id: String,
    pub status: AttendanceStatus,
    pub confidence: Option<i64>,
    pub entry_time: NaiveDateTime,
    pub notes: Option<String>,
}

/// Filters for listing attendance
#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub student_id: Option<i64>,
    pub class_id: Option<i64>,
    /// Civil date of the session
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

/// Status counts over a set of attendance rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub total: i64,
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    /// `present / total * 100`, rounded to two decimals; 0 when empty
    pub attendance_rate: f64,
}

impl AttendanceStats {
    /// Build stats from raw counts.
    pub fn from_counts(total: i64, present: i64, absent: i64, late: i64) -> Self {
        let attendance_rate = if total > 0 {
            (present as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            total,
            present,
            absent,
            late,
            attendance_rate,
        }
    }
}

/// Number of attendance rows for one student in a report window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentTally {
    pub student_id: i64,
    pub name: String,
    pub count: i64,
}

/// Attendance summary over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub class_id: Option<i64>,
    #[serde(flatten)]
    pub stats: AttendanceStats,
    /// Students with the most records, highest first
    pub top_students: Vec<StudentTally>,
}
