//! Attendance state machine.
//!
//! Each (student, class, civil day) moves through three states: no record,
//! open entry (entry time set), closed (entry and exit set). A scan is
//! evaluated against these rules in order:
//!
//! 1. device in enrollment mode: rejected
//! 2. no class in its scheduled window: rejected
//! 3. latest record for the student in that class entered less than
//!    3 minutes ago: cooldown, nothing written
//! 4. today's record already closed: rejected
//! 5. today's record open: closed with the elapsed whole minutes
//! 6. otherwise: a new open record, late if more than 5 minutes after the
//!    scheduled start
//!
//! Business rejections are returned as [`ScanOutcome`] values, not errors.
//! All reads and the single write of a scan happen in the caller's
//! transaction; rejections write nothing.

use crate::error::{StorageError, StorageResult};
use crate::messages::DisplayMessages;
use crate::models::{Attendance, Device, NewAttendance, Student};
use crate::schedule::{self, ScheduledClass};
use crate::transaction;
use chrono::{Duration, NaiveDateTime};
use rollcall_biometric::{ByteEqualityMatcher, TemplateMatcher};
use rollcall_core::{
    AttendanceStatus, DeviceMode, FingerprintSlot, Template,
    constants::{LATE_GRACE_MINUTES, SCAN_COOLDOWN_MINUTES},
};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, warn};

/// How the scanner identified the finger
#[derive(Debug, Clone)]
pub enum ScanIdentity {
    /// The scanner matched on-device and reports the slot.
    Slot(FingerprintSlot),
    /// The scanner uploaded the raw template for server-side matching.
    Template(Template),
}

/// One attendance scan reported by a device
#[derive(Debug, Clone)]
pub struct Scan {
    pub identity: ScanIdentity,
    pub device_id: String,
    /// Confidence reported by the scanner for slot scans
    pub confidence: Option<i64>,
}

/// Reason a scan was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    StudentNotFound,
    FingerprintNotRecognized,
    EnrollmentMode,
    NoClassRunning,
    AlreadyRecorded,
}

impl Rejection {
    /// Stable machine-readable code.
    pub fn reason(self) -> &'static str {
        match self {
            Self::StudentNotFound => "student_not_found",
            Self::FingerprintNotRecognized => "fingerprint_not_recognized",
            Self::EnrollmentMode => "enrollment_mode",
            Self::NoClassRunning => "no_class_running",
            Self::AlreadyRecorded => "already_recorded",
        }
    }

    /// Human-readable message for the scanner display.
    pub fn message(self) -> &'static str {
        match self {
            Self::StudentNotFound => DisplayMessages::STUDENT_NOT_FOUND,
            Self::FingerprintNotRecognized => DisplayMessages::FINGERPRINT_NOT_RECOGNIZED,
            Self::EnrollmentMode => DisplayMessages::ENROLLMENT_MODE,
            Self::NoClassRunning => DisplayMessages::NO_CLASS_RUNNING,
            Self::AlreadyRecorded => DisplayMessages::ALREADY_RECORDED,
        }
    }

    /// Returns `true` if the finger could not be tied to a student.
    pub fn is_unidentified(self) -> bool {
        matches!(self, Self::StudentNotFound | Self::FingerprintNotRecognized)
    }
}

/// Entry or exit written for a scan
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub attendance: Attendance,
    pub student: Student,
    pub class: ScheduledClass,
}

/// Repeat scan inside the cooldown window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownNotice {
    pub student_id: i64,
    pub name: String,
    pub class_id: i64,
    /// Whole minutes left, rounded up, at least 1
    pub minutes_remaining: i64,
    pub seconds_remaining: i64,
}

/// Result of evaluating a scan
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Entry(SessionEvent),
    Exit(SessionEvent),
    Cooldown(CooldownNotice),
    Rejected(Rejection),
}

impl ScanOutcome {
    /// Short label used in logs and responses.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Entry(_) => "entry",
            Self::Exit(_) => "exit",
            Self::Cooldown(_) => "cooldown",
            Self::Rejected(_) => "error",
        }
    }
}

/// Time left in the cooldown window after `elapsed` since entry.
///
/// Returns `(minutes_remaining, seconds_remaining)` rounded up, or `None`
/// once the window has passed. A negative `elapsed` (entry in the future)
/// counts as zero.
pub fn cooldown_remaining(elapsed: Duration) -> Option<(i64, i64)> {
    let window = Duration::minutes(SCAN_COOLDOWN_MINUTES);
    let elapsed = elapsed.max(Duration::zero());
    if elapsed >= window {
        return None;
    }
    let remaining_ms = (window - elapsed).num_milliseconds();
    let seconds = (remaining_ms + 999) / 1000;
    let minutes = ((seconds + 59) / 60).max(1);
    Some((minutes, seconds))
}

/// Attendance status for an entry at `entry` into a class starting at `start`.
pub fn entry_status(start: NaiveDateTime, entry: NaiveDateTime) -> AttendanceStatus {
    if entry > start + Duration::minutes(LATE_GRACE_MINUTES) {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// Matched student and the confidence to record
#[derive(Debug, Clone)]
pub struct Identified {
    pub student: Student,
    pub confidence: Option<i64>,
}

/// Evaluates scans against the attendance rules
///
/// # Examples
///
/// ```no_run
/// use rollcall_storage::{AttendanceRecorder, Database, Scan, ScanIdentity, ScanOutcome};
/// use rollcall_core::FingerprintSlot;
/// use chrono::NaiveDate;
///
/// # async fn example(db: Database) -> Result<(), Box<dyn std::error::Error>> {
/// let recorder: AttendanceRecorder = AttendanceRecorder::default();
/// let now = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(10, 4, 0).unwrap();
///
/// let scan = Scan {
///     identity: ScanIdentity::Slot(FingerprintSlot::new(7)?),
///     device_id: "ESP32-01".to_string(),
///     confidence: Some(88),
/// };
///
/// let mut tx = db.begin().await?;
/// let outcome = recorder.record(&mut tx, &scan, now).await?;
/// tx.commit().await?;
///
/// if let ScanOutcome::Entry(event) = outcome {
///     println!("{} entered {}", event.student.name, event.class.class_name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AttendanceRecorder<M = ByteEqualityMatcher> {
    matcher: M,
}

impl<M: TemplateMatcher> AttendanceRecorder<M> {
    /// Create a recorder using `matcher` for template scans.
    pub fn new(matcher: M) -> Self {
        Self { matcher }
    }

    /// The template matcher in use.
    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Resolve the scan to a student.
    ///
    /// Template scans are compared against every stored template in
    /// ascending slot order; the best score at or above the threshold wins.
    pub async fn identify(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        scan: &Scan,
    ) -> StorageResult<Result<Identified, Rejection>> {
        match &scan.identity {
            ScanIdentity::Slot(slot) => {
                let student = transaction::find_student_by_slot(tx, *slot).await?;
                Ok(student
                    .map(|student| Identified {
                        student,
                        confidence: scan.confidence,
                    })
                    .ok_or(Rejection::StudentNotFound))
            }
            ScanIdentity::Template(probe) => {
                let enrolled = transaction::enrolled_templates(tx).await?;
                let best = self.matcher.best_candidate(
                    probe,
                    enrolled
                        .iter()
                        .map(|e| (e.student_id, e.fingerprint_template.as_slice())),
                );

                debug!(
                    candidates = enrolled.len(),
                    best_score = ?best.as_ref().map(|m| m.score),
                    "template compared"
                );

                let Some(found) = best.filter(|m| m.score >= self.matcher.threshold()) else {
                    return Ok(Err(Rejection::FingerprintNotRecognized));
                };

                let student = transaction::find_student(tx, found.key)
                    .await?
                    .ok_or_else(|| StorageError::not_found("Student", "id", found.key))?;

                Ok(Ok(Identified {
                    student,
                    confidence: Some(found.confidence()),
                }))
            }
        }
    }

    /// Evaluate a scan and apply at most one attendance mutation.
    ///
    /// # Errors
    ///
    /// Returns error only if database operations fail. Refusals such as
    /// cooldown or no class running return `Ok` with the outcome.
    pub async fn record(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        scan: &Scan,
        now: NaiveDateTime,
    ) -> StorageResult<ScanOutcome> {
        let Identified {
            student,
            confidence,
        } = match self.identify(tx, scan).await? {
            Ok(identified) => identified,
            Err(rejection) => return Ok(reject(rejection, scan, None)),
        };

        // Step 1: device mode
        let device = transaction::find_device(tx, &scan.device_id).await?;
        let mode = match &device {
            Some(d) => d.get_mode(),
            None => {
                warn!(device_id = %scan.device_id, "scan from unregistered device, treating as idle");
                DeviceMode::Idle
            }
        };
        if mode.is_enrollment() {
            return Ok(reject(Rejection::EnrollmentMode, scan, Some(&student)));
        }

        // Step 2: running class
        let preferred = device.as_ref().and_then(Device::attendance_class);
        let Some(class) = schedule::running_class(tx, now, preferred).await? else {
            return Ok(reject(Rejection::NoClassRunning, scan, Some(&student)));
        };

        // Step 3: cooldown since the latest entry
        if let Some(latest) = transaction::latest_attendance(tx, student.id, class.class_id).await?
            && let Some((minutes, seconds)) = cooldown_remaining(now - latest.entry_time)
        {
            info!(
                student_id = student.id,
                class_id = class.class_id,
                seconds_remaining = seconds,
                "scan ignored during cooldown"
            );
            return Ok(ScanOutcome::Cooldown(CooldownNotice {
                student_id: student.id,
                name: student.name,
                class_id: class.class_id,
                minutes_remaining: minutes,
                seconds_remaining: seconds,
            }));
        }

        // Steps 4 and 5: today's session
        match transaction::session_attendance(tx, student.id, class.class_id, now.date()).await? {
            Some(row) if row.is_closed() => {
                Ok(reject(Rejection::AlreadyRecorded, scan, Some(&student)))
            }
            Some(row) => self.close_session(tx, row, student, class, now).await,
            // Step 6: new entry
            None => {
                self.open_session(tx, scan, student, class, confidence, now)
                    .await
            }
        }
    }

    async fn open_session(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        scan: &Scan,
        student: Student,
        class: ScheduledClass,
        confidence: Option<i64>,
        now: NaiveDateTime,
    ) -> StorageResult<ScanOutcome> {
        let start = now.date().and_time(class.start_time);
        let status = entry_status(start, now);

        let entry = NewAttendance {
            student_id: student.id,
            class_id: Some(class.class_id),
            device_id: scan.device_id.clone(),
            status,
            confidence,
            entry_time: now,
            notes: None,
        };

        let id = match transaction::insert_attendance(tx, &entry, now).await {
            Ok(id) => id,
            // A concurrent scan opened the session first
            Err(e) if e.is_unique_violation() => {
                warn!(
                    student_id = student.id,
                    class_id = class.class_id,
                    "concurrent entry scan lost the session race"
                );
                let window = SCAN_COOLDOWN_MINUTES;
                return Ok(ScanOutcome::Cooldown(CooldownNotice {
                    student_id: student.id,
                    name: student.name,
                    class_id: class.class_id,
                    minutes_remaining: window,
                    seconds_remaining: window * 60,
                }));
            }
            Err(e) => return Err(e),
        };

        let attendance = transaction::find_attendance(tx, id)
            .await?
            .ok_or_else(|| StorageError::not_found("Attendance", "id", id))?;

        info!(
            attendance_id = id,
            student_id = student.id,
            class_id = class.class_id,
            status = %status,
            confidence = ?confidence,
            "entry recorded"
        );

        Ok(ScanOutcome::Entry(SessionEvent {
            attendance,
            student,
            class,
        }))
    }

    async fn close_session(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        open: Attendance,
        student: Student,
        class: ScheduledClass,
        now: NaiveDateTime,
    ) -> StorageResult<ScanOutcome> {
        let duration = (now - open.entry_time).num_minutes().max(0);

        if !transaction::close_attendance(tx, open.id, now, duration).await? {
            warn!(attendance_id = open.id, "session closed concurrently");
            return Ok(ScanOutcome::Rejected(Rejection::AlreadyRecorded));
        }

        let attendance = transaction::find_attendance(tx, open.id)
            .await?
            .ok_or_else(|| StorageError::not_found("Attendance", "id", open.id))?;

        info!(
            attendance_id = open.id,
            student_id = student.id,
            class_id = class.class_id,
            duration_minutes = duration,
            "exit recorded"
        );

        Ok(ScanOutcome::Exit(SessionEvent {
            attendance,
            student,
            class,
        }))
    }
}

fn reject(rejection: Rejection, scan: &Scan, student: Option<&Student>) -> ScanOutcome {
    warn!(
        reason = rejection.reason(),
        device_id = %scan.device_id,
        student_id = ?student.map(|s| s.id),
        "scan rejected"
    );
    ScanOutcome::Rejected(rejection)
}
