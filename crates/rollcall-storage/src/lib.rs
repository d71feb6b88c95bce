//! Storage layer for the Rollcall attendance server.
//!
//! This crate provides SQLite-backed persistence for students, classes and
//! their weekly schedules, scanner devices, the device command queue and
//! attendance records, along with the attendance state machine that turns
//! fingerprint scans into entry and exit records.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool manager with embedded migrations
//! - [`StudentRepository`], [`ClassRepository`], [`DeviceRepository`],
//!   [`CommandRepository`], [`AttendanceRepository`] - Data access traits
//! - [`AttendanceRecorder`] - Scan evaluation (entry, exit, cooldown, rejections)
//! - [`commands`] - Issue, poll and complete device commands
//! - [`schedule`] - Resolve the class running at a civil date and time
//! - [`transaction`] - Transaction-aware building blocks shared by the above
//!
//! # Transactions
//!
//! Every state transition runs inside a request-scoped
//! [`sqlx::Transaction`] that the caller begins, passes down and commits
//! once. Dropping it on an error path rolls everything back, so a scan
//! either fully applies or leaves no trace.
//!
//! A unique index on `(student_id, class_id, session_date)` backs the
//! one-session-per-day rule when two scans race.
//!
//! # Time
//!
//! All timestamps are civil wall-clock values (`NaiveDateTime`) in the
//! server's configured timezone. Nothing in this crate reads the system
//! clock; callers pass `now` in.
//!
//! # Examples
//!
//! ## Recording a Scan
//!
//! ```no_run
//! use rollcall_storage::{AttendanceRecorder, Database, DatabaseConfig, Scan, ScanIdentity, ScanOutcome};
//! use rollcall_core::{Clock, CivilClock, FingerprintSlot};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("rollcall.db")).await?;
//! let clock = CivilClock::from_name("Asia/Dhaka")?;
//! let recorder: AttendanceRecorder = AttendanceRecorder::default();
//!
//! let scan = Scan {
//!     identity: ScanIdentity::Slot(FingerprintSlot::new(7)?),
//!     device_id: "ESP32-01".to_string(),
//!     confidence: Some(92),
//! };
//!
//! let mut tx = db.begin().await?;
//! match recorder.record(&mut tx, &scan, clock.now()).await? {
//!     ScanOutcome::Entry(event) => println!("entry {}", event.attendance.id),
//!     ScanOutcome::Exit(event) => println!("exit after {:?} min", event.attendance.duration_minutes),
//!     ScanOutcome::Cooldown(notice) => println!("wait {} min", notice.minutes_remaining),
//!     ScanOutcome::Rejected(rejection) => println!("{}", rejection.message()),
//! }
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using Repositories Directly
//!
//! ```no_run
//! use rollcall_storage::{Database, DatabaseConfig};
//! use rollcall_storage::repositories::{SqliteStudentRepository, StudentRepository};
//! use rollcall_core::FingerprintSlot;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("rollcall.db")).await?;
//! let students = SqliteStudentRepository::new(db.pool().clone());
//!
//! if let Some(student) = students.find_by_fingerprint(FingerprintSlot::new(7)?).await? {
//!     println!("{} (template stored: {})", student.name, student.has_template());
//! }
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod connection;
pub mod error;
pub mod messages;
pub mod models;
pub mod recorder;
pub mod repositories;
pub mod schedule;
pub mod transaction;

pub use commands::{CommandCompletion, CompletedCommand};
pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use messages::DisplayMessages;
pub use models::{
    Attendance, AttendanceFilter, AttendanceReport, AttendanceStats, AttendanceView, Class, ClassInput,
    ClassSchedule, Command, Device, NewAttendance, NewStudent, ScheduleSlot, Student, StudentTally,
    StudentUpdate,
};
pub use recorder::{AttendanceRecorder, CooldownNotice, Rejection, Scan, ScanIdentity, ScanOutcome, SessionEvent};
pub use repositories::{
    AttendanceRepository, ClassRepository, CommandRepository, DeviceRepository, ManualMark,
    SqliteAttendanceRepository, SqliteClassRepository, SqliteCommandRepository, SqliteDeviceRepository,
    SqliteStudentRepository, StudentRepository, clamp_limit, validate_slots,
};
pub use schedule::ScheduledClass;
