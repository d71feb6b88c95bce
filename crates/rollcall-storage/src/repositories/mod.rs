pub mod attendance;
pub mod class;
pub mod command;
pub mod device;
pub mod student;

pub use attendance::{AttendanceRepository, ManualMark, SqliteAttendanceRepository, clamp_limit};
pub use class::{ClassRepository, SqliteClassRepository, validate_slots};
pub use command::{CommandRepository, SqliteCommandRepository};
pub use device::{DeviceRepository, SqliteDeviceRepository};
pub use student::{SqliteStudentRepository, StudentRepository};
