pub mod attendance;
pub mod class;
pub mod device;
pub mod student;

pub use attendance::{
    Attendance, AttendanceFilter, AttendanceReport, AttendanceStats, AttendanceView,
    NewAttendance, StudentTally,
};
pub use class::{Class, ClassInput, ClassSchedule, ScheduleSlot};
pub use device::{Command, Device};
pub use student::{NewStudent, Student, StudentUpdate};
