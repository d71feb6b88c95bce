use chrono::NaiveDateTime;
use rollcall_core::{FingerprintSlot, Template, constants::TEMPLATE_SIZE};
use serde::{Deserialize, Serialize};

/// Student enrolled for fingerprint attendance
///
/// # Fields
///
/// * `id` - Auto-increment primary key
/// * `name` - Display name, required
/// * `email` - Optional, unique when present
/// * `student_code` - Optional external student number, unique when present
/// * `fingerprint_id` - Scanner slot holding this student's finger, unique
/// * `fingerprint_template` - Raw 512-byte template uploaded after enrollment
/// * `class_id` - Optional home class
///
/// The template is never serialized; clients only see whether one exists.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: i64,

    pub name: String,

    pub email: Option<String>,

    pub student_code: Option<String>,

    /// Scanner slot (>= 1)
    pub fingerprint_id: i64,

    #[serde(skip)]
    pub fingerprint_template: Option<Vec<u8>>,

    pub class_id: Option<i64>,

    pub created_at: NaiveDateTime,

    pub updated_at: NaiveDateTime,
}

impl Student {
    /// Fingerprint slot as a validated value.
    pub fn slot(&self) -> Option<FingerprintSlot> {
        FingerprintSlot::new(self.fingerprint_id).ok()
    }

    /// Returns `true` if a well-formed template is stored.
    pub fn has_template(&self) -> bool {
        self.fingerprint_template
            .as_ref()
            .is_some_and(|t| t.len() == TEMPLATE_SIZE)
    }

    /// Stored template, if present and well-formed.
    pub fn template(&self) -> Option<Template> {
        self.fingerprint_template
            .as_deref()
            .and_then(|bytes| Template::from_bytes(bytes).ok())
    }
}

/// Fields accepted when creating a student
#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub name: String,
    pub email: Option<String>,
    pub student_code: Option<String>,
    /// Slot to use; `None` assigns the next free slot.
    pub fingerprint_id: Option<FingerprintSlot>,
    pub class_id: Option<i64>,
}

/// Partial update of a student; `None` leaves a field unchanged
///
/// The nested options distinguish "leave as is" (`None`) from
/// "clear the value" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct StudentUpdate {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub student_code: Option<Option<String>>,
    pub fingerprint_id: Option<FingerprintSlot>,
    pub class_id: Option<Option<i64>>,
}

impl StudentUpdate {
    /// Apply the update to an existing row.
    pub fn apply_to(self, student: &mut Student) {
        if let Some(name) = self.name {
            student.name = name;
        }
        if let Some(email) = self.email {
            student.email = email;
        }
        if let Some(code) = self.student_code {
            student.student_code = code;
        }
        if let Some(slot) = self.fingerprint_id {
            student.fingerprint_id = slot.get();
        }
        if let Some(class_id) = self.class_id {
            student.class_id = class_id;
        }
    }
}
