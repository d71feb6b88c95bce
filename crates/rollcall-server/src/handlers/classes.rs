//! Class and weekly schedule endpoints

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use chrono::{NaiveDate, NaiveDateTime};
use rollcall_core::{DayOfWeek, parse_time_of_day};
use rollcall_storage::{
    Class, ClassInput, ClassRepository, ClassSchedule, Device, DeviceRepository, ScheduleSlot, ScheduledClass,
    schedule, validate_slots,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::handlers::extract::double_option;
use crate::handlers::students::StudentResponse;
use crate::handlers::{ApiError, JsonBody, MessageResponse, OptionExt, PathParam, QueryParams, ResultExt};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/classes", get(list_classes).post(create_class))
        .route("/api/classes/active", get(active_class))
        .route(
            "/api/classes/{id}",
            get(get_class).put(update_class).delete(delete_class),
        )
        .route("/api/classes/{id}/students", get(class_students))
        .route("/api/classes/{id}/schedules", get(get_schedules).put(put_schedules))
}

/// One weekly meeting as sent by clients
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    /// Lowercase English day name, e.g. `monday`
    pub day_of_week: String,
    /// `HH:MM` or `HH:MM:SS`
    pub start_time: String,
    pub end_time: String,
}

impl TryFrom<&ScheduleRequest> for ScheduleSlot {
    type Error = ApiError;

    fn try_from(req: &ScheduleRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            day: req.day_of_week.parse::<DayOfWeek>()?,
            start_time: parse_time_of_day(&req.start_time)?,
            end_time: parse_time_of_day(&req.end_time)?,
        })
    }
}

fn parse_slots(requests: &[ScheduleRequest]) -> Result<Vec<ScheduleSlot>, ApiError> {
    let slots = requests
        .iter()
        .map(ScheduleSlot::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    validate_slots(&slots)?;
    Ok(slots)
}

/// Class with its schedule and enrollment count
#[derive(Debug, Serialize)]
pub struct ClassResponse {
    #[serde(flatten)]
    pub class: Class,
    pub student_count: i64,
    pub schedules: Vec<ClassSchedule>,
}

async fn describe(state: &AppState, class: Class) -> Result<ClassResponse, ApiError> {
    let repo = state.classes();
    let student_count = repo.student_count(class.id).await?;
    let schedules = repo.schedules(class.id).await?;
    Ok(ClassResponse {
        class,
        student_count,
        schedules,
    })
}

#[derive(Debug, Serialize)]
pub struct ClassListResponse {
    pub classes: Vec<ClassResponse>,
}

#[derive(Debug, Serialize)]
pub struct ClassMutationResponse {
    pub message: &'static str,
    pub class: ClassResponse,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Only active classes when `true`
    #[serde(default)]
    pub active: bool,
}

/// `GET /api/classes`
async fn list_classes(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<ClassListResponse>, ApiError> {
    let classes = state.classes().list(query.active).await?;

    let mut described = Vec::with_capacity(classes.len());
    for class in classes {
        described.push(describe(&state, class).await?);
    }

    Ok(Json(ClassListResponse { classes: described }))
}

#[derive(Debug, Deserialize)]
pub struct CreateClassRequest {
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub teacher_name: Option<String>,
    pub is_active: Option<bool>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_classes: Option<i64>,
    #[serde(default)]
    pub schedules: Vec<ScheduleRequest>,
}

/// `POST /api/classes`
async fn create_class(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateClassRequest>,
) -> Result<(StatusCode, Json<ClassMutationResponse>), ApiError> {
    let slots = parse_slots(&req.schedules)?;

    let input = ClassInput {
        name: req.name,
        code: req.code,
        description: req.description,
        teacher_name: req.teacher_name,
        is_active: req.is_active.unwrap_or(true),
        start_date: req.start_date,
        end_date: req.end_date,
        total_classes: req.total_classes,
    };

    let repo = state.classes();
    let class = repo.create(&input, state.now()).await?;
    if !slots.is_empty() {
        repo.replace_schedules(class.id, &slots).await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(ClassMutationResponse {
            message: "Class created successfully",
            class: describe(&state, class).await?,
        }),
    ))
}

/// `GET /api/classes/{id}`
async fn get_class(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ClassResponse>, ApiError> {
    let class = state
        .classes()
        .find_by_id(id)
        .await?
        .or_not_found("Class not found")?;
    Ok(Json(describe(&state, class).await?))
}

/// Partial update; `null` clears an optional field
#[derive(Debug, Default, Deserialize)]
pub struct UpdateClassRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub code: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub teacher_name: Option<Option<String>>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub total_classes: Option<Option<i64>>,
}

impl UpdateClassRequest {
    fn apply_to(self, input: &mut ClassInput) {
        if let Some(name) = self.name {
            input.name = name;
        }
        if let Some(code) = self.code {
            input.code = code;
        }
        if let Some(description) = self.description {
            input.description = description;
        }
        if let Some(teacher) = self.teacher_name {
            input.teacher_name = teacher;
        }
        if let Some(active) = self.is_active {
            input.is_active = active;
        }
        if let Some(start) = self.start_date {
            input.start_date = start;
        }
        if let Some(end) = self.end_date {
            input.end_date = end;
        }
        if let Some(total) = self.total_classes {
            input.total_classes = total;
        }
    }
}

/// `PUT /api/classes/{id}`
async fn update_class(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdateClassRequest>,
) -> Result<Json<ClassMutationResponse>, ApiError> {
    let repo = state.classes();
    let current = repo.find_by_id(id).await?.or_not_found("Class not found")?;

    let mut input = ClassInput::from(current);
    req.apply_to(&mut input);
    let class = repo.update(id, &input).await?;

    Ok(Json(ClassMutationResponse {
        message: "Class updated successfully",
        class: describe(&state, class).await?,
    }))
}

/// `DELETE /api/classes/{id}`
///
/// Devices following the class drop back to idle.
async fn delete_class(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.classes().delete(id).await?;
    Ok(Json(MessageResponse::new("Class deleted successfully")))
}

#[derive(Debug, Serialize)]
pub struct ClassStudentsResponse {
    pub class: Class,
    pub students: Vec<StudentResponse>,
}

/// `GET /api/classes/{id}/students`
async fn class_students(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ClassStudentsResponse>, ApiError> {
    let repo = state.classes();
    let class = repo.find_by_id(id).await?.or_not_found("Class not found")?;
    let students = repo.students(id).await?;

    Ok(Json(ClassStudentsResponse {
        class,
        students: students.into_iter().map(StudentResponse::from).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ScheduleListResponse {
    pub class_id: i64,
    pub schedules: Vec<ClassSchedule>,
}

/// `GET /api/classes/{id}/schedules`
async fn get_schedules(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ScheduleListResponse>, ApiError> {
    let repo = state.classes();
    repo.find_by_id(id).await?.or_not_found("Class not found")?;
    let schedules = repo.schedules(id).await?;
    Ok(Json(ScheduleListResponse { class_id: id, schedules }))
}

#[derive(Debug, Deserialize)]
pub struct ReplaceSchedulesRequest {
    pub schedules: Vec<ScheduleRequest>,
}

/// `PUT /api/classes/{id}/schedules`
///
/// Replaces the whole weekly schedule; an empty list clears it.
async fn put_schedules(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(req): JsonBody<ReplaceSchedulesRequest>,
) -> Result<Json<ScheduleListResponse>, ApiError> {
    let slots = parse_slots(&req.schedules)?;
    let schedules = state.classes().replace_schedules(id, &slots).await?;
    Ok(Json(ScheduleListResponse { class_id: id, schedules }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ActiveQuery {
    /// Prefer the class this device is assigned to
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActiveClassResponse {
    pub active: bool,
    pub class: Option<ScheduledClass>,
    pub checked_at: NaiveDateTime,
}

/// `GET /api/classes/active`
async fn active_class(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ActiveQuery>,
) -> Result<Json<ActiveClassResponse>, ApiError> {
    let now = state.now();

    let preferred = match query.device_id.as_deref() {
        Some(device_id) => state
            .devices()
            .find_by_device_id(device_id)
            .await?
            .as_ref()
            .and_then(Device::attendance_class),
        None => None,
    };

    let mut tx = state.db.begin().await?;
    let class = schedule::running_class(&mut tx, now, preferred).await?;
    tx.commit().await.map_internal()?;

    Ok(Json(ActiveClassResponse {
        active: class.is_some(),
        class,
        checked_at: now,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn request(day: &str, start: &str, end: &str) -> ScheduleRequest {
        ScheduleRequest {
            day_of_week: day.to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[test]
    fn test_parse_slots() {
        let slots = parse_slots(&[request("monday", "10:00", "11:00"), request("friday", "09:30", "10:15")]).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].day, DayOfWeek::Monday);
        assert_eq!(slots[1].start_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_slots_rejects_bad_input() {
        let err = parse_slots(&[request("funday", "10:00", "11:00")]).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = parse_slots(&[request("monday", "25:00", "26:00")]).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = parse_slots(&[request("monday", "11:00", "10:00")]).unwrap_err();
        assert!(err.message().contains("end_time"));

        let err = parse_slots(&[request("monday", "09:00", "10:00"), request("monday", "13:00", "14:00")]).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_update_request_patches_only_given_fields() {
        let mut input = ClassInput::named("Math").code("M101");
        let req: UpdateClassRequest = serde_json::from_str(r#"{"code":null,"is_active":false}"#).unwrap();
        req.apply_to(&mut input);
        assert_eq!(input.name, "Math");
        assert_eq!(input.code, None);
        assert!(!input.is_active);
    }
}
