//! Student management endpoints
//!
//! Also queues fingerprint enrollment and deletion commands for scanners.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use rollcall_core::{CommandKind, FingerprintSlot};
use rollcall_storage::{Command, NewStudent, Student, StudentRepository, StudentUpdate, commands, transaction};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::handlers::extract::{double_option, optional_json};
use crate::handlers::{ApiError, JsonBody, MessageResponse, OptionExt, PathParam, QueryParams, ResultExt};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/students", get(list_students).post(create_student))
        .route(
            "/api/students/{id}",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/api/students/by-fingerprint/{fingerprint_id}", get(get_by_fingerprint))
        .route("/api/students/{id}/enroll", post(enroll))
        .route("/api/students/{id}/delete-fingerprint", post(delete_fingerprint))
}

/// Student as returned by the API
///
/// The template itself is never exposed, only whether one is stored.
#[derive(Debug, Serialize)]
pub struct StudentResponse {
    #[serde(flatten)]
    pub student: Student,
    pub has_template: bool,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        Self {
            has_template: student.has_template(),
            student,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StudentListResponse {
    pub students: Vec<StudentResponse>,
}

#[derive(Debug, Serialize)]
pub struct StudentMutationResponse {
    pub message: &'static str,
    pub student: StudentResponse,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub class_id: Option<i64>,
    /// Case-insensitive substring of name, email or student code
    pub search: Option<String>,
}

/// `GET /api/students`
async fn list_students(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<StudentListResponse>, ApiError> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let students = state.students().list(query.class_id, search).await?;

    Ok(Json(StudentListResponse {
        students: students.into_iter().map(StudentResponse::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    pub email: Option<String>,
    pub student_code: Option<String>,
    /// Assigned automatically when omitted
    pub fingerprint_id: Option<FingerprintSlot>,
    pub class_id: Option<i64>,
}

impl From<CreateStudentRequest> for NewStudent {
    fn from(req: CreateStudentRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            student_code: req.student_code,
            fingerprint_id: req.fingerprint_id,
            class_id: req.class_id,
        }
    }
}

/// `POST /api/students`
async fn create_student(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateStudentRequest>,
) -> Result<(StatusCode, Json<StudentMutationResponse>), ApiError> {
    let student = state.students().create(&req.into(), state.now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(StudentMutationResponse {
            message: "Student created successfully",
            student: student.into(),
        }),
    ))
}

/// `GET /api/students/{id}`
async fn get_student(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<StudentResponse>, ApiError> {
    let student = state
        .students()
        .find_by_id(id)
        .await?
        .or_not_found("Student not found")?;
    Ok(Json(student.into()))
}

/// `GET /api/students/by-fingerprint/{fingerprint_id}`
async fn get_by_fingerprint(
    State(state): State<AppState>,
    PathParam(slot): PathParam<i64>,
) -> Result<Json<StudentResponse>, ApiError> {
    let slot = FingerprintSlot::new(slot)?;
    let student = state
        .students()
        .find_by_fingerprint(slot)
        .await?
        .or_not_found("Student not found")?;
    Ok(Json(student.into()))
}

/// Partial update; `null` clears an optional field
#[derive(Debug, Default, Deserialize)]
pub struct UpdateStudentRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub student_code: Option<Option<String>>,
    pub fingerprint_id: Option<FingerprintSlot>,
    #[serde(default, deserialize_with = "double_option")]
    pub class_id: Option<Option<i64>>,
}

impl From<UpdateStudentRequest> for StudentUpdate {
    fn from(req: UpdateStudentRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            student_code: req.student_code,
            fingerprint_id: req.fingerprint_id,
            class_id: req.class_id,
        }
    }
}

/// `PUT /api/students/{id}`
async fn update_student(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdateStudentRequest>,
) -> Result<Json<StudentMutationResponse>, ApiError> {
    let student = state.students().update(id, req.into(), state.now()).await?;

    Ok(Json(StudentMutationResponse {
        message: "Student updated successfully",
        student: student.into(),
    }))
}

/// `DELETE /api/students/{id}`
async fn delete_student(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.students().delete(id).await?;
    Ok(Json(MessageResponse::new("Student deleted successfully")))
}

/// Target scanner for a queued command; the body may be omitted
#[derive(Debug, Default, Deserialize)]
pub struct CommandTarget {
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommandCreatedResponse {
    pub message: &'static str,
    pub command: Command,
}

async fn queue_command(
    state: &AppState,
    id: i64,
    kind: CommandKind,
    body: &[u8],
) -> Result<Command, ApiError> {
    let target: CommandTarget = optional_json(body)?;
    let device_id = state.device_or_default(target.device_id);
    let now = state.now();

    let mut tx = state.db.begin_immediate().await?;
    let student = transaction::find_student(&mut tx, id)
        .await?
        .or_not_found("Student not found")?;
    let command = commands::issue(&mut tx, &student, kind, &device_id, now).await?;
    tx.commit().await.map_internal()?;

    Ok(command)
}

/// `POST /api/students/{id}/enroll`
///
/// Queues an enroll command and puts the scanner into enrollment mode.
async fn enroll(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    body: Bytes,
) -> Result<(StatusCode, Json<CommandCreatedResponse>), ApiError> {
    let command = queue_command(&state, id, CommandKind::Enroll, &body).await?;

    Ok((
        StatusCode::CREATED,
        Json(CommandCreatedResponse {
            message: "Enrollment command created",
            command,
        }),
    ))
}

/// `POST /api/students/{id}/delete-fingerprint`
async fn delete_fingerprint(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    body: Bytes,
) -> Result<(StatusCode, Json<CommandCreatedResponse>), ApiError> {
    let command = queue_command(&state, id, CommandKind::Delete, &body).await?;

    Ok((
        StatusCode::CREATED,
        Json(CommandCreatedResponse {
            message: "Delete fingerprint command created",
            command,
        }),
    ))
}
