//! Attendance endpoints: scan verification, manual marks and reporting

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use rollcall_core::{AttendanceStatus, FingerprintSlot, Template};
use rollcall_storage::{
    Attendance, AttendanceFilter, AttendanceReport, AttendanceRepository, AttendanceStats, AttendanceView,
    CooldownNotice, DisplayMessages, ManualMark, Scan, ScanIdentity, ScanOutcome, SessionEvent,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::AppState;
use crate::handlers::{ApiError, JsonBody, MessageResponse, OptionExt, PathParam, QueryParams, ResultExt};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/attendance", get(list_attendance))
        .route("/api/attendance/verify", post(verify))
        .route("/api/attendance/mark", post(mark))
        .route("/api/attendance/stats", get(stats))
        .route("/api/attendance/report", get(report))
        .route("/api/attendance/{id}", get(get_attendance).delete(delete_attendance))
}

/// Scan reported by a device
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Slot matched on the device
    pub fingerprint_id: Option<i64>,
    /// Hex encoded raw template for server-side matching
    pub template: Option<String>,
    pub confidence: Option<i64>,
    pub device_id: Option<String>,
}

impl VerifyRequest {
    /// Build the scan; a template takes precedence over a slot.
    fn into_scan(self, device_id: String) -> Result<Scan, ApiError> {
        let identity = match (self.template, self.fingerprint_id) {
            (Some(hex), _) => ScanIdentity::Template(Template::from_hex(&hex)?),
            (None, Some(slot)) => ScanIdentity::Slot(FingerprintSlot::new(slot)?),
            (None, None) => return Err(ApiError::bad_request("fingerprint_id or template is required")),
        };

        Ok(Scan {
            identity,
            device_id,
            confidence: self.confidence,
        })
    }
}

/// Accepted scan
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyResponse {
    Entry {
        attendance_id: i64,
        student_id: i64,
        name: String,
        class_id: i64,
        class_name: String,
        entry_time: NaiveDateTime,
        attendance_status: String,
        confidence: Option<i64>,
        message: String,
    },
    Exit {
        attendance_id: i64,
        student_id: i64,
        name: String,
        class_id: i64,
        class_name: String,
        entry_time: NaiveDateTime,
        exit_time: Option<NaiveDateTime>,
        duration_minutes: Option<i64>,
        message: String,
    },
    Cooldown {
        student_id: i64,
        name: String,
        class_id: i64,
        minutes_remaining: i64,
        seconds_remaining: i64,
        message: String,
    },
}

impl VerifyResponse {
    fn entry(event: SessionEvent) -> Self {
        let SessionEvent {
            attendance,
            student,
            class,
        } = event;
        Self::Entry {
            attendance_id: attendance.id,
            student_id: student.id,
            message: DisplayMessages::entry(&student.name, &class.class_name),
            name: student.name,
            class_id: class.class_id,
            class_name: class.class_name,
            entry_time: attendance.entry_time,
            attendance_status: attendance.status,
            confidence: attendance.confidence,
        }
    }

    fn exit(event: SessionEvent) -> Self {
        let SessionEvent {
            attendance,
            student,
            class,
        } = event;
        let minutes = attendance.duration_minutes.unwrap_or_default();
        Self::Exit {
            attendance_id: attendance.id,
            student_id: student.id,
            message: DisplayMessages::exit(&student.name, &class.class_name, minutes),
            name: student.name,
            class_id: class.class_id,
            class_name: class.class_name,
            entry_time: attendance.entry_time,
            exit_time: attendance.exit_time,
            duration_minutes: attendance.duration_minutes,
        }
    }

    fn cooldown(notice: CooldownNotice) -> Self {
        Self::Cooldown {
            student_id: notice.student_id,
            message: DisplayMessages::cooldown(notice.minutes_remaining),
            name: notice.name,
            class_id: notice.class_id,
            minutes_remaining: notice.minutes_remaining,
            seconds_remaining: notice.seconds_remaining,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Entry { .. } | Self::Exit { .. } => StatusCode::OK,
            Self::Cooldown { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for VerifyResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// `POST /api/attendance/verify`
///
/// Evaluates one scan inside an immediate transaction so that concurrent
/// scans of the same finger are serialized.
async fn verify(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<VerifyRequest>,
) -> Result<VerifyResponse, ApiError> {
    let device_id = state.device_or_default(req.device_id.clone());
    let scan = req.into_scan(device_id)?;
    let now = state.now();

    let mut tx = state.db.begin_immediate().await?;
    let outcome = state.recorder.record(&mut tx, &scan, now).await?;
    tx.commit().await.map_internal()?;

    debug!(device_id = %scan.device_id, outcome = outcome.label(), "scan evaluated");

    match outcome {
        ScanOutcome::Entry(event) => Ok(VerifyResponse::entry(event)),
        ScanOutcome::Exit(event) => Ok(VerifyResponse::exit(event)),
        ScanOutcome::Cooldown(notice) => Ok(VerifyResponse::cooldown(notice)),
        ScanOutcome::Rejected(rejection) => Err(rejection.into()),
    }
}

/// Manual attendance mark
#[derive(Debug, Deserialize)]
pub struct MarkRequest {
    pub fingerprint_id: FingerprintSlot,
    /// Defaults to present
    pub status: Option<AttendanceStatus>,
    pub device_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MarkResponse {
    pub message: &'static str,
    pub attendance: Attendance,
}

/// `POST /api/attendance/mark`
async fn mark(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<MarkRequest>,
) -> Result<(StatusCode, Json<MarkResponse>), ApiError> {
    let mark = ManualMark {
        fingerprint_id: req.fingerprint_id,
        status: req.status.unwrap_or(AttendanceStatus::Present),
        device_id: state.device_or_default(req.device_id),
        notes: req.notes,
    };

    let attendance = state.attendance().mark(&mark, state.now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(MarkResponse {
            message: "Attendance marked successfully",
            attendance,
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub student_id: Option<i64>,
    pub class_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub attendances: Vec<AttendanceView>,
    pub count: usize,
}

/// `GET /api/attendance`
async fn list_attendance(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let filter = AttendanceFilter {
        student_id: query.student_id,
        class_id: query.class_id,
        date: query.date,
        limit: query.limit,
    };
    let attendances = state.attendance().list(&filter).await?;

    Ok(Json(ListResponse {
        count: attendances.len(),
        attendances,
    }))
}

/// `GET /api/attendance/{id}`
async fn get_attendance(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<AttendanceView>, ApiError> {
    let view = state
        .attendance()
        .find_view(id)
        .await?
        .or_not_found("Attendance record not found")?;
    Ok(Json(view))
}

/// `DELETE /api/attendance/{id}`
async fn delete_attendance(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.attendance().delete(id).await?;
    Ok(Json(MessageResponse::new("Attendance record deleted successfully")))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub class_id: Option<i64>,
    pub date: Option<NaiveDate>,
}

/// `GET /api/attendance/stats`
async fn stats(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<StatsQuery>,
) -> Result<Json<AttendanceStats>, ApiError> {
    let stats = state.attendance().stats(query.class_id, query.date).await?;
    Ok(Json(stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub class_id: Option<i64>,
}

/// First and last day of the month containing `day`.
fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(day);
    (first, last)
}

/// `GET /api/attendance/report`
///
/// Defaults to the current civil month.
async fn report(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Json<AttendanceReport>, ApiError> {
    let (first, last) = month_bounds(state.today());
    let start = query.start_date.unwrap_or(first);
    let end = query.end_date.unwrap_or(last);

    let report = state.attendance().report(start, end, query.class_id).await?;
    info!(%start, %end, class_id = ?query.class_id, total = report.stats.total, "report generated");
    Ok(Json(report))
}
