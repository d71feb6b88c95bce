//! dashboard summary endpoint

use axum::{Json, Router, extract::State, routing::get};
use chrono::{NaiveDate, NaiveDateTime};
use rollcall_core::constants::SUMMARY_ROWS;
use rollcall_storage::{
    AttendanceFilter, AttendanceRepository, AttendanceView, ClassRepository, CommandRepository, DeviceRepository,
    ScheduledClass, StudentRepository, schedule,
};
use serde::Serialize;
use tracing::debug;

use crate::AppState;
use crate::handlers::ApiError;

/// Counters and recent activity for the admin landing page
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_students: i64,
    pub total_classes: i64,
    pub active_classes: i64,
    pub total_devices: i64,
    pub pending_commands: i64,
    pub today: NaiveDate,
    pub today_attendance: i64,
    pub current_class: Option<ScheduledClass>,
    pub recent_attendance: Vec<AttendanceView>,
    pub generated_at: NaiveDateTime,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/dashboard", get(dashboard))
}

/// `GET /api/dashboard`
async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>, ApiError> {
    let now = state.now();

    let total_students = state.students().count().await?;
    let (total_classes, active_classes) = state.classes().counts().await?;
    let total_devices = state.devices().count().await?;
    let pending_commands = state.commands().count_pending().await?;

    let attendance = state.attendance();
    let today_attendance = attendance.count_for_date(now.date()).await?;
    let recent_attendance = attendance
        .list(&AttendanceFilter {
            limit: Some(SUMMARY_ROWS),
            ..Default::default()
        })
        .await?;

    let mut tx = state.db.begin().await?;
    let current_class = schedule::running_class(&mut tx, now, None).await?;
    tx.commit().await.map_err(ApiError::internal)?;

    debug!(total_students, today_attendance, "dashboard built");

    Ok(Json(DashboardResponse {
        total_students,
        total_classes,
        active_classes,
        total_devices,
        pending_commands,
        today: now.date(),
        today_attendance,
        current_class,
        recent_attendance,
        generated_at: now,
    }))
}
