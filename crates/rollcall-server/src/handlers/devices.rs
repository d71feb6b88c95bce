//! Scanner endpoints: registration, mode, and the command queue

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use rollcall_core::{CommandStatus, DeviceMode, Template};
use rollcall_storage::{
    ClassRepository, Command, CommandCompletion, CommandRepository, Device, DeviceRepository, clamp_limit, commands,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AppState;
use crate::handlers::extract::optional_json;
use crate::handlers::{ApiError, JsonBody, OptionExt, PathParam, QueryParams, ResultExt};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/device/register", post(register))
        .route("/api/device/mode", post(mode))
        .route("/api/device/set-mode", post(set_mode))
        .route("/api/device/poll", post(poll))
        .route("/api/device/command/{id}/complete", post(complete))
        .route("/api/device/list", get(list_devices))
        .route("/api/device/{device_id}", get(get_device))
        .route("/api/device/{device_id}/commands", get(device_commands))
}

/// Body carrying only the scanner's identifier
#[derive(Debug, Deserialize)]
pub struct DeviceRef {
    pub device_id: String,
}

impl DeviceRef {
    fn id(&self) -> Result<&str, ApiError> {
        let id = self.device_id.trim();
        if id.is_empty() {
            return Err(ApiError::bad_request("device_id is required"));
        }
        Ok(id)
    }
}

#[derive(Debug, Serialize)]
pub struct DeviceMutationResponse {
    pub message: String,
    pub device: Device,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub device_id: String,
    pub name: String,
    pub location: Option<String>,
}

/// `POST /api/device/register`
async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<DeviceMutationResponse>), ApiError> {
    let device = state
        .devices()
        .register(req.device_id.trim(), &req.name, req.location.as_deref(), state.now())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DeviceMutationResponse {
            message: "Device registered successfully".to_string(),
            device,
        }),
    ))
}

/// What a scanner should be doing right now
#[derive(Debug, Serialize)]
pub struct ModeResponse {
    pub mode: String,
    pub device_id: String,
    pub device_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// `POST /api/device/mode`
///
/// Scanners call this on boot and periodically; it counts as contact.
async fn mode(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<DeviceRef>,
) -> Result<Json<ModeResponse>, ApiError> {
    let device = state.devices().check_in(req.id()?, state.now()).await?;

    let (class_id, class_name) = match device.attendance_class() {
        Some(id) => match state.classes().find_by_id(id).await? {
            Some(class) => (Some(class.id), Some(class.name)),
            None => (None, None),
        },
        None => (None, None),
    };

    Ok(Json(ModeResponse {
        mode: device.mode,
        device_id: device.device_id,
        device_name: device.name,
        class_id,
        class_name,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetModeRequest {
    pub device_id: String,
    pub mode: String,
    pub class_id: Option<i64>,
}

/// `POST /api/device/set-mode`
async fn set_mode(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SetModeRequest>,
) -> Result<Json<DeviceMutationResponse>, ApiError> {
    let mode: DeviceMode = req
        .mode
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid mode: {}", req.mode)))?;

    let device = state.devices().set_mode(req.device_id.trim(), mode, req.class_id).await?;

    Ok(Json(DeviceMutationResponse {
        message: format!("Device mode set to {mode}"),
        device,
    }))
}

/// Oldest pending command, if any
#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub has_command: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
}

impl From<Option<Command>> for PollResponse {
    fn from(command: Option<Command>) -> Self {
        match command {
            Some(command) => Self {
                has_command: true,
                message: None,
                id: Some(command.id),
                command_type: Some(command.command_type),
                fingerprint_id: Some(command.fingerprint_id),
                student_name: Some(command.student_name.unwrap_or_else(|| "Unknown".to_string())),
            },
            None => Self {
                has_command: false,
                message: Some("No pending commands"),
                id: None,
                command_type: None,
                fingerprint_id: None,
                student_name: None,
            },
        }
    }
}

/// `POST /api/device/poll`
async fn poll(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<DeviceRef>,
) -> Result<Json<PollResponse>, ApiError> {
    let device_id = req.id()?;
    let now = state.now();

    let mut tx = state.db.begin_immediate().await?;
    let command = commands::poll(&mut tx, device_id, now).await?;
    tx.commit().await.map_internal()?;

    Ok(Json(command.into()))
}

/// Device report on a finished command; the body may be omitted
#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    /// `completed` (default) or `failed`
    pub status: Option<String>,
    /// Hex encoded template captured during enrollment
    pub template: Option<String>,
    pub error_message: Option<String>,
}

impl TryFrom<CompleteRequest> for CommandCompletion {
    type Error = ApiError;

    fn try_from(req: CompleteRequest) -> Result<Self, Self::Error> {
        let status = match req.status.as_deref() {
            Some(code) => code.parse::<CommandStatus>()?,
            None => CommandStatus::Completed,
        };
        let template = req.template.as_deref().map(Template::from_hex).transpose()?;

        Ok(Self {
            status,
            template,
            error_message: req.error_message,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub message: String,
    pub command: Command,
    pub template_updated: bool,
    pub device_reset: bool,
}

/// `POST /api/device/command/{id}/complete`
async fn complete(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    body: Bytes,
) -> Result<Json<CompleteResponse>, ApiError> {
    let req: CompleteRequest = optional_json(&body)?;
    let completion = CommandCompletion::try_from(req)?;
    let now = state.now();

    let mut tx = state.db.begin_immediate().await?;
    let done = commands::complete(&mut tx, id, &completion, now).await?;
    tx.commit().await.map_internal()?;

    Ok(Json(CompleteResponse {
        message: format!("Command {}", done.command.status),
        command: done.command,
        template_updated: done.template_updated,
        device_reset: done.device_reset,
    }))
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub devices: Vec<Device>,
}

/// `GET /api/device/list`
async fn list_devices(State(state): State<AppState>) -> Result<Json<DeviceListResponse>, ApiError> {
    let devices = state.devices().list().await?;
    debug!(count = devices.len(), "devices listed");
    Ok(Json(DeviceListResponse { devices }))
}

/// `GET /api/device/{device_id}`
async fn get_device(
    State(state): State<AppState>,
    PathParam(device_id): PathParam<String>,
) -> Result<Json<Device>, ApiError> {
    let device = state
        .devices()
        .find_by_device_id(&device_id)
        .await?
        .or_not_found("Device not found")?;
    Ok(Json(device))
}

#[derive(Debug, Default, Deserialize)]
pub struct CommandsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CommandListResponse {
    pub device_id: String,
    pub commands: Vec<Command>,
}

/// `GET /api/device/{device_id}/commands`
///
/// Command history, newest first.
async fn device_commands(
    State(state): State<AppState>,
    PathParam(device_id): PathParam<String>,
    QueryParams(query): QueryParams<CommandsQuery>,
) -> Result<Json<CommandListResponse>, ApiError> {
    state
        .devices()
        .find_by_device_id(&device_id)
        .await?
        .or_not_found("Device not found")?;

    let commands = state
        .commands()
        .list_for_device(&device_id, clamp_limit(query.limit))
        .await?;

    Ok(Json(CommandListResponse { device_id, commands }))
}
