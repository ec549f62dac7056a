//! HTTP routes. Every control route maps onto one `CameraController` call
//! and answers with a JSON body.
//!
//! | Route | Params |
//! |---|---|
//! | `GET /move` | `p`, `t` ∈ {01,02,03}, `s` ∈ 1–24 |
//! | `GET /stop` | |
//! | `GET /zoom`, `/zoom/move` | `dir` ∈ {in,out,stop}, `spd` ∈ 1–7 |
//! | `GET /focus`, `/focus/move` | `dir` ∈ {near,far,stop}, `spd` ∈ 1–8 |
//! | `GET /focus/auto` | `enable` |
//! | `GET /preset/save/:num`, `/preset/recall/:num`, `/preset/call/:num` | 1–5 |
//! | `GET /home`, `/status`, `/test` | |
//! | `GET /raw` | `hex` |
//! | `GET /video` | MJPEG stream |

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use ptzlink_control::{CameraController, CommandReport, ControllerStatus, Outcome};
use ptzlink_core::{CodecError, ControlError, FocusDirection, PanDirection, TiltDirection, ZoomDirection};
use ptzlink_relay::{StreamStats, VideoRelay};
use ptzlink_transport::PingReport;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::mjpeg;

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    controller: Arc<CameraController>,
    relay: Arc<VideoRelay>,
    placeholder: Bytes,
}

impl AppState {
    pub fn new(controller: Arc<CameraController>, relay: Arc<VideoRelay>, placeholder: Bytes) -> Self {
        Self { controller, relay, placeholder }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/move", get(move_camera))
        .route("/stop", get(stop))
        .route("/zoom", get(zoom))
        .route("/zoom/move", get(zoom))
        .route("/focus", get(focus))
        .route("/focus/move", get(focus))
        .route("/focus/auto", get(autofocus))
        .route("/preset/save/:num", get(preset_save))
        .route("/preset/recall/:num", get(preset_recall))
        .route("/preset/call/:num", get(preset_recall))
        .route("/home", get(home))
        .route("/raw", get(raw))
        .route("/status", get(status))
        .route("/test", get(test_connection))
        .route("/video", get(video))
        .with_state(state)
}

// ── Responses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CommandResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CommandResponse {
    fn failure(error: impl ToString) -> Self {
        Self { ok: false, outcome: None, command: None, reply: None, error: Some(error.to_string()) }
    }
}

/// Validation errors are 400; everything the camera did (or did not do) is a
/// 200 with `ok` telling the story.
fn respond(result: Result<CommandReport, ControlError>) -> Response {
    match result {
        Ok(report) => {
            let error = match report.outcome {
                Outcome::Acked | Outcome::Superseded => None,
                Outcome::TimedOut => Some("no acknowledgment from camera (command was sent)".to_owned()),
                Outcome::Rejected => Some(format!(
                    "camera rejected the command: {}",
                    report.reply.as_deref().unwrap_or("error reply")
                )),
            };
            let body = CommandResponse {
                ok: error.is_none(),
                outcome: Some(report.outcome),
                command: Some(report.command),
                reply: report.reply,
                error,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            let status = match e {
                ControlError::InvalidParameter { .. } | ControlError::MalformedCommand { .. } => {
                    StatusCode::BAD_REQUEST
                }
                ControlError::Network { .. } => StatusCode::OK,
                ControlError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            };
            if !e.is_rejection() {
                warn!("Control request failed: {}", e);
            }
            (status, Json(CommandResponse::failure(e))).into_response()
        }
    }
}

// ── Parameter parsing ─────────────────────────────────────────────────────────

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ControlError> {
    value.as_deref().map(str::trim).ok_or_else(|| ControlError::InvalidParameter {
        reason: format!("missing parameter '{name}'"),
    })
}

fn direction<T>(value: &Option<String>, name: &str) -> Result<T, ControlError>
where
    T: FromStr<Err = CodecError>,
{
    Ok(required(value, name)?.parse::<T>()?)
}

/// Speed is optional when the axis is stopping.
fn speed(value: &Option<String>, name: &str, stopping: bool) -> Result<u8, ControlError> {
    match value.as_deref().map(str::trim) {
        None if stopping => Ok(0),
        None => Err(ControlError::InvalidParameter { reason: format!("missing parameter '{name}'") }),
        Some(text) => text.parse().map_err(|_| ControlError::InvalidParameter {
            reason: format!("{name} '{text}' is not a speed"),
        }),
    }
}

fn slot_number(text: &str) -> Result<u8, ControlError> {
    text.trim().parse().map_err(|_| ControlError::InvalidParameter {
        reason: format!("preset slot '{text}' is not a number"),
    })
}

fn flag(text: &str) -> Result<bool, ControlError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        other => Err(ControlError::InvalidParameter { reason: format!("'{other}' is not a boolean") }),
    }
}

// ── Control handlers ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MoveParams {
    p: Option<String>,
    t: Option<String>,
    s: Option<String>,
}

async fn move_camera(State(state): State<AppState>, Query(params): Query<MoveParams>) -> Response {
    let result = async {
        let pan: PanDirection = direction(&params.p, "p")?;
        let tilt: TiltDirection = direction(&params.t, "t")?;
        let speed = speed(&params.s, "s", pan.is_stop() && tilt.is_stop())?;
        state.controller.move_camera(pan, tilt, speed).await
    }
    .await;
    respond(result)
}

async fn stop(State(state): State<AppState>) -> Response {
    respond(state.controller.stop().await)
}

#[derive(Debug, Deserialize)]
struct AxisParams {
    dir: Option<String>,
    spd: Option<String>,
}

async fn zoom(State(state): State<AppState>, Query(params): Query<AxisParams>) -> Response {
    let result = async {
        let dir: ZoomDirection = direction(&params.dir, "dir")?;
        let spd = speed(&params.spd, "spd", dir.is_stop())?;
        state.controller.zoom(dir, spd).await
    }
    .await;
    respond(result)
}

async fn focus(State(state): State<AppState>, Query(params): Query<AxisParams>) -> Response {
    let result = async {
        let dir: FocusDirection = direction(&params.dir, "dir")?;
        let spd = speed(&params.spd, "spd", dir.is_stop())?;
        state.controller.focus(dir, spd).await
    }
    .await;
    respond(result)
}

#[derive(Debug, Deserialize)]
struct AutofocusParams {
    enable: Option<String>,
}

async fn autofocus(State(state): State<AppState>, Query(params): Query<AutofocusParams>) -> Response {
    let result = async {
        let enable = flag(required(&params.enable, "enable")?)?;
        state.controller.set_autofocus(enable).await
    }
    .await;
    respond(result)
}

async fn preset_save(State(state): State<AppState>, Path(num): Path<String>) -> Response {
    let result = async { state.controller.save_preset(slot_number(&num)?).await }.await;
    respond(result)
}

async fn preset_recall(State(state): State<AppState>, Path(num): Path<String>) -> Response {
    let result = async { state.controller.recall_preset(slot_number(&num)?).await }.await;
    respond(result)
}

async fn home(State(state): State<AppState>) -> Response {
    respond(state.controller.home().await)
}

#[derive(Debug, Deserialize)]
struct RawParams {
    hex: Option<String>,
}

async fn raw(State(state): State<AppState>, Query(params): Query<RawParams>) -> Response {
    let result = async {
        let hex = params.hex.as_deref().ok_or_else(|| ControlError::MalformedCommand {
            reason: "missing parameter 'hex'".into(),
        })?;
        state.controller.send_raw_hex(hex).await
    }
    .await;
    respond(result)
}

// ── Diagnostics ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StatusResponse {
    ok: bool,
    #[serde(flatten)]
    control: ControllerStatus,
    video: StreamStats,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        ok: true,
        control: state.controller.status(),
        video: state.relay.stats(),
    })
}

#[derive(Debug, Serialize)]
struct TestResponse {
    ok: bool,
    camera: String,
    #[serde(flatten)]
    ping: PingReport,
}

async fn test_connection(State(state): State<AppState>) -> Json<TestResponse> {
    let ping = state.controller.test_connection().await;
    debug!("Connection test: {:?}", ping);
    Json(TestResponse { ok: true, camera: state.controller.status().device.address, ping })
}

async fn video(State(state): State<AppState>) -> Response {
    mjpeg::stream_response(Arc::clone(&state.relay), state.placeholder.clone())
}
