use super::image::array_to_jpeg;
use super::state::AppState;
use crate::messages::{ColorTarget, Command, ControlMessage, Status};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::BytesMut;
use crossbeam_channel::TrySendError;
use puck_detection::HsvRange;
use tokio_stream::{wrappers::WatchStream, StreamExt};

pub async fn stream_tracking(State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.frames.subscribe();
    let stream = WatchStream::new(rx)
        .filter_map(|frame| frame)
        .filter_map(|frame| array_to_jpeg(frame.view()))
        .map(|jpeg| {
            let mut buf = BytesMut::new();
            buf.extend_from_slice(b"--frame\r\n");
            buf.extend_from_slice(b"Content-Type: image/jpeg\r\n");
            buf.extend_from_slice(format!("Content-Length: {}\r\n\r\n", jpeg.len()).as_bytes());
            buf.extend_from_slice(&jpeg);
            buf.extend_from_slice(b"\r\n");
            Ok::<_, std::io::Error>(buf.freeze())
        });

    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=frame",
        )],
        axum::body::Body::from_stream(stream),
    )
}

pub async fn status_handler(State(state): State<AppState>) -> Result<Json<Status>, StatusCode> {
    state.status.latest().map(Json).ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

pub async fn get_puck_range(State(state): State<AppState>) -> Json<HsvRange> {
    Json(*state.puck_range.read().await)
}

fn forward(state: &AppState, message: ControlMessage) -> StatusCode {
    match state.commands.try_send(message) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(TrySendError::Full(_)) => {
            tracing::warn!("command queue full");
            StatusCode::SERVICE_UNAVAILABLE
        }
        Err(TrySendError::Disconnected(_)) => StatusCode::GONE,
    }
}

pub async fn set_puck_range(
    State(state): State<AppState>,
    Json(range): Json<HsvRange>,
) -> impl IntoResponse {
    tracing::info!(lower = ?range.lower, upper = ?range.upper, "puck range update requested");
    let code = forward(
        &state,
        ControlMessage::SetColorRange {
            target: ColorTarget::Puck,
            range,
        },
    );
    if code == StatusCode::ACCEPTED {
        *state.puck_range.write().await = range;
    }
    code
}

/// Unknown command names are accepted and forwarded as `idle`.
pub async fn command_handler(
    State(state): State<AppState>,
    Json(command): Json<Command>,
) -> impl IntoResponse {
    tracing::info!(?command, "command from dashboard");
    forward(&state, command.into())
}
