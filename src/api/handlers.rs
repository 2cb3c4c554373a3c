//! HTTP endpoint handlers
//!
//! Each handler stands in for one browser callback: the toolbar icon, a
//! notification button, a settings page write.

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use tracing::{error, warn};

use crate::{
    services::NotificationKind,
    state::{settings::MAX_DURATION_SECS, AppState, TimerEvent},
};
use super::responses::{ErrorResponse, HealthResponse, SettingsUpdate, StatusResponse};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal_error(context: &str, e: impl std::fmt::Display) -> ApiError {
    error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(format!("{}: {}", context, e))),
    )
}

async fn status_response(state: &AppState) -> StatusResponse {
    let (last_action, last_action_time) = state.get_last_action();
    StatusResponse {
        timer: state.machine.snapshot().await,
        badge_text: state.badge.text(),
        badge_color: state.badge.color(),
        notifications: state.notifier.shown(),
        uptime: state.get_uptime(),
        last_action,
        last_action_time,
        timestamp: Utc::now(),
    }
}

/// Handle POST /icon - toolbar icon clicked
pub async fn icon_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, ApiError> {
    state
        .dispatch("icon", TimerEvent::IconActivated)
        .await
        .map_err(|e| internal_error("Failed to handle icon click", e))?;
    Ok(Json(status_response(&state).await))
}

/// Handle POST /notifications/:id/button - notification button clicked
pub async fn notification_button_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Some(kind) = NotificationKind::from_id(&id) else {
        warn!("Unknown notification sent: {}", id);
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Unknown notification: {}", id))),
        ));
    };

    state
        .dispatch(kind.id(), TimerEvent::NotificationActionTriggered(kind))
        .await
        .map_err(|e| internal_error("Failed to handle notification click", e))?;
    Ok(Json(status_response(&state).await))
}

/// Handle PUT /settings - settings page saved
pub async fn settings_handler(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<StatusResponse>, ApiError> {
    if let Some(key) = update.out_of_range() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "{} must be at most {} seconds",
                key, MAX_DURATION_SECS
            ))),
        ));
    }

    let values = update.into_values();
    if values.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("No settings provided".to_string())),
        ));
    }

    state
        .write_settings(values)
        .await
        .map_err(|e| internal_error("Failed to store settings", e))?;
    Ok(Json(status_response(&state).await))
}

/// Handle GET /status - current timer state
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(status_response(&state).await)
}

/// Handle GET /health - health check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
