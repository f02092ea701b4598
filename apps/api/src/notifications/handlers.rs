use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::notifications::Notification;
use crate::state::AppState;

/// GET /api/v1/notifications
pub async fn handle_list_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.session.notifications().snapshot())
}

/// DELETE /api/v1/notifications/:id
pub async fn handle_dismiss_notification(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    if state.session.notifications().dismiss(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Notification {id} not found")))
    }
}
