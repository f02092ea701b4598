pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::notifications::handlers as notifications;
use crate::session::handlers as session;
use crate::state::AppState;

/// Above the 10 MiB validation limit so oversized files get the validation
/// message instead of a bare 413.
const UPLOAD_BODY_LIMIT: usize = 12 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session
        .route("/api/v1/session", get(session::handle_get_session))
        .route("/api/v1/session/reset", post(session::handle_reset_session))
        // Resume
        .route(
            "/api/v1/resume/upload",
            post(session::handle_upload_resume).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/v1/resume/tailor", post(session::handle_tailor_resume))
        // Analysis and search
        .route("/api/v1/analyze", post(session::handle_analyze))
        .route(
            "/api/v1/profile/insights",
            post(session::handle_profile_insights),
        )
        .route("/api/v1/jobs/search", post(session::handle_search_jobs))
        // Notifications
        .route(
            "/api/v1/notifications",
            get(notifications::handle_list_notifications),
        )
        .route(
            "/api/v1/notifications/:id",
            delete(notifications::handle_dismiss_notification),
        )
        .with_state(state)
}
