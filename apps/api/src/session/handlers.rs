use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisOutcome, TailorOutcome};
use crate::errors::AppError;
use crate::job_source::JobSearchParams;
use crate::models::{Filters, JobMatch, ProfileInsights, ResumeFile};
use crate::session::SessionSnapshot;
use crate::state::AppState;
use crate::upload::UploadOutcome;

/// Multipart field carrying the resume.
const RESUME_FIELD: &str = "resume";

#[derive(Deserialize)]
pub struct TailorRequest {
    pub job_id: String,
}

#[derive(Serialize)]
pub struct InsightsResponse {
    /// `None` when there is no profile yet.
    pub insights: Option<ProfileInsights>,
}

#[derive(Serialize)]
pub struct JobSearchResponse {
    pub jobs: Vec<JobMatch>,
}

/// GET /api/v1/session
pub async fn handle_get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

/// POST /api/v1/session/reset
pub async fn handle_reset_session(State(state): State<AppState>) -> StatusCode {
    state.session.reset();
    StatusCode::NO_CONTENT
}

/// POST /api/v1/resume/upload
///
/// A request without a `resume` field is passed on as "no file selected" so
/// it gets the same validation message as the upload flow.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadOutcome>, AppError> {
    let mut multipart = multipart?;
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(RESUME_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or("resume").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid file: {e}")))?;
        file = Some(ResumeFile::new(name, content_type, bytes));
        break;
    }

    let outcome = state.session.upload_resume(file).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    payload: Result<Json<Filters>, JsonRejection>,
) -> Result<Json<AnalysisOutcome>, AppError> {
    let Json(filters) = payload?;
    Ok(Json(state.session.analyze(&filters).await))
}

/// POST /api/v1/profile/insights
pub async fn handle_profile_insights(
    State(state): State<AppState>,
    payload: Result<Json<Filters>, JsonRejection>,
) -> Result<Json<InsightsResponse>, AppError> {
    let Json(filters) = payload?;
    let insights = state.session.insights(&filters).await?;
    Ok(Json(InsightsResponse { insights }))
}

/// POST /api/v1/jobs/search
pub async fn handle_search_jobs(
    State(state): State<AppState>,
    payload: Result<Json<JobSearchParams>, JsonRejection>,
) -> Result<Json<JobSearchResponse>, AppError> {
    let Json(params) = payload?;
    let jobs = state.session.search_jobs(&params).await?;
    Ok(Json(JobSearchResponse { jobs }))
}

/// POST /api/v1/resume/tailor
pub async fn handle_tailor_resume(
    State(state): State<AppState>,
    payload: Result<Json<TailorRequest>, JsonRejection>,
) -> Result<Json<TailorOutcome>, AppError> {
    let Json(req) = payload?;
    let outcome = state.session.tailor_resume(&req.job_id).await?;
    Ok(Json(outcome))
}
