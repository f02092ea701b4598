use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::Backend;
use crate::config::BackendMode;
use crate::errors::AppError;
use crate::models::{
    Filters, JobMatch, MarketPositioning, Profile, ProfileInsights, ResumeFile, TailoredResume,
    UploadedFile,
};

// Endpoints as path segments under the base URL.
const UPLOAD_ENDPOINT: &[&str] = &["resume", "upload"];
const ANALYZE_ENDPOINT: &[&str] = &["analyze"];
const MATCHES_ENDPOINT: &[&str] = &["jobs", "matches"];
const TAILOR_ENDPOINT: &[&str] = &["resume", "tailor"];
const POSITIONING_ENDPOINT: &[&str] = &["market", "positioning"];

/// Multipart field name the backend expects the resume under.
pub const RESUME_FIELD: &str = "resume";
pub const API_KEY_HEADER: &str = "X-API-Key";
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Serialize)]
struct AnalysisRequest<'a> {
    profile: &'a Profile,
    filters: &'a Filters,
}

#[derive(Debug, Serialize)]
struct MatchesRequest<'a> {
    profile: &'a Profile,
    filters: &'a Filters,
    top_k: usize,
}

#[derive(Debug, Serialize)]
struct TailorRequest<'a> {
    profile: &'a Profile,
    job_id: &'a str,
}

/// The matcher answers with either a bare array or `{"matches": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MatchesPayload {
    List(Vec<JobMatch>),
    Wrapped { matches: Vec<JobMatch> },
}

/// HTTP client for the remote analysis backend.
#[derive(Clone)]
pub struct LiveBackend {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl LiveBackend {
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                AppError::Configuration(format!("API_BASE_URL is not a valid base URL: {base_url}"))
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Base URL with `segments` appended. Each segment is percent-encoded, so
    /// ids containing `/`, `?` or `#` stay inside their segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// POST builder with the API key attached when one is configured.
    fn post(&self, segments: &[&str]) -> RequestBuilder {
        let request = self.client.post(self.endpoint(segments));
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<R, AppError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(AppError::Request {
                status: status.as_u16(),
                message: format!("{operation} failed: {}", status_text(status)),
            });
        }

        Ok(response.json::<R>().await?)
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(String::from)
        .unwrap_or_else(|| status.as_str().to_string())
}

/// Declared type if the browser sent one, else guessed from the extension.
fn resume_mime(file: &ResumeFile) -> String {
    if let Some(content_type) = &file.content_type {
        return content_type.clone();
    }
    match file.extension().as_deref() {
        Some(".pdf") => "application/pdf".to_string(),
        Some(".docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string()
        }
        _ => "application/octet-stream".to_string(),
    }
}

#[async_trait]
impl Backend for LiveBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Live
    }

    async fn upload_resume(&self, file: &ResumeFile) -> Result<UploadedFile, AppError> {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&resume_mime(file))
            .map_err(|e| AppError::Validation(format!("Unsupported content type: {e}")))?;
        let form = Form::new().part(RESUME_FIELD, part);

        debug!("Uploading {} ({} bytes)", file.name, file.size());
        self.send(self.post(UPLOAD_ENDPOINT).multipart(form), "Upload")
            .await
    }

    async fn extract_profile(&self, upload_id: &str) -> Result<Profile, AppError> {
        self.send(self.post(&["resume", upload_id, "extract"]), "Profile extraction")
            .await
    }

    async fn analyze_profile(
        &self,
        profile: &Profile,
        filters: &Filters,
    ) -> Result<ProfileInsights, AppError> {
        let body = AnalysisRequest { profile, filters };
        self.send(self.post(ANALYZE_ENDPOINT).json(&body), "Analysis")
            .await
    }

    async fn market_positioning(
        &self,
        profile: &Profile,
        filters: &Filters,
    ) -> Result<MarketPositioning, AppError> {
        let body = AnalysisRequest { profile, filters };
        self.send(self.post(POSITIONING_ENDPOINT).json(&body), "Market positioning")
            .await
    }

    async fn job_matches(
        &self,
        profile: &Profile,
        filters: &Filters,
        top_k: usize,
    ) -> Result<Vec<JobMatch>, AppError> {
        let body = MatchesRequest {
            profile,
            filters,
            top_k,
        };
        let payload: MatchesPayload = self
            .send(self.post(MATCHES_ENDPOINT).json(&body), "Job matching")
            .await?;

        Ok(match payload {
            MatchesPayload::List(matches) | MatchesPayload::Wrapped { matches } => matches,
        })
    }

    async fn tailored_resume(
        &self,
        profile: &Profile,
        job_id: &str,
    ) -> Result<TailoredResume, AppError> {
        let body = TailorRequest { profile, job_id };
        self.send(self.post(TAILOR_ENDPOINT).json(&body), "Resume generation")
            .await
    }
}
