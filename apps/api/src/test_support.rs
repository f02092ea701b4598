//! Helpers shared by unit tests: an in-process HTTP stub server and a
//! scriptable backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;

use crate::analysis::ArtifactHandoff;
use crate::config::BackendMode;
use crate::errors::AppError;
use crate::gateway::{Backend, MockBackend};
use crate::models::{
    Filters, JobMatch, MarketPositioning, Profile, ProfileInsights, ResumeFile, TailoredResume,
    UploadedFile,
};

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_stub(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn upstream_error(message: &str) -> AppError {
    AppError::Request {
        status: 500,
        message: message.to_string(),
    }
}

pub fn sample_profile() -> Profile {
    Profile(json!({ "name": "Alex Chan", "skills": ["SQL"] }))
}

pub fn sample_job(id: &str) -> JobMatch {
    serde_json::from_value(json!({ "id": id, "title": "Product Owner" })).unwrap()
}

/// Records every artifact URL it is asked to open.
#[derive(Default)]
pub struct RecordingHandoff {
    opened: Mutex<Vec<String>>,
}

impl RecordingHandoff {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl ArtifactHandoff for RecordingHandoff {
    fn open(&self, url: &str) {
        self.opened.lock().unwrap().push(url.to_string());
    }
}

/// Delegates to [`MockBackend`] unless a failure has been queued for an
/// operation, and counts every call.
#[derive(Default)]
pub struct ScriptedBackend {
    inner: MockBackend,
    pub delay: Duration,
    pub calls: AtomicUsize,
    upload_failures: Mutex<VecDeque<AppError>>,
    extract_failures: Mutex<VecDeque<AppError>>,
    positioning_failures: Mutex<VecDeque<AppError>>,
    matches_failures: Mutex<VecDeque<AppError>>,
    tailor_results: Mutex<VecDeque<Result<TailoredResume, AppError>>>,
}

impl ScriptedBackend {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn fail_upload(&self, err: AppError) {
        self.upload_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_extract(&self, err: AppError) {
        self.extract_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_positioning(&self, err: AppError) {
        self.positioning_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_matches(&self, err: AppError) {
        self.matches_failures.lock().unwrap().push_back(err);
    }

    pub fn tailor_with(&self, result: Result<TailoredResume, AppError>) {
        self.tailor_results.lock().unwrap().push_back(result);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, queue: Option<&Mutex<VecDeque<AppError>>>) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match queue.and_then(|q| q.lock().unwrap().pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Mock
    }

    async fn upload_resume(&self, file: &ResumeFile) -> Result<UploadedFile, AppError> {
        self.enter(Some(&self.upload_failures)).await?;
        self.inner.upload_resume(file).await
    }

    async fn extract_profile(&self, upload_id: &str) -> Result<Profile, AppError> {
        self.enter(Some(&self.extract_failures)).await?;
        self.inner.extract_profile(upload_id).await
    }

    async fn analyze_profile(
        &self,
        profile: &Profile,
        filters: &Filters,
    ) -> Result<ProfileInsights, AppError> {
        self.enter(None).await?;
        self.inner.analyze_profile(profile, filters).await
    }

    async fn market_positioning(
        &self,
        profile: &Profile,
        filters: &Filters,
    ) -> Result<MarketPositioning, AppError> {
        self.enter(Some(&self.positioning_failures)).await?;
        self.inner.market_positioning(profile, filters).await
    }

    async fn job_matches(
        &self,
        profile: &Profile,
        filters: &Filters,
        top_k: usize,
    ) -> Result<Vec<JobMatch>, AppError> {
        self.enter(Some(&self.matches_failures)).await?;
        self.inner.job_matches(profile, filters, top_k).await
    }

    async fn tailored_resume(
        &self,
        profile: &Profile,
        job_id: &str,
    ) -> Result<TailoredResume, AppError> {
        self.enter(None).await?;
        let scripted = self.tailor_results.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => self.inner.tailored_resume(profile, job_id).await,
        }
    }
}
