//! Session context: one user's profile, upload state, analysis results and
//! notifications, constructed once and shared by every handler.

pub mod handlers;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{debug, info};

use crate::analysis::{
    AnalysisOrchestrator, AnalysisOutcome, AnalysisResults, ArtifactHandoff, TailorOutcome,
};
use crate::config::BackendMode;
use crate::errors::AppError;
use crate::gateway::BackendGateway;
use crate::job_source::{ExternalJobSource, JobSearchParams};
use crate::models::{Filters, JobMatch, Profile, ProfileInsights, ResumeFile};
use crate::notifications::{Notification, NotificationQueue};
use crate::upload::{UploadCoordinator, UploadOutcome, UploadStatus};

/// Everything the presentation layer renders, read at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub backend_mode: BackendMode,
    pub upload: UploadStatus,
    pub profile: Option<Profile>,
    pub is_analyzing: bool,
    pub analysis: AnalysisResults,
    pub external_jobs: Vec<JobMatch>,
    pub notifications: Vec<Notification>,
}

pub struct SessionContext {
    mode: BackendMode,
    notifications: NotificationQueue,
    uploads: UploadCoordinator,
    analysis: AnalysisOrchestrator,
    profile: RwLock<Option<Profile>>,
    /// Bumped by `reset()`; an upload that started before a reset does not
    /// install its profile afterwards.
    generation: AtomicU64,
}

impl SessionContext {
    pub fn new(
        gateway: BackendGateway,
        job_source: ExternalJobSource,
        handoff: Arc<dyn ArtifactHandoff>,
    ) -> Self {
        let notifications = NotificationQueue::new();
        Self {
            mode: gateway.mode(),
            uploads: UploadCoordinator::new(gateway.clone(), notifications.clone()),
            analysis: AnalysisOrchestrator::new(
                gateway,
                job_source,
                notifications.clone(),
                handoff,
            ),
            notifications,
            profile: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn backend_mode(&self) -> BackendMode {
        self.mode
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn profile(&self) -> Option<Profile> {
        self.read_profile().clone()
    }

    /// Uploads and extracts a resume. On success the extracted profile (or
    /// `None` when extraction failed) replaces the current one and the
    /// analysis results of the previous profile are dropped.
    pub async fn upload_resume(&self, file: Option<ResumeFile>) -> Result<UploadOutcome, AppError> {
        let generation = self.generation.load(Ordering::SeqCst);
        let outcome = self.uploads.upload_file(file).await?;

        let mut profile = self.write_profile();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Session was reset during the upload; its profile is not kept");
            return Ok(outcome);
        }
        *profile = outcome.profile.clone();
        self.analysis.invalidate();
        drop(profile);

        info!(
            "Profile {} for upload '{}'",
            if outcome.profile.is_some() { "replaced" } else { "cleared" },
            outcome.uploaded_file.id
        );
        Ok(outcome)
    }

    pub async fn analyze(&self, filters: &Filters) -> AnalysisOutcome {
        // Read together so a concurrent upload either precedes both or follows both.
        let (profile, epoch) = {
            let profile = self.read_profile();
            (profile.clone(), self.analysis.epoch())
        };
        self.analysis
            .analyze_at(profile.as_ref(), filters, epoch)
            .await
    }

    pub async fn insights(&self, filters: &Filters) -> Result<Option<ProfileInsights>, AppError> {
        let profile = self.profile();
        self.analysis.insights(profile.as_ref(), filters).await
    }

    pub async fn search_jobs(&self, params: &JobSearchParams) -> Result<Vec<JobMatch>, AppError> {
        self.analysis.search_jobs(params).await
    }

    pub fn find_job(&self, job_id: &str) -> Option<JobMatch> {
        self.analysis.find_job(job_id)
    }

    /// Tailors the resume for a job from the current matches or listings.
    pub async fn tailor_resume(&self, job_id: &str) -> Result<TailorOutcome, AppError> {
        let job = self
            .find_job(job_id)
            .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;
        let profile = self.profile();
        Ok(self.analysis.tailor_resume(profile.as_ref(), &job).await)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            backend_mode: self.mode,
            upload: self.uploads.status(),
            profile: self.profile(),
            is_analyzing: self.analysis.is_loading(),
            analysis: self.analysis.results(),
            external_jobs: self.analysis.external_jobs(),
            notifications: self.notifications.snapshot(),
        }
    }

    /// Starts a new session. Work still in flight finishes but its results
    /// are discarded.
    pub fn reset(&self) {
        let mut profile = self.write_profile();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *profile = None;
        drop(profile);

        self.uploads.reset();
        self.analysis.clear();
        self.notifications.clear();
        info!("Session reset");
    }

    fn read_profile(&self) -> RwLockReadGuard<'_, Option<Profile>> {
        self.profile.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_profile(&self) -> RwLockWriteGuard<'_, Option<Profile>> {
        self.profile.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::LogHandoff;
    use crate::gateway::MockBackend;
    use crate::notifications::NotificationKind;
    use crate::test_support::ScriptedBackend;
    use crate::upload::UploadPhase;
    use std::time::Duration;

    const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    fn session_with(backend: Arc<dyn crate::gateway::Backend>) -> Arc<SessionContext> {
        Arc::new(SessionContext::new(
            BackendGateway::new(backend),
            ExternalJobSource::new(None).unwrap(),
            Arc::new(LogHandoff),
        ))
    }

    fn cv_docx() -> ResumeFile {
        ResumeFile::new("cv.docx", Some(DOCX.to_string()), vec![0u8; 2 * 1024 * 1024])
    }

    #[tokio::test]
    async fn test_upload_then_analyze() {
        let session = session_with(Arc::new(MockBackend::new()));

        let outcome = session.upload_resume(Some(cv_docx())).await.unwrap();
        assert_eq!(outcome.uploaded_file.id, "u1");
        assert_eq!(outcome.uploaded_file.size, 2 * 1024 * 1024);
        assert!(session.profile().is_some());

        let analysis = session.analyze(&Filters::with_keywords("PM")).await;
        let AnalysisOutcome::Completed { matches, .. } = analysis else {
            panic!("expected completed analysis");
        };
        assert!(!matches.is_empty());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.backend_mode, BackendMode::Mock);
        assert_eq!(snapshot.upload.phase, UploadPhase::Succeeded);
        assert!(snapshot.analysis.positioning.is_some());
        assert_eq!(
            snapshot.notifications.last().unwrap().kind,
            NotificationKind::Success
        );
    }

    #[tokio::test]
    async fn test_analyze_before_upload_requires_profile() {
        let backend = Arc::new(ScriptedBackend::default());
        let session = session_with(backend.clone());

        let outcome = session.analyze(&Filters::default()).await;

        assert!(matches!(outcome, AnalysisOutcome::ProfileRequired));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reupload_invalidates_results() {
        let session = session_with(Arc::new(MockBackend::new()));
        session.upload_resume(Some(cv_docx())).await.unwrap();
        session.analyze(&Filters::default()).await;
        assert!(session.snapshot().analysis.matches.is_some());

        session.upload_resume(Some(cv_docx())).await.unwrap();

        let analysis = session.snapshot().analysis;
        assert!(analysis.positioning.is_none());
        assert!(analysis.matches.is_none());
    }

    #[tokio::test]
    async fn test_failed_extraction_clears_profile() {
        let backend = Arc::new(ScriptedBackend::default());
        let session = session_with(backend.clone());
        session.upload_resume(Some(cv_docx())).await.unwrap();
        assert!(session.profile().is_some());

        backend.fail_extract(crate::test_support::upstream_error(
            "Profile extraction failed: Bad Gateway",
        ));
        let outcome = session.upload_resume(Some(cv_docx())).await.unwrap();

        assert!(outcome.profile.is_none());
        assert!(session.profile().is_none());
    }

    #[tokio::test]
    async fn test_tailor_unknown_job_is_not_found() {
        let session = session_with(Arc::new(MockBackend::new()));
        session.upload_resume(Some(cv_docx())).await.unwrap();

        let err = session.tailor_resume("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_tailor_matched_job() {
        let session = session_with(Arc::new(MockBackend::new()));
        session.upload_resume(Some(cv_docx())).await.unwrap();
        session.analyze(&Filters::default()).await;

        let outcome = session.tailor_resume("mock-1").await.unwrap();

        assert!(matches!(
            outcome,
            TailorOutcome::Generated { download_url: Some(ref url) } if url == "mock://tailored/mock-1.pdf"
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let session = session_with(Arc::new(MockBackend::new()));
        session.upload_resume(Some(cv_docx())).await.unwrap();
        session.analyze(&Filters::default()).await;

        session.reset();

        let snapshot = session.snapshot();
        assert!(snapshot.profile.is_none());
        assert_eq!(snapshot.upload.phase, UploadPhase::Idle);
        assert_eq!(snapshot.upload.progress, 0);
        assert!(snapshot.upload.uploaded_file.is_none());
        assert!(snapshot.analysis.matches.is_none());
        assert!(snapshot.external_jobs.is_empty());
        assert!(snapshot.notifications.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_upload_drops_its_profile() {
        let session = session_with(Arc::new(ScriptedBackend::with_delay(Duration::from_secs(1))));

        let upload = {
            let session = session.clone();
            tokio::spawn(async move { session.upload_resume(Some(cv_docx())).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.reset();

        assert!(upload.await.unwrap().is_ok());
        let snapshot = session.snapshot();
        assert!(snapshot.profile.is_none());
        assert!(snapshot.upload.uploaded_file.is_none());
        assert!(snapshot.notifications.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_analysis_supersedes_it() {
        let session = session_with(Arc::new(ScriptedBackend::with_delay(Duration::from_secs(1))));
        session.upload_resume(Some(cv_docx())).await.unwrap();

        let analysis = {
            let session = session.clone();
            tokio::spawn(async move { session.analyze(&Filters::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(session.snapshot().is_analyzing);
        session.reset();

        assert!(matches!(analysis.await.unwrap(), AnalysisOutcome::Superseded));
        let snapshot = session.snapshot();
        assert!(snapshot.analysis.matches.is_none());
        assert!(!snapshot.is_analyzing);
    }
}
