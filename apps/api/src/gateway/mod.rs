//! Backend Gateway — the single way the orchestration layer reaches the
//! analysis backend.
//!
//! Two interchangeable backends implement [`Backend`]:
//! - [`MockBackend`]: deterministic, local, no network.
//! - [`LiveBackend`]: HTTP with an optional `X-API-Key` header.
//!
//! The backend is chosen once, when the gateway is built from [`Config`], and
//! held as `Arc<dyn Backend>`. A call can never observe a different mode than
//! the one the gateway was constructed with.

pub mod live;
pub mod mock;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{BackendMode, Config};
use crate::errors::AppError;
use crate::models::{
    Filters, JobMatch, MarketPositioning, Profile, ProfileInsights, ResumeFile, TailoredResume,
    UploadedFile,
};

pub use live::LiveBackend;
pub use mock::MockBackend;

/// Number of matches requested when the caller does not say otherwise.
pub const DEFAULT_TOP_K: usize = 15;

/// One method per backend capability. Implement this to add a backend
/// without touching the orchestration code.
#[async_trait]
pub trait Backend: Send + Sync {
    fn mode(&self) -> BackendMode;

    async fn upload_resume(&self, file: &ResumeFile) -> Result<UploadedFile, AppError>;

    async fn extract_profile(&self, upload_id: &str) -> Result<Profile, AppError>;

    async fn analyze_profile(
        &self,
        profile: &Profile,
        filters: &Filters,
    ) -> Result<ProfileInsights, AppError>;

    async fn market_positioning(
        &self,
        profile: &Profile,
        filters: &Filters,
    ) -> Result<MarketPositioning, AppError>;

    async fn job_matches(
        &self,
        profile: &Profile,
        filters: &Filters,
        top_k: usize,
    ) -> Result<Vec<JobMatch>, AppError>;

    async fn tailored_resume(
        &self,
        profile: &Profile,
        job_id: &str,
    ) -> Result<TailoredResume, AppError>;
}

/// Cheaply cloneable façade over the selected backend.
#[derive(Clone)]
pub struct BackendGateway {
    backend: Arc<dyn Backend>,
}

impl BackendGateway {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let backend: Arc<dyn Backend> = match (config.backend_mode(), &config.api_base_url) {
            (BackendMode::Live, Some(base_url)) => Arc::new(LiveBackend::new(
                base_url.clone(),
                config.backend_api_key.clone(),
            )?),
            _ => Arc::new(MockBackend::with_latency(Duration::from_millis(
                config.mock_latency_ms,
            ))),
        };
        Ok(Self::new(backend))
    }

    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    pub async fn upload_resume(&self, file: &ResumeFile) -> Result<UploadedFile, AppError> {
        debug!(mode = ?self.mode(), file = %file.name, size = file.size(), "upload_resume");
        self.backend
            .upload_resume(file)
            .await
            .inspect_err(|e| warn!("upload_resume failed: {e}"))
    }

    pub async fn extract_profile(&self, upload_id: &str) -> Result<Profile, AppError> {
        debug!(mode = ?self.mode(), upload_id, "extract_profile");
        self.backend
            .extract_profile(upload_id)
            .await
            .inspect_err(|e| warn!("extract_profile failed: {e}"))
    }

    pub async fn analyze_profile(
        &self,
        profile: &Profile,
        filters: &Filters,
    ) -> Result<ProfileInsights, AppError> {
        debug!(mode = ?self.mode(), "analyze_profile");
        self.backend
            .analyze_profile(profile, filters)
            .await
            .inspect_err(|e| warn!("analyze_profile failed: {e}"))
    }

    pub async fn get_market_positioning(
        &self,
        profile: &Profile,
        filters: &Filters,
    ) -> Result<MarketPositioning, AppError> {
        debug!(mode = ?self.mode(), "get_market_positioning");
        self.backend
            .market_positioning(profile, filters)
            .await
            .inspect_err(|e| warn!("get_market_positioning failed: {e}"))
    }

    pub async fn get_job_matches(
        &self,
        profile: &Profile,
        filters: &Filters,
    ) -> Result<Vec<JobMatch>, AppError> {
        self.get_job_matches_top_k(profile, filters, DEFAULT_TOP_K)
            .await
    }

    pub async fn get_job_matches_top_k(
        &self,
        profile: &Profile,
        filters: &Filters,
        top_k: usize,
    ) -> Result<Vec<JobMatch>, AppError> {
        debug!(mode = ?self.mode(), top_k, "get_job_matches");
        self.backend
            .job_matches(profile, filters, top_k)
            .await
            .inspect_err(|e| warn!("get_job_matches failed: {e}"))
    }

    pub async fn generate_tailored_resume(
        &self,
        profile: &Profile,
        job_id: &str,
    ) -> Result<TailoredResume, AppError> {
        debug!(mode = ?self.mode(), job_id, "generate_tailored_resume");
        self.backend
            .tailored_resume(profile, job_id)
            .await
            .inspect_err(|e| warn!("generate_tailored_resume failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: Option<&str>, use_mock: bool) -> Config {
        Config {
            api_base_url: base_url.map(String::from),
            use_mock_api: use_mock,
            backend_api_key: None,
            rapidapi_key: None,
            mock_latency_ms: 0,
            port: 8080,
            rust_log: "info".to_string(),
        }
    }

    #[test]
    fn test_no_base_url_selects_mock() {
        let gateway = BackendGateway::from_config(&config(None, false)).unwrap();
        assert_eq!(gateway.mode(), BackendMode::Mock);
    }

    #[test]
    fn test_base_url_selects_live() {
        let gateway =
            BackendGateway::from_config(&config(Some("http://127.0.0.1:9"), false)).unwrap();
        assert_eq!(gateway.mode(), BackendMode::Live);
    }

    #[test]
    fn test_mock_flag_wins_over_base_url() {
        let gateway =
            BackendGateway::from_config(&config(Some("http://127.0.0.1:9"), true)).unwrap();
        assert_eq!(gateway.mode(), BackendMode::Mock);
    }

    #[tokio::test]
    async fn test_default_top_k_is_fifteen() {
        let gateway = BackendGateway::new(Arc::new(MockBackend::new()));
        let profile = gateway
            .extract_profile(&gateway.upload_resume(&mock::sample_file()).await.unwrap().id)
            .await
            .unwrap();
        let matches = gateway
            .get_job_matches(&profile, &Filters::default())
            .await
            .unwrap();
        assert!(!matches.is_empty());
        assert!(matches.len() <= DEFAULT_TOP_K);
    }
}
