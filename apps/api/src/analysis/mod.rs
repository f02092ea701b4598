//! Analysis orchestrator — runs positioning and matching for a profile and
//! keeps the two results consistent with each other.
//!
//! Positioning and matches are only ever visible together, and only for the
//! profile that produced them: a run applies both under one write lock after
//! both requests resolve, a failure clears both, and `invalidate()` (called
//! when the profile changes) discards whatever is in flight.

pub mod handoff;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::gateway::BackendGateway;
use crate::job_source::{ExternalJobSource, JobSearchParams};
use crate::models::{Filters, JobMatch, MarketPositioning, Profile, ProfileInsights};
use crate::notifications::NotificationQueue;

pub use handoff::{ArtifactHandoff, LogHandoff};

const PROFILE_REQUIRED: &str = "Please upload your resume first";
const ANALYSIS_FAILED: &str = "Analysis failed. Please try again.";
const TAILOR_FAILED: &str = "Resume generation failed. Please try again.";
const SEARCH_FAILED: &str = "Job search failed. Please try again.";

/// Positioning and matches from the last successful run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResults {
    pub positioning: Option<MarketPositioning>,
    pub matches: Option<Vec<JobMatch>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Completed {
        positioning: MarketPositioning,
        matches: Vec<JobMatch>,
    },
    /// No profile yet; nothing was requested.
    ProfileRequired,
    /// Another run is in flight; nothing was requested.
    AlreadyRunning,
    /// The profile changed while this run was in flight; its results were discarded.
    Superseded,
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TailorOutcome {
    Generated { download_url: Option<String> },
    ProfileRequired,
    Failed { message: String },
}

#[derive(Default)]
struct AnalysisState {
    results: AnalysisResults,
    external_jobs: Vec<JobMatch>,
}

/// Clears the loading flag however the run ends.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct AnalysisOrchestrator {
    gateway: BackendGateway,
    job_source: ExternalJobSource,
    notifications: NotificationQueue,
    handoff: Arc<dyn ArtifactHandoff>,
    state: RwLock<AnalysisState>,
    loading: AtomicBool,
    epoch: AtomicU64,
    /// Bumped by `clear()` only. Work that started before a clear neither
    /// stores listings nor notifies afterwards.
    generation: AtomicU64,
}

impl AnalysisOrchestrator {
    pub fn new(
        gateway: BackendGateway,
        job_source: ExternalJobSource,
        notifications: NotificationQueue,
        handoff: Arc<dyn ArtifactHandoff>,
    ) -> Self {
        Self {
            gateway,
            job_source,
            notifications,
            handoff,
            state: RwLock::new(AnalysisState::default()),
            loading: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// True for the full duration of an `analyze` run.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn results(&self) -> AnalysisResults {
        self.read().results.clone()
    }

    pub fn external_jobs(&self) -> Vec<JobMatch> {
        self.read().external_jobs.clone()
    }

    /// Looks a job up among the current matches and external listings.
    pub fn find_job(&self, job_id: &str) -> Option<JobMatch> {
        let state = self.read();
        state
            .results
            .matches
            .iter()
            .flatten()
            .chain(state.external_jobs.iter())
            .find(|job| job.id == job_id)
            .cloned()
    }

    /// Current results generation. Bumped by every `invalidate()`.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub async fn analyze(&self, profile: Option<&Profile>, filters: &Filters) -> AnalysisOutcome {
        self.analyze_at(profile, filters, self.epoch()).await
    }

    /// Like `analyze`, but the results only apply while the epoch is still
    /// `epoch`. Callers that read the profile and the epoch together use this
    /// so a profile swapped in between cannot adopt the old profile's results.
    pub async fn analyze_at(
        &self,
        profile: Option<&Profile>,
        filters: &Filters,
        epoch: u64,
    ) -> AnalysisOutcome {
        let Some(profile) = profile else {
            self.notifications.warning(PROFILE_REQUIRED);
            return AnalysisOutcome::ProfileRequired;
        };

        if self
            .loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.notifications.warning("An analysis is already running");
            return AnalysisOutcome::AlreadyRunning;
        }
        let _loading = LoadingGuard(&self.loading);
        if self.epoch() != epoch {
            return AnalysisOutcome::Superseded;
        }

        debug!(?filters, "Running market analysis");
        let (positioning, matches) = tokio::join!(
            self.gateway.get_market_positioning(profile, filters),
            self.gateway.get_job_matches(profile, filters),
        );

        let mut state = self.write();
        if self.epoch() != epoch {
            debug!("Profile changed during analysis; discarding results");
            return AnalysisOutcome::Superseded;
        }

        match (positioning, matches) {
            (Ok(positioning), Ok(matches)) => {
                state.results = AnalysisResults {
                    positioning: Some(positioning.clone()),
                    matches: Some(matches.clone()),
                };
                drop(state);
                info!("Analysis complete with {} matches", matches.len());
                self.notifications.success(format!(
                    "Analysis complete: {} job matches found",
                    matches.len()
                ));
                AnalysisOutcome::Completed {
                    positioning,
                    matches,
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                state.results = AnalysisResults::default();
                drop(state);
                let message = e.message_or(ANALYSIS_FAILED);
                warn!("Analysis failed: {e}");
                self.notifications.error(message.clone());
                AnalysisOutcome::Failed { message }
            }
        }
    }

    pub async fn tailor_resume(&self, profile: Option<&Profile>, job: &JobMatch) -> TailorOutcome {
        let Some(profile) = profile else {
            self.notifications.warning(PROFILE_REQUIRED);
            return TailorOutcome::ProfileRequired;
        };

        let generation = self.generation();
        let result = self.gateway.generate_tailored_resume(profile, &job.id).await;
        if self.generation() != generation {
            debug!("Session cleared during resume generation; result not announced");
            return match result {
                Ok(tailored) => TailorOutcome::Generated {
                    download_url: tailored.download_url,
                },
                Err(e) => TailorOutcome::Failed {
                    message: e.message_or(TAILOR_FAILED),
                },
            };
        }

        match result {
            Ok(tailored) => {
                if let Some(url) = tailored.download_url.as_deref().filter(|u| !u.is_empty()) {
                    self.handoff.open(url);
                }
                self.notifications
                    .success(format!("Tailored resume generated for {}", job.title));
                TailorOutcome::Generated {
                    download_url: tailored.download_url,
                }
            }
            Err(e) => {
                let message = e.message_or(TAILOR_FAILED);
                self.notifications.error(message.clone());
                TailorOutcome::Failed { message }
            }
        }
    }

    /// Free-form profile analysis. Same profile-required policy as `analyze`.
    pub async fn insights(
        &self,
        profile: Option<&Profile>,
        filters: &Filters,
    ) -> Result<Option<ProfileInsights>, AppError> {
        let Some(profile) = profile else {
            self.notifications.warning(PROFILE_REQUIRED);
            return Ok(None);
        };

        let generation = self.generation();
        self.gateway
            .analyze_profile(profile, filters)
            .await
            .map(Some)
            .inspect_err(|e| {
                if self.generation() == generation {
                    self.notifications.error(e.message_or(ANALYSIS_FAILED));
                }
            })
    }

    /// Searches the external provider. Listings are kept apart from the
    /// profile-paired matches.
    pub async fn search_jobs(&self, params: &JobSearchParams) -> Result<Vec<JobMatch>, AppError> {
        let generation = self.generation();
        let result = self.job_source.fetch_jobs(params).await;

        let mut state = self.write();
        if self.generation() != generation {
            debug!("Session cleared during job search; listings discarded");
            return result;
        }
        match result {
            Ok(jobs) => {
                state.external_jobs = jobs.clone();
                drop(state);
                self.notifications
                    .success(format!("Found {} jobs for '{}'", jobs.len(), params.keywords.trim()));
                Ok(jobs)
            }
            Err(e) => {
                drop(state);
                let message = e.message_or(SEARCH_FAILED);
                match &e {
                    AppError::RateLimited(_) => self.notifications.warning(message),
                    _ => self.notifications.error(message),
                };
                Err(e)
            }
        }
    }

    /// Drops positioning and matches and discards any run still in flight.
    pub fn invalidate(&self) {
        let mut state = self.write();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        state.results = AnalysisResults::default();
    }

    /// `invalidate()` plus the external listings. Searches, tailoring and
    /// insights still in flight finish silently.
    pub fn clear(&self) {
        let mut state = self.write();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.results = AnalysisResults::default();
        state.external_jobs.clear();
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn read(&self) -> RwLockReadGuard<'_, AnalysisState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AnalysisState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
