//! Upload coordinator: validates a resume, uploads it with cosmetic progress
//! feedback, then chains straight into profile extraction.
//!
//! Phases: `Idle → Validating → Uploading → Extracting → Succeeded | Failed`.
//! At most one attempt is in flight; a second call is rejected as busy.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::gateway::BackendGateway;
use crate::models::{Profile, ResumeFile, UploadedFile};
use crate::notifications::NotificationQueue;

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const ACCEPTED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];
const ACCEPTED_EXTENSIONS: &[&str] = &[".pdf", ".docx"];

const PROGRESS_TICK: Duration = Duration::from_millis(200);
const PROGRESS_STEP: u8 = 10;
/// The ticker never passes this; only a resolved upload reaches 100.
const PROGRESS_CEILING: u8 = 90;
const PROGRESS_RESET_DELAY: Duration = Duration::from_millis(1000);

const UPLOAD_FAILED: &str = "Upload failed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    Idle,
    Validating,
    Uploading,
    Extracting,
    Succeeded,
    Failed,
}

impl UploadPhase {
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            UploadPhase::Validating | UploadPhase::Uploading | UploadPhase::Extracting
        )
    }
}

/// Result of a successful attempt. `profile` is `None` when extraction failed
/// or the backend issued no upload id: the file is stored either way.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub uploaded_file: UploadedFile,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadStatus {
    pub phase: UploadPhase,
    pub progress: u8,
    pub uploaded_file: Option<UploadedFile>,
}

struct UploadSlot {
    phase: UploadPhase,
    /// Bumped by every attempt and by `reset()`. Writes from an older attempt are dropped.
    attempt: u64,
    uploaded_file: Option<UploadedFile>,
    ticker: Option<AbortHandle>,
}

/// Checks presence, type and size. Either the declared content type or the
/// extension must be accepted.
pub fn validate(file: Option<&ResumeFile>) -> Result<&ResumeFile, AppError> {
    let file = file.ok_or_else(|| AppError::Validation("Please select a file".to_string()))?;

    let type_ok = file
        .content_type
        .as_deref()
        .is_some_and(|ct| ACCEPTED_CONTENT_TYPES.contains(&ct));
    let extension_ok = file
        .extension()
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()));
    if !type_ok && !extension_ok {
        return Err(AppError::Validation(
            "Invalid file type. Please upload a PDF or DOCX file.".to_string(),
        ));
    }

    if file.size() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation(
            "File size exceeds 10MB limit.".to_string(),
        ));
    }

    Ok(file)
}

pub struct UploadCoordinator {
    gateway: BackendGateway,
    notifications: NotificationQueue,
    slot: Arc<Mutex<UploadSlot>>,
    progress: Arc<watch::Sender<u8>>,
}

impl UploadCoordinator {
    pub fn new(gateway: BackendGateway, notifications: NotificationQueue) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            gateway,
            notifications,
            slot: Arc::new(Mutex::new(UploadSlot {
                phase: UploadPhase::Idle,
                attempt: 0,
                uploaded_file: None,
                ticker: None,
            })),
            progress: Arc::new(progress),
        }
    }

    pub fn phase(&self) -> UploadPhase {
        lock(&self.slot).phase
    }

    pub fn progress(&self) -> u8 {
        *self.progress.borrow()
    }

    /// Receiver that observes every progress change.
    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    pub fn uploaded_file(&self) -> Option<UploadedFile> {
        lock(&self.slot).uploaded_file.clone()
    }

    pub fn status(&self) -> UploadStatus {
        let slot = lock(&self.slot);
        UploadStatus {
            phase: slot.phase,
            progress: *self.progress.borrow(),
            uploaded_file: slot.uploaded_file.clone(),
        }
    }

    /// Validates, uploads and extracts. Every outcome is also reported
    /// through the notification queue.
    pub async fn upload_file(&self, file: Option<ResumeFile>) -> Result<UploadOutcome, AppError> {
        let attempt = {
            let mut slot = lock(&self.slot);
            if slot.phase.is_in_flight() {
                drop(slot);
                let message = "An upload is already in progress";
                self.notifications.warning(message);
                return Err(AppError::Busy(message.to_string()));
            }
            slot.attempt += 1;
            slot.phase = UploadPhase::Validating;
            slot.attempt
        };

        let file = match validate(file.as_ref()) {
            Ok(file) => file,
            Err(e) => {
                self.transition(attempt, UploadPhase::Idle);
                self.notifications.error(e.message_or(UPLOAD_FAILED));
                return Err(e);
            }
        };

        let guard = self.begin_upload(attempt);
        let uploaded = match self.gateway.upload_resume(file).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                guard.stop_ticker();
                self.finish(attempt, UploadPhase::Failed);
                if self.is_current(attempt) {
                    self.notifications.error(e.message_or(UPLOAD_FAILED));
                }
                return Err(e);
            }
        };
        guard.stop_ticker();

        {
            let mut slot = lock(&self.slot);
            if slot.attempt == attempt {
                self.progress.send_replace(100);
                slot.uploaded_file = Some(uploaded.clone());
                slot.phase = UploadPhase::Extracting;
            }
        }
        info!("Uploaded {} as '{}'", uploaded.name, uploaded.id);

        let profile = if uploaded.id.is_empty() {
            warn!("Backend returned no upload id; skipping profile extraction");
            None
        } else {
            match self.gateway.extract_profile(&uploaded.id).await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!("Profile extraction failed for '{}': {e}", uploaded.id);
                    None
                }
            }
        };

        self.finish(attempt, UploadPhase::Succeeded);
        if !self.is_current(attempt) {
            debug!("Upload attempt {attempt} was reset before it finished");
        } else if profile.is_some() {
            self.notifications
                .success("Resume uploaded and profile extracted successfully");
        } else {
            self.notifications
                .warning("Resume uploaded, but the profile could not be extracted");
        }

        Ok(UploadOutcome {
            uploaded_file: uploaded,
            profile,
        })
    }

    /// Back to `Idle`, discarding any completed result. An attempt still in
    /// flight keeps running but its results are no longer recorded.
    pub fn reset(&self) {
        let mut slot = lock(&self.slot);
        slot.attempt += 1;
        slot.phase = UploadPhase::Idle;
        slot.uploaded_file = None;
        if let Some(ticker) = slot.ticker.take() {
            ticker.abort();
        }
        self.progress.send_replace(0);
    }

    fn begin_upload(&self, attempt: u64) -> InFlight<'_> {
        let ticker = spawn_ticker(self.progress.clone());
        let mut slot = lock(&self.slot);
        if slot.attempt == attempt {
            slot.phase = UploadPhase::Uploading;
            self.progress.send_replace(0);
            slot.ticker = Some(ticker.clone());
        }
        InFlight {
            coordinator: self,
            attempt,
            ticker,
        }
    }

    /// False once a newer attempt or a `reset()` has taken over.
    fn is_current(&self, attempt: u64) -> bool {
        lock(&self.slot).attempt == attempt
    }

    fn transition(&self, attempt: u64, phase: UploadPhase) {
        let mut slot = lock(&self.slot);
        if slot.attempt == attempt {
            slot.phase = phase;
        }
    }

    /// Enters a terminal phase and clears the progress indicator shortly after.
    fn finish(&self, attempt: u64, phase: UploadPhase) {
        self.transition(attempt, phase);
        schedule_progress_reset(self.slot.clone(), self.progress.clone(), attempt);
    }
}

/// Stops the ticker when dropped, and fails the attempt if the upload future
/// was dropped before reaching a terminal phase.
struct InFlight<'a> {
    coordinator: &'a UploadCoordinator,
    attempt: u64,
    ticker: AbortHandle,
}

impl InFlight<'_> {
    fn stop_ticker(&self) {
        self.ticker.abort();
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.ticker.abort();
        let abandoned = {
            let slot = lock(&self.coordinator.slot);
            slot.attempt == self.attempt && slot.phase.is_in_flight()
        };
        if abandoned {
            warn!("Upload attempt {} abandoned before completion", self.attempt);
            self.coordinator.finish(self.attempt, UploadPhase::Failed);
        }
    }
}

fn spawn_ticker(progress: Arc<watch::Sender<u8>>) -> AbortHandle {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROGRESS_TICK);
        interval.tick().await; // completes immediately
        loop {
            interval.tick().await;
            let mut capped = false;
            progress.send_modify(|p| {
                let next = p.saturating_add(PROGRESS_STEP).min(PROGRESS_CEILING);
                if next > *p {
                    *p = next;
                }
                capped = *p >= PROGRESS_CEILING;
            });
            if capped {
                break;
            }
        }
    })
    .abort_handle()
}

fn schedule_progress_reset(
    slot: Arc<Mutex<UploadSlot>>,
    progress: Arc<watch::Sender<u8>>,
    attempt: u64,
) {
    tokio::spawn(async move {
        tokio::time::sleep(PROGRESS_RESET_DELAY).await;
        let slot = lock(&slot);
        if slot.attempt == attempt && !slot.phase.is_in_flight() {
            progress.send_replace(0);
        }
    });
}

fn lock(slot: &Mutex<UploadSlot>) -> MutexGuard<'_, UploadSlot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}
