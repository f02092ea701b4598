//! Where a generated artifact goes once its download URL is known.

use tracing::info;

/// Receives the download URL of a freshly generated tailored resume.
/// Called at most once per successful generation; never with an empty URL.
pub trait ArtifactHandoff: Send + Sync {
    fn open(&self, url: &str);
}

/// Server-side handoff: the URL is returned to the client in the response
/// body, so all that is left to do here is record it.
pub struct LogHandoff;

impl ArtifactHandoff for LogHandoff {
    fn open(&self, url: &str) {
        info!("Tailored resume ready at {url}");
    }
}
