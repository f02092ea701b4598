// Shared value types passed between the gateway, the job source and the
// orchestration layer. Profile and analysis payloads are opaque JSON.

pub mod analysis;
pub mod job;
pub mod resume;

pub use analysis::{MarketPositioning, ProfileInsights};
pub use job::{Filters, JobMatch};
pub use resume::{Profile, ResumeFile, TailoredResume, UploadedFile};
