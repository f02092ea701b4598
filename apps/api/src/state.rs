use std::sync::Arc;

use crate::config::Config;
use crate::session::SessionContext;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The single session every handler reads and writes. Constructed once in `main`.
    pub session: Arc<SessionContext>,
    pub config: Config,
}
