mod analysis;
mod config;
mod errors;
mod gateway;
mod job_source;
mod models;
mod notifications;
mod routes;
mod session;
mod state;
mod upload;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::LogHandoff;
use crate::config::Config;
use crate::gateway::BackendGateway;
use crate::job_source::ExternalJobSource;
use crate::routes::build_router;
use crate::session::SessionContext;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed numeric values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("careerlens_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CareerLens API v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    // Backend mode is fixed here for the lifetime of the process
    let gateway = BackendGateway::from_config(&config)?;
    info!("Backend gateway initialized (mode: {:?})", gateway.mode());

    let job_source = ExternalJobSource::new(config.rapidapi_key.clone())?;
    if !job_source.is_configured() {
        info!("RAPIDAPI_KEY not set; external job search will report a configuration error");
    }

    let session = SessionContext::new(gateway, job_source, Arc::new(LogHandoff));

    let state = AppState {
        session: Arc::new(session),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the front end has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
