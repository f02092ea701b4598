use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

/// Application configuration loaded from environment variables.
/// Everything is optional: without `API_BASE_URL` the service runs against the
/// mock backend, and without `RAPIDAPI_KEY` external job search is disabled.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub use_mock_api: bool,
    pub backend_api_key: Option<String>,
    pub rapidapi_key: Option<String>,
    pub mock_latency_ms: u64,
    pub port: u16,
    pub rust_log: String,
}

/// Which backend the gateway talks to, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Mock,
    Live,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Config {
            api_base_url: get("API_BASE_URL").map(|url| url.trim_end_matches('/').to_string()),
            use_mock_api: get("USE_MOCK_API")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            backend_api_key: get("BACKEND_API_KEY"),
            rapidapi_key: get("RAPIDAPI_KEY"),
            mock_latency_ms: get("MOCK_LATENCY_MS")
                .unwrap_or_else(|| "400".to_string())
                .parse::<u64>()
                .context("MOCK_LATENCY_MS must be a number of milliseconds")?,
            port: get("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Mock mode when explicitly requested or when no backend URL is set.
    pub fn backend_mode(&self) -> BackendMode {
        if self.use_mock_api || self.api_base_url.is_none() {
            BackendMode::Mock
        } else {
            BackendMode::Live
        }
    }

    /// Logs the effective configuration with secrets masked.
    pub fn log_summary(&self) {
        let reason = match (self.backend_mode(), self.use_mock_api) {
            (BackendMode::Live, _) => "API_BASE_URL set",
            (BackendMode::Mock, true) => "USE_MOCK_API=true",
            (BackendMode::Mock, false) => "API_BASE_URL not set",
        };
        info!("Backend mode: {:?} ({reason})", self.backend_mode());
        info!(
            "API_BASE_URL = {}",
            self.api_base_url.as_deref().unwrap_or("<unset>")
        );
        info!("BACKEND_API_KEY = {}", mask_secret(self.backend_api_key.as_deref()));
        info!("RAPIDAPI_KEY = {}", mask_secret(self.rapidapi_key.as_deref()));
    }
}

fn mask_secret(value: Option<&str>) -> String {
    match value {
        None => "<unset>".to_string(),
        Some(v) => format!("{}…", v.chars().take(4).collect::<String>()),
    }
}
