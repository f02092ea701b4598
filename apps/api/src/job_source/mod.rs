/// External job source — direct client for the Indeed scraper on RapidAPI.
///
/// Used when the analysis backend does not supply listings. Provider records
/// are normalized into [`JobMatch`] so callers cannot tell the two sources apart.
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::JobMatch;

pub const INDEED_API_URL: &str = "https://indeed-scraper-api.p.rapidapi.com/api/job";
const INDEED_API_HOST: &str = "indeed-scraper-api.p.rapidapi.com";
/// Hard ceiling on rows the provider returns per request.
pub const MAX_JOBS: u32 = 50;
const MAX_DESCRIPTION_CHARS: usize = 50_000;
const MAX_BENEFITS: usize = 5;
const MAX_SKILLS: usize = 10;
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

const NOT_SPECIFIED: &str = "Not specified";
const DEFAULT_JOB_TYPE: &str = "Full-time";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobSearchParams {
    pub keywords: String,
    pub location: String,
    pub country: String,
    pub job_type: String,
    pub num_jobs: u32,
}

impl Default for JobSearchParams {
    fn default() -> Self {
        Self {
            keywords: String::new(),
            location: "Hong Kong".to_string(),
            country: "hk".to_string(),
            job_type: "fulltime".to_string(),
            num_jobs: 25,
        }
    }
}

impl JobSearchParams {
    pub fn keywords(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct ScraperRequest<'a> {
    scraper: ScraperQuery<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScraperQuery<'a> {
    max_rows: u32,
    query: &'a str,
    location: &'a str,
    job_type: &'a str,
    radius: &'a str,
    sort: &'a str,
    from_days: &'a str,
    country: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScraperResponse {
    returnvalue: Option<ReturnValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReturnValue {
    data: Option<Vec<ProviderJob>>,
}

/// One listing as the provider sends it. Every field is optional, and scalar
/// fields accept numbers and booleans as well as strings so one odd record
/// cannot fail the whole response.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderJob {
    #[serde(deserialize_with = "lenient_string")]
    pub job_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub company_name: Option<String>,
    pub location: Option<ProviderLocation>,
    #[serde(deserialize_with = "lenient_strings")]
    pub job_type: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_strings")]
    pub benefits: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_strings")]
    pub attributes: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_string")]
    pub description_text: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub job_url: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub age: Option<String>,
    pub rating: Option<ProviderRating>,
    pub is_remote: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProviderLocation {
    #[serde(deserialize_with = "lenient_string")]
    pub city: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProviderRating {
    pub rating: Option<f64>,
}

#[derive(Clone)]
pub struct ExternalJobSource {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ExternalJobSource {
    pub fn new(api_key: Option<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint: INDEED_API_URL.to_string(),
            api_key,
        })
    }

    /// Points the client at a different endpoint (tests, proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn fetch_jobs(&self, params: &JobSearchParams) -> Result<Vec<JobMatch>, AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::Configuration(
                "RapidAPI key not configured. Please set RAPIDAPI_KEY in your environment."
                    .to_string(),
            )
        })?;

        let keywords = params.keywords.trim();
        if keywords.is_empty() {
            return Err(AppError::Validation("Job keywords are required".to_string()));
        }

        let body = ScraperRequest {
            scraper: ScraperQuery {
                max_rows: params.num_jobs.min(MAX_JOBS),
                query: keywords,
                location: &params.location,
                job_type: &params.job_type,
                radius: "50",
                sort: "relevance",
                from_days: "7",
                country: &params.country,
            },
        };

        debug!(?body, "Fetching jobs from provider");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-rapidapi-host", INDEED_API_HOST)
            .header("x-rapidapi-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Job provider returned {status}");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(
                    "Rate limit exceeded. Please wait a few minutes and try again.".to_string(),
                ),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Auth(
                    "Invalid API key. Please check your RapidAPI key configuration.".to_string(),
                ),
                _ => {
                    let text = response.text().await.unwrap_or_default();
                    let preview: String = text.chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
                    AppError::Request {
                        status: status.as_u16(),
                        message: format!("API Error: {} - {preview}", status.as_u16()),
                    }
                }
            });
        }

        let payload: ScraperResponse = response.json().await?;
        let jobs: Vec<JobMatch> = payload
            .returnvalue
            .and_then(|rv| rv.data)
            .unwrap_or_default()
            .into_iter()
            .map(normalize_job)
            .collect();

        info!("Job provider returned {} listings for '{keywords}'", jobs.len());
        Ok(jobs)
    }
}

/// Maps a provider record into the normalized shape, filling documented defaults.
pub fn normalize_job(job: ProviderJob) -> JobMatch {
    let job_type = match job.job_type {
        Some(types) if !types.is_empty() => types.join(", "),
        _ => DEFAULT_JOB_TYPE.to_string(),
    };
    let description =
        present(job.description_text).unwrap_or_else(|| "No description available".to_string());

    JobMatch {
        id: present(job.job_id).unwrap_or_else(generated_job_id),
        title: present(job.title).unwrap_or_else(|| "N/A".to_string()),
        company: present(job.company_name).unwrap_or_else(|| "N/A".to_string()),
        location: present(job.location.and_then(|l| l.city))
            .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
        description: description.chars().take(MAX_DESCRIPTION_CHARS).collect(),
        salary: NOT_SPECIFIED.to_string(),
        job_type,
        url: present(job.job_url).unwrap_or_else(|| "#".to_string()),
        posted_date: present(job.age).unwrap_or_else(|| "Recently".to_string()),
        benefits: truncated(job.benefits, MAX_BENEFITS),
        skills: truncated(job.attributes, MAX_SKILLS),
        company_rating: job.rating.and_then(|r| r.rating).unwrap_or(0.0),
        is_remote: job.is_remote.unwrap_or(false),
    }
}

/// Blank strings count as missing.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_to_string))
}

/// A list of scalars; a lone scalar counts as a one-item list and anything
/// else is dropped.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(scalar_to_string)
                .filter(|s| !s.trim().is_empty())
                .collect(),
        ),
        Some(other) => scalar_to_string(other).map(|s| vec![s]),
        None => None,
    })
}

fn truncated(items: Option<Vec<String>>, max: usize) -> Vec<String> {
    let mut items = items.unwrap_or_default();
    items.truncate(max);
    items
}

fn generated_job_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("job_{}_{}", Utc::now().timestamp_millis(), &random[..9])
}
