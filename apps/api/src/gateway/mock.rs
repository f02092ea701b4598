use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::Backend;
use crate::config::BackendMode;
use crate::errors::AppError;
use crate::models::{
    Filters, JobMatch, MarketPositioning, Profile, ProfileInsights, ResumeFile, TailoredResume,
    UploadedFile,
};

/// Deterministic local backend. Upload ids are issued sequentially (`u1`,
/// `u2`, ...) and only issued ids can be extracted.
pub struct MockBackend {
    latency: Duration,
    next_id: AtomicU64,
    uploads: Mutex<HashMap<String, String>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Every call sleeps for `latency` first, to exercise loading states.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            next_id: AtomicU64::new(1),
            uploads: Mutex::new(HashMap::new()),
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Mock
    }

    async fn upload_resume(&self, file: &ResumeFile) -> Result<UploadedFile, AppError> {
        self.simulate_latency().await;

        let id = format!("u{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), file.name.clone());

        Ok(UploadedFile {
            storage_reference: Some(format!("mock://uploads/{id}/{}", file.name)),
            id,
            name: file.name.clone(),
            size: file.size(),
        })
    }

    async fn extract_profile(&self, upload_id: &str) -> Result<Profile, AppError> {
        self.simulate_latency().await;

        let source_file = self
            .uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(upload_id)
            .cloned()
            .ok_or_else(|| AppError::Request {
                status: 404,
                message: "Profile extraction failed: Not Found".to_string(),
            })?;

        Ok(Profile(json!({
            "name": "Alex Chan",
            "title": "Product Manager",
            "location": "Hong Kong",
            "summary": "Product manager with 6 years of experience shipping fintech and analytics products.",
            "skills": ["Product Strategy", "Agile", "SQL", "Stakeholder Management", "Data Analysis", "Python"],
            "experience": [
                { "company": "Harbour Fintech", "title": "Product Manager", "years": 4 },
                { "company": "Kowloon Analytics", "title": "Business Analyst", "years": 2 }
            ],
            "education": [{ "institution": "HKUST", "degree": "BBA Information Systems" }],
            "source_file": source_file,
        })))
    }

    async fn analyze_profile(
        &self,
        _profile: &Profile,
        _filters: &Filters,
    ) -> Result<ProfileInsights, AppError> {
        self.simulate_latency().await;

        Ok(ProfileInsights(json!({
            "seniority": "Mid-Senior",
            "strengths": ["Product Strategy", "Data-driven decision making"],
            "recommended_roles": ["Senior Product Manager", "Product Owner"],
        })))
    }

    async fn market_positioning(
        &self,
        _profile: &Profile,
        filters: &Filters,
    ) -> Result<MarketPositioning, AppError> {
        self.simulate_latency().await;

        let location = filters.location.as_deref().unwrap_or("Hong Kong");
        Ok(MarketPositioning(json!({
            "match_score": 92,
            "estimated_salary": "HK$55k",
            "salary_band": "HK$45k-60k",
            "salary_delta": "+12% vs market avg",
            "skill_gaps": ["Cloud Architecture", "Machine Learning", "Mandarin (Business)"],
            "top_skill_gap": "Cloud Architecture",
            "recommended_accreditation": "AWS Certified Solutions Architect",
            "market": location,
        })))
    }

    async fn job_matches(
        &self,
        _profile: &Profile,
        filters: &Filters,
        top_k: usize,
    ) -> Result<Vec<JobMatch>, AppError> {
        self.simulate_latency().await;

        let terms: Vec<String> = filters
            .keywords
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let mut ranked: Vec<(usize, JobMatch)> = catalog()
            .into_iter()
            .map(|job| (relevance(&job, &terms), job))
            .collect();
        // Stable: equal scores keep catalog order.
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(ranked.into_iter().take(top_k).map(|(_, job)| job).collect())
    }

    async fn tailored_resume(
        &self,
        _profile: &Profile,
        job_id: &str,
    ) -> Result<TailoredResume, AppError> {
        self.simulate_latency().await;

        Ok(TailoredResume {
            download_url: Some(format!("mock://tailored/{job_id}.pdf")),
        })
    }
}

fn relevance(job: &JobMatch, terms: &[String]) -> usize {
    let haystack = format!(
        "{} {} {}",
        job.title,
        job.skills.join(" "),
        job.description
    )
    .to_lowercase();
    terms.iter().filter(|t| haystack.contains(t.as_str())).count()
}

fn catalog() -> Vec<JobMatch> {
    let job = |id: &str,
               title: &str,
               company: &str,
               salary: &str,
               skills: &[&str],
               rating: f64,
               remote: bool| JobMatch {
        id: id.to_string(),
        title: title.to_string(),
        company: company.to_string(),
        location: "Hong Kong".to_string(),
        description: format!("{company} is hiring a {title} to join its Hong Kong team."),
        salary: salary.to_string(),
        job_type: "Full-time".to_string(),
        url: format!("https://jobs.example.com/{id}"),
        posted_date: "2 days ago".to_string(),
        benefits: vec!["Medical insurance".to_string(), "Hybrid work".to_string()],
        skills: skills.iter().map(|s| s.to_string()).collect(),
        company_rating: rating,
        is_remote: remote,
    };

    vec![
        job("mock-1", "Senior Product Manager (PM)", "Harbour Fintech", "HK$50k-65k", &["Product Strategy", "Agile", "SQL"], 4.2, false),
        job("mock-2", "Product Owner", "Victoria Cloud Services", "HK$45k-58k", &["Agile", "Scrum", "Jira"], 4.0, true),
        job("mock-3", "Data Analyst", "Kowloon Analytics", "HK$30k-40k", &["SQL", "Python", "Tableau"], 3.8, false),
        job("mock-4", "Technical Program Manager", "Peak Retail Group", "HK$55k-70k", &["Program Management", "AWS", "Stakeholder Management"], 3.9, false),
        job("mock-5", "Business Analyst", "Central Health Tech", "HK$35k-45k", &["Requirements Analysis", "SQL", "Stakeholder Management"], 4.1, true),
        job("mock-6", "Product Marketing Manager", "Jade Media", "HK$40k-52k", &["Go-to-market", "Analytics", "Copywriting"], 3.6, false),
        job("mock-7", "Cloud Solutions Architect", "Victoria Cloud Services", "HK$70k-90k", &["AWS", "Cloud Architecture", "Terraform"], 4.0, true),
        job("mock-8", "Operations Manager", "Lantau Logistics", "HK$38k-48k", &["Operations", "Lean", "Vendor Management"], 3.5, false),
    ]
}

/// A small valid resume for tests.
#[cfg(test)]
pub fn sample_file() -> ResumeFile {
    ResumeFile::new("resume.pdf", Some("application/pdf".to_string()), vec![0u8; 1024])
}
