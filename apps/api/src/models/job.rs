use serde::{Deserialize, Serialize};

/// Normalized job listing. Backend matches and provider listings share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMatch {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub salary: String,
    #[serde(default)]
    pub job_type: String,
    #[serde(default, alias = "jobUrl")]
    pub url: String,
    #[serde(default)]
    pub posted_date: String,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub company_rating: f64,
    #[serde(default)]
    pub is_remote: bool,
}

/// Search criteria for positioning and matching. Compared by value only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub industries: Vec<String>,
    pub salary_min: Option<u32>,
    pub salary_max: Option<u32>,
    pub location: Option<String>,
    pub keywords: Option<String>,
}

impl Filters {
    pub fn with_keywords(keywords: impl Into<String>) -> Self {
        Self {
            keywords: Some(keywords.into()),
            ..Self::default()
        }
    }
}
