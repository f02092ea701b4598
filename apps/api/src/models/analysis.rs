use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend-computed market metrics (salary band, skill gaps, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketPositioning(pub Value);

/// Free-form profile analysis returned by `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileInsights(pub Value);
