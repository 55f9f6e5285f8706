//! Result DTOs available once a run has completed.

use serde::{Deserialize, Serialize};

use crate::types::{IdeaId, JobId};

/// One entry of `GET /api/runs/{id}/ideas`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaBrief {
    pub id: IdeaId,
    pub title: String,
    pub pain_description: String,
    pub segment: String,
    pub confidence_level: String,
    #[serde(default)]
    pub brief_evidence: Option<String>,
}

/// Response of `GET /api/runs/{id}/ideas`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIdeas {
    pub run_id: JobId,
    pub ideas_count: usize,
    #[serde(default)]
    pub selected_direction: Option<String>,
    #[serde(default)]
    pub optional_direction: Option<String>,
    pub ideas: Vec<IdeaBrief>,
}

/// An existing product similar to an idea.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analogue {
    pub id: IdeaId,
    pub name: String,
    pub description: String,
    pub url: String,
}

/// Response of `GET /api/ideas/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaDetail {
    pub id: IdeaId,
    pub title: String,
    pub pain_description: String,
    pub segment: String,
    pub confidence_level: String,
    #[serde(default)]
    pub brief_evidence: Option<String>,
    #[serde(default)]
    pub detailed_evidence: Option<String>,
    #[serde(default)]
    pub analogues: Vec<Analogue>,
    #[serde(default)]
    pub plan_7days: Option<String>,
    #[serde(default)]
    pub plan_30days: Option<String>,
}

/// Display label for a confidence level; unknown levels pass through.
pub fn confidence_badge(level: &str) -> &str {
    match level {
        "high" => "High",
        "medium" => "Medium",
        "low" => "Low",
        other => other,
    }
}
